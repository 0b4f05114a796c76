//! Path normalization for client-supplied expansion parameters.
//!
//! ```text
//! "customer, .customer.profile., items" ──► {order.customer.profile, order.items}
//! ```
//!
//! 1. Split on commas
//! 2. Strip leading/trailing dots and whitespace, drop empty segments
//! 3. Root every path at the entity type being represented
//! 4. Drop every path that is a strict prefix of another requested path
//!
//! Step 4 means a client asking for both `a` and `a.b.c` only triggers the
//! deepest expansion; the shallower levels are expanded on the way down.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex_lite::Regex;

use crate::types::{EntityType, FieldPath};

/// Separator between paths in the query parameter.
pub const PATH_SEPARATOR: char = ',';

fn edge_garbage() -> &'static Regex {
    static EDGE_GARBAGE: OnceLock<Regex> = OnceLock::new();
    // Constant pattern; covered by the normalization tests.
    EDGE_GARBAGE.get_or_init(|| Regex::new(r"^[.\s]+|[.\s]+$").expect("Edge pattern is valid"))
}

/// Parse one raw path, rooting it at `root`.
pub fn parse_path(raw: &str, root: &EntityType) -> Option<FieldPath> {
    let trimmed = edge_garbage().replace_all(raw, "");
    FieldPath::parse(&trimmed).map(|path| path.rooted_at(root))
}

/// Normalize a raw comma-separated parameter into canonical, deduplicated paths.
///
/// `None` and empty input produce an empty set.
pub fn normalize(raw: Option<&str>, root: &EntityType) -> BTreeSet<FieldPath> {
    let paths: BTreeSet<FieldPath> = raw
        .unwrap_or_default()
        .split(PATH_SEPARATOR)
        .filter_map(|piece| parse_path(piece, root))
        .collect();

    remove_redundant_paths(paths)
}

/// Keep only the longest requested chain for each branch.
pub fn remove_redundant_paths(paths: BTreeSet<FieldPath>) -> BTreeSet<FieldPath> {
    paths
        .iter()
        .filter(|candidate| !paths.iter().any(|other| candidate.is_strict_prefix_of(other)))
        .cloned()
        .collect()
}
