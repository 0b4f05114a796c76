//! Expansion policies.
//!
//! Each expandable relation field carries a policy, fixed at construction:
//!
//! - an allow-list of paths permitted to be expanded from the field
//! - an ordered specification table mapping paths to renderers
//! - optional ignored paths and alias remaps
//!
//! Requested paths are checked against both before any graph walk. A path
//! outside either is a configuration defect and fails loudly.

pub mod declaration;
pub mod field;
pub mod table;

pub use declaration::{AliasDeclaration, FieldDeclaration, PolicyDeclaration, SpecificationEntry, TableDeclaration};
pub use field::{AliasRemap, DeclarationError, FieldPolicy, PolicyEntry, PolicyViolation};
pub use table::PolicyTable;
