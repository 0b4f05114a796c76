//! Core types for the expansion kernel.

pub mod entity;
pub mod path;
pub mod representation;

pub use entity::{EntityType, Multiplicity, RelationField, REVERSE_SUFFIX};
pub use path::{EmptyPathError, FieldPath};
pub use representation::{Expanded, Representation};
