//! Change detection between two versions of a file
//!
//! [`sequence`] is the generic minimal edit script; [`declarations`] applies
//! it level by level to declaration trees.

pub mod declarations;
pub mod sequence;

pub use declarations::{diff_declarations, DiffElement, DiffMap, DiffMapEntry, FileDiff};
pub use sequence::{diff_sequences, edit_distance, Edit};
