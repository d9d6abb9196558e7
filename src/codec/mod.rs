//! Conversion between the live node arena and its persisted, cycle-free form.
//!
//! The live tree carries parent back-references that must never be written
//! out; the codec emits a plain nested record per node and rebuilds every
//! parent link from context while decoding.

mod record;

pub use record::{PersistedNode, PersistedState, decode_tree, encode_tree};
