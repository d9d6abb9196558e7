//! The mutation surface and its durable backing.
//!
//! [`NoteStore`] is the facade collaborators talk to; [`StateStore`] holds
//! the serialized state on disk between sessions.

mod note_store;
mod state_store;

pub use note_store::{NoteStore, StoreState};
pub use state_store::{StateStore, StateStoreError};
