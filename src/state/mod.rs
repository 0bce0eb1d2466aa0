//! Local state store: reducer actions and the snapshot container.

mod actions;
mod store;

pub use actions::{reduce, Action, AppState, Origin};
pub use store::StateStore;
