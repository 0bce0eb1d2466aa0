//! Sync coordinator: connectivity, full pulls, queued pushes, and live
//! change-notification merging.

mod coordinator;

pub use coordinator::{Activity, Connectivity, Notice, SyncCoordinator, SyncStatus};
