//! Remote store contract: the shape of the backend the sync coordinator
//! talks to.

mod fields;

pub use fields::{record_from_remote, record_to_remote};

use crossbeam_channel::Receiver;
use serde_json::Value;
use thiserror::Error;

/// Remote table holding production entries.
pub const PRODUCTION_TABLE: &str = "production_entries";
/// Remote table holding delivery entries.
pub const DELIVERY_TABLE: &str = "delivery_entries";
/// Remote table holding the singleton settings row.
pub const SETTINGS_TABLE: &str = "app_settings";
/// Identity of the singleton settings row.
pub const SETTINGS_ROW_ID: i64 = 1;

/// Failures at the remote boundary.
///
/// `NotFound` (relation/table missing) is a distinct "setup required"
/// condition: the backend is reachable but its schema was never created.
/// Everything else is transient connectivity.
#[derive(Clone, Debug, Error)]
pub enum RemoteError {
    #[error("Remote table not found: {0}")]
    NotFound(String),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

/// Kind of a remote change notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A push notification for one remote row.
///
/// `record` uses the remote field-naming convention (snake_case). For
/// deletes it carries at least the key column of the removed row.
#[derive(Clone, Debug)]
pub struct RemoteChange {
    pub kind: ChangeKind,
    pub record: Value,
}

/// The remote persistence backend, as consumed by the sync coordinator.
///
/// Records crossing this boundary are JSON objects in the remote naming
/// convention; use [`record_to_remote`] / [`record_from_remote`] at the
/// crossing points. Upserts conflict on `conflict_key` and are
/// last-write-wins: that is the whole concurrent-edit policy between
/// devices.
pub trait RemoteStore: Send + Sync {
    /// Lightweight existence probe (e.g. a count-only query) against a
    /// known table.
    fn probe(&self, table: &str) -> Result<(), RemoteError>;

    /// Fetch every row of a table.
    fn pull_all(&self, table: &str) -> Result<Vec<Value>, RemoteError>;

    /// Insert-or-update rows, conflicting on `conflict_key`.
    fn upsert(&self, table: &str, records: &[Value], conflict_key: &str)
        -> Result<(), RemoteError>;

    /// Delete rows whose `key_column` value is in `keys`.
    fn delete(&self, table: &str, keys: &[String], key_column: &str) -> Result<(), RemoteError>;

    /// Subscribe to change notifications for a table, optionally scoped
    /// by a backend-side filter expression (used for the singleton
    /// settings row). Events arrive in delivery order per channel; no
    /// cross-channel ordering is guaranteed.
    fn subscribe(
        &self,
        table: &str,
        filter: Option<&str>,
    ) -> Result<Receiver<RemoteChange>, RemoteError>;
}
