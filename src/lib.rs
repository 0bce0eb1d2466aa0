//! # Loomtrack
//!
//! An offline-first production and delivery ledger for a powerloom
//! weaving operation, with reconciliation against a remote store.
//!
//! ## Core Concepts
//!
//! - **Production entries**: one record per woven taka, keyed by a
//!   unique taka number
//! - **Delivery entries**: one record per taka shipped to a party; a
//!   taka can be delivered only once
//! - **State store**: reducer-driven immutable snapshots, persisted to a
//!   durable local blob on every mutation
//! - **Unsynced changes**: a write-ahead queue of local mutations
//!   awaiting push to the remote store
//! - **Sync coordinator**: full pull on (re)connect, queued push, and
//!   live change-notification merging
//!
//! ## Example
//!
//! ```ignore
//! use loomtrack::{DeliveryDraft, ProductionEntry, Tracker, TrackerConfig};
//!
//! let tracker = Tracker::open_or_create(TrackerConfig {
//!     path: "./my-ledger".into(),
//!     ..Default::default()
//! })?;
//!
//! tracker.add_production_entries(vec![
//!     ProductionEntry::new("2417", "10", "120", "15/8/25")?,
//! ]);
//!
//! let entry = tracker.submit_delivery(
//!     DeliveryDraft {
//!         party_name: "Patel & Sons".into(),
//!         lot_number: "L-3".into(),
//!         taka_number: "2417".into(),
//!         meter: "120".into(),
//!         machine_number: None,
//!     },
//!     None,
//! )?;
//! assert_eq!(entry.machine_number, "10");
//! ```

pub mod error;
pub mod extract;
pub mod persist;
pub mod reconcile;
pub mod remote;
pub mod report;
pub mod state;
pub mod sync;
pub mod tracker;
pub mod types;

// Re-exports
pub use error::{ExtractionError, Result, TrackerError, ValidationError};
pub use extract::{ExtractedDelivery, ExtractedProduction, Extractor};
pub use persist::{PersistedState, SnapshotFile};
pub use reconcile::{next_tp_number, validate, validate_batch, DeliveryCandidate};
pub use remote::{
    record_from_remote, record_to_remote, ChangeKind, RemoteChange, RemoteError, RemoteStore,
    DELIVERY_TABLE, PRODUCTION_TABLE, SETTINGS_ROW_ID, SETTINGS_TABLE,
};
pub use report::{delivery_report, parse_entry_date, production_report, DateRange};
pub use state::{reduce, Action, AppState, Origin, StateStore};
pub use sync::{Activity, Connectivity, Notice, SyncCoordinator, SyncStatus};
pub use tracker::{DeliveryDraft, Tracker, TrackerConfig};
pub use types::*;
