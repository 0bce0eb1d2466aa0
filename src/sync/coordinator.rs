//! The sync coordinator worker and its state machine.
//!
//! One dedicated thread owns all remote traffic. Commands and forwarded
//! subscription events arrive through a single fan-in mailbox, so state
//! transitions and merges are serialized without locks around the sync
//! logic itself. The worker never blocks dispatchers: a hung remote call
//! stalls sync, not the callers.

use crate::error::TrackerError;
use crate::remote::{
    record_from_remote, record_to_remote, ChangeKind, RemoteChange, RemoteError, RemoteStore,
    DELIVERY_TABLE, PRODUCTION_TABLE, SETTINGS_ROW_ID, SETTINGS_TABLE,
};
use crate::state::{Action, StateStore};
use crate::types::{DeliveryEntry, ProductionEntry, Settings};
use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Worker wake-up interval: drives the offline re-probe and the
/// opportunistic timer sync.
const TICK_INTERVAL: Duration = Duration::from_secs(15);

/// Max buffered user notices before new ones are dropped.
const NOTICE_BUFFER: usize = 64;

/// Connectivity half of the sync state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Connectivity {
    Uninitialized,
    Initializing,
    Online,
    Offline,
}

/// Activity half of the sync state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activity {
    Idle,
    Syncing,
}

/// Snapshot of the coordinator's state, readable at any time.
#[derive(Clone, Debug)]
pub struct SyncStatus {
    pub connectivity: Connectivity,
    pub activity: Activity,
    /// The remote schema is missing (probe hit an unknown relation);
    /// distinct from generic connectivity failure and not retried
    /// automatically.
    pub setup_required: bool,
    pub last_error: Option<String>,
    pub last_sync_at: Option<DateTime<Utc>>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Uninitialized,
            activity: Activity::Idle,
            setup_required: false,
            last_error: None,
            last_sync_at: None,
        }
    }
}

/// A transient user-facing notification (short title plus description).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub description: String,
}

#[derive(Clone, Copy, Debug)]
enum EntityKind {
    Production,
    Delivery,
    Settings,
}

#[derive(Debug)]
enum SyncCommand {
    Initialize,
    SyncNow,
    SetConnectivity(bool),
    Shutdown,
}

enum WorkerMsg {
    Command(SyncCommand),
    Remote(EntityKind, RemoteChange),
}

/// Handle to the sync worker thread.
pub struct SyncCoordinator {
    mailbox: Sender<WorkerMsg>,
    status: Arc<RwLock<SyncStatus>>,
    notices: Receiver<Notice>,
    handle: Option<JoinHandle<()>>,
}

impl SyncCoordinator {
    /// Spawn the worker. The coordinator starts `Uninitialized`; call
    /// [`initialize`](Self::initialize) once local state is loaded and
    /// remote credentials are present.
    pub fn spawn(
        store: Arc<StateStore>,
        remote: Arc<dyn RemoteStore>,
    ) -> crate::error::Result<Self> {
        Self::spawn_with_interval(store, remote, TICK_INTERVAL)
    }

    /// Spawn the worker with a custom tick interval (offline re-probe
    /// and timer-sync cadence).
    pub fn spawn_with_interval(
        store: Arc<StateStore>,
        remote: Arc<dyn RemoteStore>,
        tick_interval: Duration,
    ) -> crate::error::Result<Self> {
        let (mailbox, inbox) = unbounded();
        let (notice_tx, notice_rx) = bounded(NOTICE_BUFFER);
        let status = Arc::new(RwLock::new(SyncStatus::default()));

        let worker = Worker {
            store,
            remote,
            status: Arc::clone(&status),
            notices: notice_tx,
            mailbox: mailbox.clone(),
            inbox,
            tick_interval,
        };
        let handle = thread::Builder::new()
            .name("loomtrack-sync".into())
            .spawn(move || worker.run())?;

        Ok(Self {
            mailbox,
            status,
            notices: notice_rx,
            handle: Some(handle),
        })
    }

    /// Probe the remote store and, when reachable, run the initial full
    /// sync and establish subscriptions.
    pub fn initialize(&self) {
        let _ = self.mailbox.send(WorkerMsg::Command(SyncCommand::Initialize));
    }

    /// Request a sync (manual trigger).
    pub fn sync_now(&self) {
        let _ = self.mailbox.send(WorkerMsg::Command(SyncCommand::SyncNow));
    }

    /// Report a connectivity change observed outside the coordinator
    /// (the browser online/offline analog).
    pub fn set_connectivity(&self, online: bool) {
        let _ = self
            .mailbox
            .send(WorkerMsg::Command(SyncCommand::SetConnectivity(online)));
    }

    /// Current state-machine snapshot.
    pub fn status(&self) -> SyncStatus {
        self.status.read().clone()
    }

    /// Receiver for transient user-facing notices. Crossbeam receivers
    /// are cloneable; every consumer competes for the same stream.
    pub fn notices(&self) -> Receiver<Notice> {
        self.notices.clone()
    }

    /// Stop the worker and wait for it to finish.
    pub fn shutdown(self) {
        // Drop does the work.
    }
}

impl Drop for SyncCoordinator {
    fn drop(&mut self) {
        let _ = self.mailbox.send(WorkerMsg::Command(SyncCommand::Shutdown));
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

struct Worker {
    store: Arc<StateStore>,
    remote: Arc<dyn RemoteStore>,
    status: Arc<RwLock<SyncStatus>>,
    notices: Sender<Notice>,
    /// Cloned into subscription forwarder threads.
    mailbox: Sender<WorkerMsg>,
    inbox: Receiver<WorkerMsg>,
    tick_interval: Duration,
}

impl Worker {
    fn run(mut self) {
        loop {
            match self.inbox.recv_timeout(self.tick_interval) {
                Ok(WorkerMsg::Command(SyncCommand::Initialize)) => self.initialize(),
                Ok(WorkerMsg::Command(SyncCommand::SyncNow)) => self.sync_requested(),
                Ok(WorkerMsg::Command(SyncCommand::SetConnectivity(true))) => self.reconnect(),
                Ok(WorkerMsg::Command(SyncCommand::SetConnectivity(false))) => {
                    self.go_offline("Offline", "Connectivity lost; changes are queued locally")
                }
                Ok(WorkerMsg::Command(SyncCommand::Shutdown)) => break,
                Ok(WorkerMsg::Remote(kind, change)) => self.apply_remote(kind, change),
                Err(RecvTimeoutError::Timeout) => self.tick(),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    fn set_status(&self, apply: impl FnOnce(&mut SyncStatus)) {
        apply(&mut self.status.write());
    }

    fn notify(&self, title: &str, description: impl Into<String>) {
        // Best effort; a full buffer drops the notice.
        let _ = self.notices.try_send(Notice {
            title: title.to_string(),
            description: description.into(),
        });
    }

    // --- Connectivity transitions ---

    fn initialize(&mut self) {
        self.set_status(|s| s.connectivity = Connectivity::Initializing);
        self.probe_and_connect();
    }

    fn reconnect(&mut self) {
        self.probe_and_connect();
    }

    fn probe_and_connect(&mut self) {
        match self.remote.probe(PRODUCTION_TABLE) {
            Ok(()) => self.go_online_and_sync(),
            Err(RemoteError::NotFound(table)) => {
                warn!(table = %table, "remote schema missing; staying offline");
                self.set_status(|s| {
                    s.connectivity = Connectivity::Offline;
                    s.setup_required = true;
                    s.last_error = Some(format!("remote table {table} missing"));
                });
                self.store.dispatch_remote(Action::SetConnectivity(false));
                self.notify(
                    "Setup required",
                    "The remote database has no tables yet. Run the setup script, then reconnect.",
                );
            }
            Err(RemoteError::Unavailable(message)) => {
                debug!(error = %message, "probe failed");
                self.set_status(|s| {
                    s.connectivity = Connectivity::Offline;
                    s.last_error = Some(message.clone());
                });
                self.store.dispatch_remote(Action::SetConnectivity(false));
                self.notify("Connection failed", message);
            }
        }
    }

    fn go_online_and_sync(&mut self) {
        info!("remote store reachable");
        self.set_status(|s| {
            s.connectivity = Connectivity::Online;
            s.setup_required = false;
            s.last_error = None;
        });
        self.store.dispatch_remote(Action::SetConnectivity(true));

        let result = self.with_syncing(|worker| worker.full_sync());
        if let Err(err) = result {
            self.sync_failed(err);
        }
    }

    fn go_offline(&mut self, title: &str, description: &str) {
        self.set_status(|s| s.connectivity = Connectivity::Offline);
        self.store.dispatch_remote(Action::SetConnectivity(false));
        self.notify(title, description);
    }

    fn sync_failed(&mut self, err: TrackerError) {
        warn!(error = %err, "sync failed; queued changes retained");
        let (title, description) = match &err {
            TrackerError::SyncPush { operation, message } => (
                "Sync failed",
                format!("Push failed during {operation}: {message}"),
            ),
            TrackerError::ConnectivitySetup(message) => ("Setup required", message.clone()),
            other => ("Connection failed", other.to_string()),
        };
        if matches!(err, TrackerError::ConnectivitySetup(_)) {
            self.set_status(|s| s.setup_required = true);
        }
        self.set_status(|s| {
            s.connectivity = Connectivity::Offline;
            s.last_error = Some(err.to_string());
        });
        self.store.dispatch_remote(Action::SetConnectivity(false));
        self.notify(title, description);
    }

    fn tick(&mut self) {
        let status = self.status.read().clone();
        match status.connectivity {
            // Periodic re-probe; the setup-required condition is not
            // retried automatically.
            Connectivity::Offline if !status.setup_required => {
                if self.remote.probe(PRODUCTION_TABLE).is_ok() {
                    info!("connectivity restored");
                    self.go_online_and_sync();
                }
            }
            // Opportunistic timer sync while online.
            Connectivity::Online if status.activity == Activity::Idle => {
                if !self.store.state().unsynced.is_empty() {
                    let result = self.with_syncing(|worker| worker.push());
                    if let Err(err) = result {
                        self.sync_failed(err);
                    }
                }
            }
            _ => {}
        }
    }

    fn sync_requested(&mut self) {
        let status = self.status.read().clone();
        if status.connectivity != Connectivity::Online {
            self.notify("Offline", "Cannot sync while offline; changes are queued locally");
            return;
        }
        if status.activity == Activity::Syncing {
            return;
        }
        let result = self.with_syncing(|worker| worker.push());
        if let Err(err) = result {
            self.sync_failed(err);
        }
    }

    fn with_syncing<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> Result<T, TrackerError>,
    ) -> Result<T, TrackerError> {
        self.set_status(|s| s.activity = Activity::Syncing);
        let result = body(self);
        self.set_status(|s| s.activity = Activity::Idle);
        result
    }

    // --- Full sync (pull, replay, subscribe, push) ---

    fn full_sync(&mut self) -> Result<(), TrackerError> {
        // Capture the pre-pull state: the replay below needs the local
        // settings value when a settings edit is pending.
        let before = self.store.state();

        let settings_rows = self
            .pull(SETTINGS_TABLE)
            .map_err(|e| connectivity_error("settings pull", e))?;
        let production_rows = self
            .pull(PRODUCTION_TABLE)
            .map_err(|e| connectivity_error("production pull", e))?;
        let delivery_rows = self
            .pull(DELIVERY_TABLE)
            .map_err(|e| connectivity_error("delivery pull", e))?;

        let production = parse_rows::<ProductionEntry>(production_rows, PRODUCTION_TABLE);
        let delivery = parse_rows::<DeliveryEntry>(delivery_rows, DELIVERY_TABLE);
        info!(
            production = production.len(),
            delivery = delivery.len(),
            "full pull complete"
        );

        // The pull is authoritative for the collections...
        self.store
            .dispatch_remote(Action::SetProductionEntries(production));
        self.store
            .dispatch_remote(Action::SetDeliveryEntries(delivery));
        if let Some(settings) = settings_rows_payload(settings_rows) {
            self.store
                .dispatch_remote(Action::UpdateSettings(settings));
        }

        // ...but local mutations queued while offline are replayed on
        // top of the fresh snapshot instead of being discarded. The
        // queue itself is untouched; the push below drains it.
        self.replay_unsynced(&before.settings, before.unsynced.settings_dirty);

        self.subscribe_all()?;
        self.push()?;
        Ok(())
    }

    fn pull(&self, table: &str) -> Result<Vec<Value>, RemoteError> {
        Ok(self
            .remote
            .pull_all(table)?
            .into_iter()
            .map(record_from_remote)
            .collect())
    }

    fn replay_unsynced(&self, local_settings: &Settings, settings_dirty: bool) {
        let unsynced = self.store.state().unsynced.clone();

        if !unsynced.production.add.is_empty() {
            self.store
                .dispatch_remote(Action::AddProductionEntries(unsynced.production.add));
        }
        for entry in unsynced.production.update {
            self.store
                .dispatch_remote(Action::UpdateProductionEntry(entry));
        }
        for key in unsynced.production.delete {
            self.store
                .dispatch_remote(Action::DeleteProductionEntry(key));
        }

        if !unsynced.delivery.add.is_empty() {
            self.store
                .dispatch_remote(Action::AddDeliveryEntries(unsynced.delivery.add));
        }
        for entry in unsynced.delivery.update {
            self.store
                .dispatch_remote(Action::UpdateDeliveryEntry(entry));
        }
        for id in unsynced.delivery.delete {
            self.store.dispatch_remote(Action::DeleteDeliveryEntry(id));
        }

        if settings_dirty {
            // Local dispatch: the pending settings edit stays dirty and
            // wins over the pulled value until pushed.
            self.store
                .dispatch(Action::UpdateSettings(local_settings.clone()));
        }
    }

    fn subscribe_all(&mut self) -> Result<(), TrackerError> {
        let settings_filter = format!("id=eq.{SETTINGS_ROW_ID}");
        let channels = [
            (EntityKind::Production, PRODUCTION_TABLE, None),
            (EntityKind::Delivery, DELIVERY_TABLE, None),
            (
                EntityKind::Settings,
                SETTINGS_TABLE,
                Some(settings_filter.as_str()),
            ),
        ];

        for (kind, table, filter) in channels {
            let receiver = self
                .remote
                .subscribe(table, filter)
                .map_err(|e| connectivity_error("subscribe", e))?;
            let mailbox = self.mailbox.clone();
            thread::spawn(move || {
                for change in receiver.iter() {
                    if mailbox.send(WorkerMsg::Remote(kind, change)).is_err() {
                        break;
                    }
                }
            });
        }
        debug!("change subscriptions established");
        Ok(())
    }

    // --- Push ---

    /// Drain the queues against the remote store. Production goes before
    /// delivery before settings (deliveries reference production by
    /// key). Nothing is cleared unless every step succeeds; entries
    /// already pushed before a failing step are not rolled back.
    fn push(&mut self) -> Result<(), TrackerError> {
        let state = self.store.state();
        let unsynced = &state.unsynced;

        if unsynced.is_empty() {
            self.set_status(|s| s.last_sync_at = Some(Utc::now()));
            return Ok(());
        }

        self.upsert_step(
            "production add",
            PRODUCTION_TABLE,
            &unsynced.production.add,
            "taka_number",
        )?;
        self.upsert_step(
            "production update",
            PRODUCTION_TABLE,
            &unsynced.production.update,
            "taka_number",
        )?;
        self.delete_step(
            "production delete",
            PRODUCTION_TABLE,
            &unsynced.production.delete,
            "taka_number",
        )?;

        self.upsert_step("delivery add", DELIVERY_TABLE, &unsynced.delivery.add, "id")?;
        self.upsert_step(
            "delivery update",
            DELIVERY_TABLE,
            &unsynced.delivery.update,
            "id",
        )?;
        self.delete_step("delivery delete", DELIVERY_TABLE, &unsynced.delivery.delete, "id")?;

        if unsynced.settings_dirty {
            let row = json!({
                "id": SETTINGS_ROW_ID,
                "settings": state.settings.sync_payload(),
            });
            self.remote
                .upsert(SETTINGS_TABLE, &[record_to_remote(row)], "id")
                .map_err(|e| push_error("settings update", e))?;
        }

        self.store.dispatch(Action::ClearUnsyncedChanges);
        self.set_status(|s| {
            s.last_sync_at = Some(Utc::now());
            s.last_error = None;
        });
        info!("push complete, queues cleared");
        Ok(())
    }

    fn upsert_step<T: serde::Serialize>(
        &self,
        operation: &str,
        table: &str,
        entries: &[T],
        conflict_key: &str,
    ) -> Result<(), TrackerError> {
        if entries.is_empty() {
            return Ok(());
        }
        let records: Vec<Value> = entries
            .iter()
            .map(|e| record_to_remote(serde_json::to_value(e).unwrap_or(Value::Null)))
            .collect();
        debug!(operation, count = records.len(), "pushing");
        self.remote
            .upsert(table, &records, conflict_key)
            .map_err(|e| push_error(operation, e))
    }

    fn delete_step(
        &self,
        operation: &str,
        table: &str,
        keys: &[String],
        key_column: &str,
    ) -> Result<(), TrackerError> {
        if keys.is_empty() {
            return Ok(());
        }
        debug!(operation, count = keys.len(), "pushing");
        self.remote
            .delete(table, keys, key_column)
            .map_err(|e| push_error(operation, e))
    }

    // --- Remote change merging ---

    /// Merge one change notification into local state. This path uses
    /// remote-origin dispatch, so it never re-enters the
    /// unsynced-changes queue; replayed echoes of our own pushes
    /// deduplicate against existing keys and no-op.
    fn apply_remote(&mut self, kind: EntityKind, change: RemoteChange) {
        let record = record_from_remote(change.record);
        match kind {
            EntityKind::Production => match change.kind {
                ChangeKind::Insert => {
                    if let Some(entry) = parse_record::<ProductionEntry>(record, PRODUCTION_TABLE) {
                        self.store
                            .dispatch_remote(Action::AddProductionEntries(vec![entry]));
                    }
                }
                ChangeKind::Update => {
                    if let Some(entry) = parse_record::<ProductionEntry>(record, PRODUCTION_TABLE) {
                        self.store
                            .dispatch_remote(Action::UpdateProductionEntry(entry));
                    }
                }
                ChangeKind::Delete => {
                    if let Some(key) = record["takaNumber"].as_str() {
                        self.store
                            .dispatch_remote(Action::DeleteProductionEntry(key.to_string()));
                    }
                }
            },
            EntityKind::Delivery => match change.kind {
                ChangeKind::Insert => {
                    if let Some(entry) = parse_record::<DeliveryEntry>(record, DELIVERY_TABLE) {
                        self.store.dispatch_remote(Action::AddDeliveryEntry(entry));
                    }
                }
                ChangeKind::Update => {
                    if let Some(entry) = parse_record::<DeliveryEntry>(record, DELIVERY_TABLE) {
                        self.store
                            .dispatch_remote(Action::UpdateDeliveryEntry(entry));
                    }
                }
                ChangeKind::Delete => {
                    if let Some(id) = record["id"].as_str() {
                        self.store
                            .dispatch_remote(Action::DeleteDeliveryEntry(id.to_string()));
                    }
                }
            },
            EntityKind::Settings => {
                if change.kind == ChangeKind::Delete {
                    return;
                }
                match serde_json::from_value::<Settings>(record["settings"].clone()) {
                    Ok(settings) => {
                        self.store
                            .dispatch_remote(Action::UpdateSettings(settings));
                    }
                    Err(err) => {
                        warn!(error = %err, "ignoring malformed settings notification")
                    }
                }
            }
        }
    }
}

fn connectivity_error(context: &str, err: RemoteError) -> TrackerError {
    match err {
        RemoteError::NotFound(table) => {
            TrackerError::ConnectivitySetup(format!("{context}: table {table} missing"))
        }
        RemoteError::Unavailable(message) => {
            TrackerError::Connectivity(format!("{context}: {message}"))
        }
    }
}

fn push_error(operation: &str, err: RemoteError) -> TrackerError {
    TrackerError::SyncPush {
        operation: operation.to_string(),
        message: err.to_string(),
    }
}

/// Parse pulled rows, skipping (and logging) any malformed ones rather
/// than letting one bad row wedge sync forever.
fn parse_rows<T: serde::de::DeserializeOwned>(rows: Vec<Value>, table: &str) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| parse_record(row, table))
        .collect()
}

fn parse_record<T: serde::de::DeserializeOwned>(record: Value, table: &str) -> Option<T> {
    match serde_json::from_value(record) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(table, error = %err, "skipping malformed remote record");
            None
        }
    }
}

fn settings_rows_payload(rows: Vec<Value>) -> Option<Settings> {
    let row = rows.into_iter().next()?;
    match serde_json::from_value::<Settings>(row["settings"].clone()) {
        Ok(settings) => Some(settings),
        Err(err) => {
            warn!(error = %err, "ignoring malformed remote settings row");
            None
        }
    }
}
