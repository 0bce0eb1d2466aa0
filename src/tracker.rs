//! Main Tracker struct tying all components together.

use crate::error::{Result, TrackerError, ValidationError};
use crate::extract::{ExtractedDelivery, Extractor};
use crate::persist::{acquire_dir_lock, PersistedState, SnapshotFile};
use crate::reconcile::{self, DeliveryCandidate};
use crate::remote::RemoteStore;
use crate::report::{self, DateRange};
use crate::state::{Action, AppState, StateStore};
use crate::sync::SyncCoordinator;
use crate::types::{
    generate_delivery_id, today_delivery_date, DeliveryEntry, ProductionEntry, Settings,
    TakaDetail,
};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Tracker configuration.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Base path for the data directory.
    pub path: PathBuf,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./loomtrack"),
            create_if_missing: true,
        }
    }
}

/// A delivery submission as it comes off the form: party and lot from the
/// header fields, taka/meter per row, machine number optional (scan flows
/// leave it to be resolved during validation).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryDraft {
    pub party_name: String,
    pub lot_number: String,
    pub taka_number: String,
    pub meter: String,
    pub machine_number: Option<String>,
}

/// The application facade.
///
/// Owns the durable snapshot and the state store, constructed once at
/// application start and passed by reference to whatever dispatches
/// intents or renders derived views. There is no ambient singleton; the
/// sync coordinator and extraction collaborators are injected.
pub struct Tracker {
    config: TrackerConfig,

    /// Lock file for exclusive access to the data directory.
    _lock_file: File,

    store: Arc<StateStore>,
}

impl Tracker {
    /// Open an existing data directory or create a new one.
    pub fn open_or_create(config: TrackerConfig) -> Result<Self> {
        if !config.path.exists() && !config.create_if_missing {
            return Err(TrackerError::NotInitialized);
        }
        fs::create_dir_all(&config.path)?;

        let lock_file = acquire_dir_lock(&config.path)?;

        let snapshot = Arc::new(SnapshotFile::new(config.path.join("state.bin")));
        let persisted = snapshot.load()?.unwrap_or_default();

        let store = Arc::new(StateStore::new(AppState::default()));

        // Write-through: every persisted mutation rewrites the snapshot
        // blob, keeping local durability independent of connectivity.
        let sink = Arc::clone(&snapshot);
        store.observe(move |state, action, _origin| {
            if action.persists() {
                if let Err(err) = sink.write(&PersistedState::from_state(state)) {
                    warn!(error = %err, "failed to persist state snapshot");
                }
            }
        });

        store.dispatch(Action::InitializeState(Box::new(persisted)));
        info!(path = %config.path.display(), "tracker opened");

        Ok(Self {
            config,
            _lock_file: lock_file,
            store,
        })
    }

    /// Path of the data directory.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// The underlying state store, for wiring additional observers.
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Current state snapshot.
    pub fn state(&self) -> Arc<AppState> {
        self.store.state()
    }

    // --- Settings ---

    pub fn settings(&self) -> Settings {
        self.store.state().settings.clone()
    }

    pub fn update_settings(&self, settings: Settings) {
        self.store.dispatch(Action::UpdateSettings(settings));
    }

    // --- Production entries ---

    /// Add a batch of production entries. Entries whose taka number
    /// already exists (in state or earlier in the batch) are skipped;
    /// returns how many were actually added.
    pub fn add_production_entries(&self, entries: Vec<ProductionEntry>) -> usize {
        let state = self.store.state();
        let mut added = 0;
        let mut seen: Vec<&str> = Vec::new();
        for entry in &entries {
            if state.find_production(&entry.taka_number).is_none()
                && !seen.contains(&entry.taka_number.as_str())
            {
                seen.push(&entry.taka_number);
                added += 1;
            }
        }
        let skipped = entries.len() - added;
        if skipped > 0 {
            info!(added, skipped, "duplicate taka numbers skipped");
        }
        self.store.dispatch(Action::AddProductionEntries(entries));
        added
    }

    /// Edit a production entry in place (machine/meter/date; the taka
    /// number is the identity and is never reassigned).
    pub fn update_production_entry(&self, entry: ProductionEntry) -> Result<()> {
        if self.store.state().find_production(&entry.taka_number).is_none() {
            return Err(ValidationError::TakaNotFound(entry.taka_number).into());
        }
        self.store.dispatch(Action::UpdateProductionEntry(entry));
        Ok(())
    }

    /// Delete a production entry; its delivery entries go with it.
    pub fn delete_production_entry(&self, taka_number: &str) -> Result<()> {
        if self.store.state().find_production(taka_number).is_none() {
            return Err(ValidationError::TakaNotFound(taka_number.to_string()).into());
        }
        self.store
            .dispatch(Action::DeleteProductionEntry(taka_number.to_string()));
        Ok(())
    }

    // --- Delivery entries ---

    /// Validate and record a single delivery. Single entries never get a
    /// transport-pack number.
    pub fn submit_delivery(
        &self,
        draft: DeliveryDraft,
        active_list: Option<u8>,
    ) -> Result<DeliveryEntry> {
        let state = self.store.state();
        let range = active_list.map(|n| state.settings.list_taka_ranges.list(n));

        let candidate = draft_candidate(&draft);
        let machine_number = reconcile::validate(
            &candidate,
            &state.production_entries,
            &state.delivery_entries,
            range,
        )?;

        let entry = DeliveryEntry::new(
            generate_delivery_id(),
            draft.party_name,
            draft.lot_number,
            today_delivery_date(),
            draft.taka_number,
            draft.meter,
            machine_number,
        )?;
        info!(taka_number = %entry.taka_number, "delivery recorded");
        self.store.dispatch(Action::AddDeliveryEntry(entry.clone()));
        Ok(entry)
    }

    /// Validate and record a batch of deliveries, all-or-nothing. A
    /// batch of more than one entry shares a freshly allocated
    /// transport-pack number.
    pub fn submit_delivery_batch(
        &self,
        drafts: Vec<DeliveryDraft>,
        active_list: Option<u8>,
    ) -> Result<Vec<DeliveryEntry>> {
        let state = self.store.state();
        let range = active_list.map(|n| state.settings.list_taka_ranges.list(n));

        let candidates: Vec<DeliveryCandidate> = drafts.iter().map(draft_candidate).collect();
        let machines = reconcile::validate_batch(
            &candidates,
            &state.production_entries,
            &state.delivery_entries,
            range,
        )?;

        let tp_number = if drafts.len() > 1 {
            Some(reconcile::next_tp_number(&state.delivery_entries))
        } else {
            None
        };

        let delivery_date = today_delivery_date();
        let mut entries = Vec::with_capacity(drafts.len());
        for (draft, machine_number) in drafts.into_iter().zip(machines) {
            let mut entry = DeliveryEntry::new(
                generate_delivery_id(),
                draft.party_name,
                draft.lot_number,
                delivery_date.clone(),
                draft.taka_number,
                draft.meter,
                machine_number,
            )?;
            entry.tp_number = tp_number;
            entries.push(entry);
        }

        info!(count = entries.len(), tp_number, "delivery batch recorded");
        self.store
            .dispatch(Action::AddDeliveryEntries(entries.clone()));
        Ok(entries)
    }

    /// Edit a delivery entry in place (all fields except the id).
    pub fn update_delivery_entry(&self, entry: DeliveryEntry) -> Result<()> {
        if !self
            .store
            .state()
            .delivery_entries
            .iter()
            .any(|e| e.id == entry.id)
        {
            return Err(TrackerError::InvalidEntry(format!(
                "unknown delivery entry: {}",
                entry.id
            )));
        }
        self.store.dispatch(Action::UpdateDeliveryEntry(entry));
        Ok(())
    }

    pub fn delete_delivery_entry(&self, id: &str) -> Result<()> {
        if !self.store.state().delivery_entries.iter().any(|e| e.id == id) {
            return Err(TrackerError::InvalidEntry(format!(
                "unknown delivery entry: {id}"
            )));
        }
        self.store
            .dispatch(Action::DeleteDeliveryEntry(id.to_string()));
        Ok(())
    }

    // --- Scan flows ---

    /// Run production extraction over an image and return the entries
    /// for user confirmation. Nothing is committed until
    /// [`confirm_production_import`](Self::confirm_production_import).
    pub fn scan_production(
        &self,
        extractor: &dyn Extractor,
        image: &[u8],
    ) -> Result<Vec<ProductionEntry>> {
        let extracted = extractor.extract_production(image)?;
        if extracted.is_empty() {
            return Err(crate::error::ExtractionError::Empty.into());
        }
        extracted
            .into_iter()
            .map(|e| ProductionEntry::new(e.taka_number, e.machine_number, e.meter, e.date))
            .collect()
    }

    /// Commit a confirmed production scan. Returns how many entries were
    /// actually added (duplicates skip silently).
    pub fn confirm_production_import(&self, entries: Vec<ProductionEntry>) -> usize {
        self.add_production_entries(entries)
    }

    /// Run delivery extraction over an image and return the rows for
    /// user confirmation.
    pub fn scan_delivery(
        &self,
        extractor: &dyn Extractor,
        image: &[u8],
    ) -> Result<Vec<ExtractedDelivery>> {
        let extracted = extractor.extract_delivery(image)?;
        if extracted.is_empty() {
            return Err(crate::error::ExtractionError::Empty.into());
        }
        Ok(extracted)
    }

    /// Commit a confirmed delivery scan under one party/lot. Machine
    /// numbers are resolved from production records during validation.
    pub fn confirm_delivery_scan(
        &self,
        extracted: Vec<ExtractedDelivery>,
        party_name: &str,
        lot_number: &str,
        active_list: Option<u8>,
    ) -> Result<Vec<DeliveryEntry>> {
        let drafts = extracted
            .into_iter()
            .map(|e| DeliveryDraft {
                party_name: party_name.to_string(),
                lot_number: lot_number.to_string(),
                taka_number: e.taka_number,
                meter: e.meter,
                machine_number: None,
            })
            .collect();
        self.submit_delivery_batch(drafts, active_list)
    }

    // --- Derived views ---

    /// Production entries not yet delivered.
    pub fn stock(&self) -> Vec<ProductionEntry> {
        self.store
            .state()
            .stock()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Production entry joined with its delivery, if any.
    pub fn taka_detail(&self, taka_number: &str) -> Option<TakaDetail> {
        self.store.state().taka_detail(taka_number)
    }

    /// Production entries in list `n` (1-based).
    pub fn list_entries(&self, n: u8) -> Vec<ProductionEntry> {
        self.store
            .state()
            .list_entries(n)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Production entries within an optional date range.
    pub fn production_report(&self, range: Option<DateRange>) -> Vec<ProductionEntry> {
        let state = self.store.state();
        report::production_report(&state.production_entries, range)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Delivery entries within an optional date range.
    pub fn delivery_report(&self, range: Option<DateRange>) -> Vec<DeliveryEntry> {
        let state = self.store.state();
        report::delivery_report(&state.delivery_entries, range)
            .into_iter()
            .cloned()
            .collect()
    }

    // --- Sync ---

    /// Spawn a sync coordinator against the given remote store and kick
    /// off its initial probe-and-sync.
    pub fn connect(&self, remote: Arc<dyn RemoteStore>) -> Result<SyncCoordinator> {
        let coordinator = SyncCoordinator::spawn(Arc::clone(&self.store), remote)?;
        coordinator.initialize();
        Ok(coordinator)
    }
}

fn draft_candidate(draft: &DeliveryDraft) -> DeliveryCandidate {
    DeliveryCandidate {
        taka_number: draft.taka_number.clone(),
        meter: draft.meter.clone(),
        machine_number: draft.machine_number.clone(),
    }
}
