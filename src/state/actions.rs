//! Reducer actions and the pure state transition function.

use crate::persist::PersistedState;
use crate::types::{
    DeliveryEntry, ProductionEntry, Settings, TakaDetail, UnsyncedChanges,
};

/// The whole in-memory application state.
///
/// Snapshots are immutable: every dispatched action produces a fresh
/// value, so collaborators holding an `Arc<AppState>` never observe a
/// partial mutation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AppState {
    pub settings: Settings,
    pub production_entries: Vec<ProductionEntry>,
    pub delivery_entries: Vec<DeliveryEntry>,
    pub unsynced: UnsyncedChanges,
    pub initialized: bool,
    pub online: bool,
}

impl AppState {
    /// Production entry by exact taka-number match.
    pub fn find_production(&self, taka_number: &str) -> Option<&ProductionEntry> {
        self.production_entries
            .iter()
            .find(|e| e.taka_number == taka_number)
    }

    /// Delivery entry referencing the given taka number, if any.
    pub fn find_delivery_by_taka(&self, taka_number: &str) -> Option<&DeliveryEntry> {
        self.delivery_entries
            .iter()
            .find(|e| e.taka_number == taka_number)
    }

    /// Production entries with no corresponding delivery (not yet
    /// shipped).
    pub fn stock(&self) -> Vec<&ProductionEntry> {
        self.production_entries
            .iter()
            .filter(|p| self.find_delivery_by_taka(&p.taka_number).is_none())
            .collect()
    }

    /// Production entry joined with its delivery, for the lookup card.
    pub fn taka_detail(&self, taka_number: &str) -> Option<TakaDetail> {
        let production = self.find_production(taka_number)?.clone();
        let delivery = self.find_delivery_by_taka(taka_number).cloned();
        Some(TakaDetail {
            production,
            delivery,
        })
    }

    /// Production entries belonging to list `n` (1-based), partitioned by
    /// the configured taka ranges. A list with invalid bounds passes all
    /// entries.
    pub fn list_entries(&self, n: u8) -> Vec<&ProductionEntry> {
        let range = self.settings.list_taka_ranges.list(n);
        self.production_entries
            .iter()
            .filter(|e| range.contains(&e.taka_number))
            .collect()
    }
}

/// Where a mutation originated.
///
/// Remote-origin applications come from the sync coordinator merging
/// change notifications; they are already synced by definition and must
/// never re-enter the unsynced-changes queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// The closed set of state mutations.
#[derive(Clone, Debug)]
pub enum Action {
    /// Load the persisted snapshot at startup.
    InitializeState(Box<PersistedState>),
    UpdateSettings(Settings),
    AddProductionEntries(Vec<ProductionEntry>),
    UpdateProductionEntry(ProductionEntry),
    DeleteProductionEntry(String),
    AddDeliveryEntry(DeliveryEntry),
    AddDeliveryEntries(Vec<DeliveryEntry>),
    UpdateDeliveryEntry(DeliveryEntry),
    DeleteDeliveryEntry(String),
    /// Full replacement from a remote pull; never touches the queues.
    SetProductionEntries(Vec<ProductionEntry>),
    /// Full replacement from a remote pull; never touches the queues.
    SetDeliveryEntries(Vec<DeliveryEntry>),
    SetConnectivity(bool),
    /// Reset all queues after a confirmed successful push.
    ClearUnsyncedChanges,
}

impl Action {
    /// Whether this action changes fields that belong in the durable
    /// snapshot. `SetConnectivity` is transient; `InitializeState` *is*
    /// the load, so writing it back would be a no-op.
    pub fn persists(&self) -> bool {
        !matches!(
            self,
            Action::SetConnectivity(_) | Action::InitializeState(_)
        )
    }
}

fn production_key(e: &ProductionEntry) -> &str {
    &e.taka_number
}

fn delivery_key(e: &DeliveryEntry) -> &str {
    &e.id
}

/// Apply an action to a state snapshot, producing the next snapshot.
///
/// Pure: no IO, no side effects. Persistence and sync triggering hang off
/// the store's post-dispatch observers.
pub fn reduce(state: &AppState, action: &Action, origin: Origin) -> AppState {
    let mut next = state.clone();
    let local = origin == Origin::Local;

    match action {
        Action::InitializeState(persisted) => {
            next.settings = state.settings.merge_remote(persisted.settings.clone());
            next.production_entries = persisted.production_entries.clone();
            next.delivery_entries = persisted.delivery_entries.clone();
            next.unsynced = persisted.unsynced.clone();
            next.initialized = true;
        }

        Action::UpdateSettings(settings) => {
            if local {
                next.settings = settings.clone();
                next.unsynced.settings_dirty = true;
            } else {
                next.settings = state.settings.merge_remote(settings.clone());
            }
        }

        Action::AddProductionEntries(batch) => {
            // Idempotent against duplicates within the batch and against
            // existing state.
            let mut survivors: Vec<ProductionEntry> = Vec::new();
            for entry in batch {
                let exists = next.find_production(&entry.taka_number).is_some()
                    || survivors
                        .iter()
                        .any(|s| s.taka_number == entry.taka_number);
                if !exists {
                    survivors.push(entry.clone());
                }
            }
            for entry in survivors {
                if local {
                    next.unsynced.production.queue_add(entry.clone());
                }
                next.production_entries.push(entry);
            }
        }

        Action::UpdateProductionEntry(entry) => {
            let mut replaced = false;
            for existing in next.production_entries.iter_mut() {
                if existing.taka_number == entry.taka_number {
                    *existing = entry.clone();
                    replaced = true;
                }
            }
            if replaced && local {
                next.unsynced.production.queue_update(
                    entry.clone(),
                    &entry.taka_number,
                    production_key,
                );
            }
        }

        Action::DeleteProductionEntry(taka_number) => {
            let before = next.production_entries.len();
            next.production_entries
                .retain(|e| &e.taka_number != taka_number);
            if next.production_entries.len() == before {
                // Unknown key: nothing removed, nothing queued.
                return next;
            }

            // Cascade: a production entry's deliveries go with it.
            let cascaded: Vec<String> = next
                .delivery_entries
                .iter()
                .filter(|d| &d.taka_number == taka_number)
                .map(|d| d.id.clone())
                .collect();
            next.delivery_entries
                .retain(|d| &d.taka_number != taka_number);

            if local {
                next.unsynced
                    .production
                    .queue_delete(taka_number, production_key);
                for id in cascaded {
                    next.unsynced.delivery.queue_delete(&id, delivery_key);
                }
            }
        }

        Action::AddDeliveryEntry(entry) => {
            add_delivery(&mut next, entry, local);
        }

        Action::AddDeliveryEntries(batch) => {
            for entry in batch {
                add_delivery(&mut next, entry, local);
            }
        }

        Action::UpdateDeliveryEntry(entry) => {
            let mut replaced = false;
            for existing in next.delivery_entries.iter_mut() {
                if existing.id == entry.id {
                    *existing = entry.clone();
                    replaced = true;
                }
            }
            if replaced && local {
                next.unsynced
                    .delivery
                    .queue_update(entry.clone(), &entry.id, delivery_key);
            }
        }

        Action::DeleteDeliveryEntry(id) => {
            let before = next.delivery_entries.len();
            next.delivery_entries.retain(|e| &e.id != id);
            if next.delivery_entries.len() < before && local {
                next.unsynced.delivery.queue_delete(id, delivery_key);
            }
        }

        Action::SetProductionEntries(entries) => {
            next.production_entries = entries.clone();
        }

        Action::SetDeliveryEntries(entries) => {
            next.delivery_entries = entries.clone();
        }

        Action::SetConnectivity(online) => {
            next.online = *online;
        }

        Action::ClearUnsyncedChanges => {
            next.unsynced = UnsyncedChanges::default();
        }
    }

    next
}

/// Append a delivery entry unless its id is already present (known
/// duplicates are a deliberate no-op, not an error).
fn add_delivery(next: &mut AppState, entry: &DeliveryEntry, local: bool) {
    if next.delivery_entries.iter().any(|e| e.id == entry.id) {
        return;
    }
    if local {
        next.unsynced.delivery.queue_add(entry.clone());
    }
    next.delivery_entries.push(entry.clone());
}
