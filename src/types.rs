//! Core types for the tracker.

use crate::error::{Result, TrackerError};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A record of one taka's manufacture.
///
/// `taka_number` is the natural key: unique across all production entries
/// and never reassigned by edits. `meter` and `date` are kept as text in
/// their handwritten forms ("104.50", "15/8/25"); normalization is a
/// caller concern.
///
/// Serialized field names are camelCase so the on-disk snapshot matches
/// the shape the entries were historically stored in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionEntry {
    /// Remote identity column; present only on rows pulled from the
    /// remote store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub taka_number: String,
    pub machine_number: String,
    pub meter: String,
    pub date: String,
}

impl ProductionEntry {
    /// Create a new production entry. Rejects a blank `taka_number`;
    /// field format validation beyond that is a form-layer concern.
    pub fn new(
        taka_number: impl Into<String>,
        machine_number: impl Into<String>,
        meter: impl Into<String>,
        date: impl Into<String>,
    ) -> Result<Self> {
        let taka_number = taka_number.into();
        if taka_number.trim().is_empty() {
            return Err(TrackerError::InvalidEntry(
                "production entry requires a taka number".into(),
            ));
        }
        Ok(Self {
            id: None,
            taka_number,
            machine_number: machine_number.into(),
            meter: meter.into(),
            date: date.into(),
        })
    }
}

/// A record of one taka being shipped to a party.
///
/// A given `taka_number` may appear in at most one delivery entry: a taka
/// can be delivered only once. `tp_number` groups entries that were
/// delivered together in one scan batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryEntry {
    /// Generated locally (timestamp + random suffix) or supplied by the
    /// remote store.
    pub id: String,
    pub party_name: String,
    pub lot_number: String,
    pub delivery_date: String,
    pub taka_number: String,
    pub meter: String,
    pub machine_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp_number: Option<u32>,
}

impl DeliveryEntry {
    /// Create a new delivery entry. Rejects blank identity fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        party_name: impl Into<String>,
        lot_number: impl Into<String>,
        delivery_date: impl Into<String>,
        taka_number: impl Into<String>,
        meter: impl Into<String>,
        machine_number: impl Into<String>,
    ) -> Result<Self> {
        let id = id.into();
        let taka_number = taka_number.into();
        if id.trim().is_empty() {
            return Err(TrackerError::InvalidEntry(
                "delivery entry requires an id".into(),
            ));
        }
        if taka_number.trim().is_empty() {
            return Err(TrackerError::InvalidEntry(
                "delivery entry requires a taka number".into(),
            ));
        }
        Ok(Self {
            id,
            party_name: party_name.into(),
            lot_number: lot_number.into(),
            delivery_date: delivery_date.into(),
            taka_number,
            meter: meter.into(),
            machine_number: machine_number.into(),
            tp_number: None,
        })
    }
}

/// Generate a locally unique delivery id: unix milliseconds plus a short
/// random suffix.
pub fn generate_delivery_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", millis, &suffix[..8])
}

/// Today's date in the dd/mm/yyyy form delivery entries use.
pub fn today_delivery_date() -> String {
    chrono::Local::now().format("%d/%m/%Y").to_string()
}

/// An inclusive numeric taka-number range partitioning production entries
/// into a named list.
///
/// Bounds are kept as text (they come straight from a form). A range with
/// a missing or non-numeric bound is inactive and passes all entries
/// unfiltered.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakaRange {
    #[serde(default)]
    pub start: String,
    #[serde(default)]
    pub end: String,
}

impl TakaRange {
    /// Parsed inclusive bounds, or `None` when either bound is missing or
    /// non-numeric (the range is then a no-op filter).
    pub fn bounds(&self) -> Option<(i64, i64)> {
        let start = self.start.trim().parse::<i64>().ok()?;
        let end = self.end.trim().parse::<i64>().ok()?;
        Some((start, end))
    }

    /// Whether `taka_number` falls inside this range. With no valid
    /// bounds every entry passes; with valid bounds a non-numeric taka
    /// number cannot fall inside them.
    pub fn contains(&self, taka_number: &str) -> bool {
        match self.bounds() {
            None => true,
            Some((start, end)) => taka_number
                .trim()
                .parse::<i64>()
                .map(|n| n >= start && n <= end)
                .unwrap_or(false),
        }
    }
}

/// Up to three named list ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListTakaRanges {
    #[serde(default)]
    pub list1: TakaRange,
    #[serde(default)]
    pub list2: TakaRange,
    #[serde(default)]
    pub list3: TakaRange,
}

impl ListTakaRanges {
    /// Range for list `n` (1-based). Out-of-range list numbers get a
    /// default (pass-all) range.
    pub fn list(&self, n: u8) -> &TakaRange {
        static PASS_ALL: TakaRange = TakaRange {
            start: String::new(),
            end: String::new(),
        };
        match n {
            1 => &self.list1,
            2 => &self.list2,
            3 => &self.list3,
            _ => &PASS_ALL,
        }
    }
}

/// Application settings (singleton).
///
/// Connection credentials are held client-side only: they are skipped by
/// serde, so they appear neither in the durable snapshot nor in the
/// settings payload synced to the remote store (which would otherwise
/// overwrite live credentials on other devices).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(skip)]
    pub scan_api_key: String,
    #[serde(skip)]
    pub remote_url: String,
    #[serde(skip)]
    pub remote_key: String,
    /// Number of parallel production lists (1-3).
    #[serde(default = "default_production_tables")]
    pub production_tables: u8,
    #[serde(default = "default_max_machine_number")]
    pub max_machine_number: u32,
    #[serde(default)]
    pub list_taka_ranges: ListTakaRanges,
}

fn default_production_tables() -> u8 {
    1
}

fn default_max_machine_number() -> u32 {
    1
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_api_key: String::new(),
            remote_url: String::new(),
            remote_key: String::new(),
            production_tables: default_production_tables(),
            max_machine_number: default_max_machine_number(),
            list_taka_ranges: ListTakaRanges::default(),
        }
    }
}

impl Settings {
    /// The credential-free record synced to the remote settings row and
    /// written to the durable snapshot.
    pub fn sync_payload(&self) -> serde_json::Value {
        // Credentials are #[serde(skip)], so plain serialization is
        // already the filtered payload.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Merge a remote settings payload into this one, preserving the
    /// local connection credentials.
    pub fn merge_remote(&self, remote: Settings) -> Settings {
        Settings {
            scan_api_key: self.scan_api_key.clone(),
            remote_url: self.remote_url.clone(),
            remote_key: self.remote_key.clone(),
            ..remote
        }
    }

    /// Whether remote credentials are configured.
    pub fn has_remote_credentials(&self) -> bool {
        !self.remote_url.trim().is_empty() && !self.remote_key.trim().is_empty()
    }
}

/// Pending local mutations for one entity type.
///
/// Acts as a write-ahead queue of mutations not yet confirmed persisted
/// remotely. `delete` tracks keys only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChangeQueue<T> {
    #[serde(default = "Vec::new")]
    pub add: Vec<T>,
    #[serde(default = "Vec::new")]
    pub update: Vec<T>,
    #[serde(default = "Vec::new")]
    pub delete: Vec<String>,
}

// Manual impl: the derive would needlessly require `T: Default`.
impl<T> Default for ChangeQueue<T> {
    fn default() -> Self {
        Self {
            add: Vec::new(),
            update: Vec::new(),
            delete: Vec::new(),
        }
    }
}

impl<T: Clone> ChangeQueue<T> {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Queue a freshly created item for push.
    pub fn queue_add(&mut self, item: T) {
        self.add.push(item);
    }

    /// Queue an updated value, last-write-wins per key.
    pub fn queue_update(&mut self, item: T, key: &str, key_of: fn(&T) -> &str) {
        self.update.retain(|queued| key_of(queued) != key);
        self.update.push(item);
    }

    /// Queue a deletion for `key`, cancelling any pending add or update.
    ///
    /// When an add was still queued the record was never pushed, so there
    /// is nothing to delete remotely: the add is dropped and no delete is
    /// queued. Otherwise only the delete survives.
    pub fn queue_delete(&mut self, key: &str, key_of: fn(&T) -> &str) {
        let had_pending_add = self.add.iter().any(|queued| key_of(queued) == key);
        self.add.retain(|queued| key_of(queued) != key);
        self.update.retain(|queued| key_of(queued) != key);
        if !had_pending_add && !self.delete.iter().any(|k| k == key) {
            self.delete.push(key.to_string());
        }
    }
}

/// Per-entity-type queues of pending local mutations plus the
/// settings-dirty flag.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsyncedChanges {
    #[serde(default)]
    pub production: ChangeQueue<ProductionEntry>,
    #[serde(default)]
    pub delivery: ChangeQueue<DeliveryEntry>,
    #[serde(default)]
    pub settings_dirty: bool,
}

impl UnsyncedChanges {
    pub fn is_empty(&self) -> bool {
        self.production.is_empty() && self.delivery.is_empty() && !self.settings_dirty
    }
}

/// Production-entry detail joined with its delivery, if any (the
/// dashboard lookup card).
#[derive(Clone, Debug, PartialEq)]
pub struct TakaDetail {
    pub production: ProductionEntry,
    pub delivery: Option<DeliveryEntry>,
}

impl TakaDetail {
    pub fn is_delivered(&self) -> bool {
        self.delivery.is_some()
    }
}
