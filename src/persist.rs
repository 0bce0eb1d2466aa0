//! Durable local storage: the single keyed snapshot blob.
//!
//! The whole persisted state (credential-free settings, both entry
//! collections, and the unsynced-changes queue) is read once at startup
//! and rewritten on every persisted mutation. At the scale of hundreds to
//! low thousands of entries a whole-blob rewrite per mutation is the
//! simplest thing that is durable.

use crate::error::{Result, TrackerError};
use crate::state::AppState;
use crate::types::{DeliveryEntry, ProductionEntry, Settings, UnsyncedChanges};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for the snapshot file.
const SNAPSHOT_MAGIC: &[u8; 4] = b"LOM\0";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u8 = 1;

/// The persisted shape of the application state.
///
/// Connection credentials are excluded by construction (`Settings` skips
/// them during serialization), so reloading a snapshot can never
/// overwrite live credentials.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub production_entries: Vec<ProductionEntry>,
    #[serde(default)]
    pub delivery_entries: Vec<DeliveryEntry>,
    #[serde(default)]
    pub unsynced: UnsyncedChanges,
}

impl PersistedState {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            settings: state.settings.clone(),
            production_entries: state.production_entries.clone(),
            delivery_entries: state.delivery_entries.clone(),
            unsynced: state.unsynced.clone(),
        }
    }
}

/// The on-disk snapshot blob.
///
/// Layout: magic, version byte, little-endian u32 payload length, JSON
/// payload, little-endian u32 CRC32 of the payload. Writes go to a temp
/// file that is renamed into place, so a crash mid-write leaves the
/// previous snapshot intact.
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot, or `None` when no snapshot exists yet.
    pub fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&self.path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != SNAPSHOT_MAGIC {
            return Err(TrackerError::Corruption("invalid snapshot magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != SNAPSHOT_VERSION {
            return Err(TrackerError::Corruption(format!(
                "unsupported snapshot version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 4];
        file.read_exact(&mut len_bytes)?;
        let len = u32::from_le_bytes(len_bytes) as usize;

        let mut payload = vec![0u8; len];
        file.read_exact(&mut payload)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored = u32::from_le_bytes(checksum_bytes);
        let computed = crc32fast::hash(&payload);
        if stored != computed {
            return Err(TrackerError::Corruption(format!(
                "snapshot checksum mismatch: expected {stored}, got {computed}"
            )));
        }

        let state: PersistedState = serde_json::from_slice(&payload)
            .map_err(|e| TrackerError::Deserialization(e.to_string()))?;
        Ok(Some(state))
    }

    /// Write the snapshot atomically.
    pub fn write(&self, state: &PersistedState) -> Result<()> {
        let payload = serde_json::to_vec(state)?;

        let tmp_path = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(SNAPSHOT_MAGIC)?;
            file.write_all(&[SNAPSHOT_VERSION])?;
            file.write_all(&(payload.len() as u32).to_le_bytes())?;
            file.write_all(&payload)?;
            file.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;

        Ok(())
    }
}

/// Take the exclusive lock on a data directory.
///
/// The returned handle must be kept alive for as long as the directory is
/// in use; dropping it releases the lock.
pub fn acquire_dir_lock(path: &Path) -> Result<File> {
    let lock_path = path.join("LOCK");
    let lock_file = File::create(lock_path)?;

    lock_file
        .try_lock_exclusive()
        .map_err(|_| TrackerError::Locked)?;

    Ok(lock_file)
}
