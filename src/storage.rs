// SPDX-License-Identifier: GPL-3.0-only

//! Photo store
//!
//! Each saved photo is two files in the store directory: `<id>.png` holds the
//! encoded image and `<id>.json` the record sidecar. When the directory cannot
//! be used the booth keeps its history in memory for the session instead.

use crate::config::Config;
use crate::errors::StorageError;
use crate::pipelines::photo::CapturedArtifact;
use crate::session::ApertureValue;
use chrono::{DateTime, Duration as ChronoDuration, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Metadata stored alongside a photo; every field is optional so older or
/// hand-written sidecars still load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordMetadata {
    pub aperture: Option<ApertureValue>,
    pub bpm: Option<u32>,
    pub shutter_secs: Option<f64>,
    pub taken_at: Option<DateTime<Local>>,
    pub participant: Option<String>,
    pub room: Option<String>,
    pub note: Option<String>,
}

impl RecordMetadata {
    pub fn from_artifact(artifact: &CapturedArtifact) -> Self {
        let meta = artifact.metadata();
        Self {
            aperture: Some(meta.aperture),
            bpm: Some(meta.bpm),
            shutter_secs: Some(meta.exposure_duration_secs),
            taken_at: Some(meta.taken_at),
            participant: meta.participant.clone(),
            room: meta.room.clone(),
            note: None,
        }
    }
}

/// Stored photo without its image bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSummary {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub size_bytes: u64,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

/// Stored photo with its image bytes
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub summary: PhotoSummary,
    pub bytes: Vec<u8>,
}

/// Space used by the store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageUsage {
    pub photos: usize,
    pub bytes: u64,
}

/// Persistence collaborator of the booth
pub trait PhotoStore: Send + Sync {
    /// Short name for logs, e.g. `disk` or `memory`
    fn kind(&self) -> &'static str;

    /// Store a photo and return its new id
    fn save(&self, bytes: &[u8], metadata: RecordMetadata) -> Result<String, StorageError>;

    /// All photos, newest first
    fn list(&self) -> Result<Vec<PhotoSummary>, StorageError>;

    fn get(&self, id: &str) -> Result<Option<PhotoRecord>, StorageError>;

    /// Returns false when no photo had this id
    fn delete(&self, id: &str) -> Result<bool, StorageError>;

    /// Remove every photo and return how many were removed
    fn clear(&self) -> Result<usize, StorageError>;

    fn usage(&self) -> Result<StorageUsage, StorageError> {
        let photos = self.list()?;
        Ok(StorageUsage {
            photos: photos.len(),
            bytes: photos.iter().map(|p| p.size_bytes).sum(),
        })
    }
}

/// Hands out strictly increasing creation times within a process
#[derive(Debug, Default)]
struct CreationClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl CreationClock {
    fn next(&self) -> Result<DateTime<Utc>, StorageError> {
        let mut last = self
            .last
            .lock()
            .map_err(|_| StorageError::Unavailable("creation clock poisoned".to_string()))?;
        let now = Utc::now();
        let next = match *last {
            Some(previous) if now <= previous => previous + ChronoDuration::microseconds(1),
            _ => now,
        };
        *last = Some(next);
        Ok(next)
    }
}

fn newest_first(photos: &mut [PhotoSummary]) {
    photos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Disk-backed store
#[derive(Debug)]
pub struct FsPhotoStore {
    dir: PathBuf,
    clock: CreationClock,
}

impl FsPhotoStore {
    /// Open (creating if needed) a store in `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| {
            StorageError::Unavailable(format!("{}: {}", dir.display(), e))
        })?;
        info!(dir = %dir.display(), "Photo store opened");
        Ok(Self {
            dir,
            clock: CreationClock::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ids are UUIDs; anything else cannot name a file in the store
    fn paths(&self, id: &str) -> Option<(PathBuf, PathBuf)> {
        let id = Uuid::parse_str(id).ok()?.to_string();
        Some((
            self.dir.join(format!("{}.png", id)),
            self.dir.join(format!("{}.json", id)),
        ))
    }

    fn read_summary(path: &Path) -> Result<PhotoSummary, StorageError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl PhotoStore for FsPhotoStore {
    fn kind(&self) -> &'static str {
        "disk"
    }

    fn save(&self, bytes: &[u8], metadata: RecordMetadata) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();
        let (image_path, record_path) = self
            .paths(&id)
            .ok_or_else(|| StorageError::Corrupt(format!("generated id {} is invalid", id)))?;

        let summary = PhotoSummary {
            id: id.clone(),
            created_at: self.clock.next()?,
            size_bytes: bytes.len() as u64,
            metadata,
        };

        std::fs::write(&image_path, bytes)?;
        let json = serde_json::to_string_pretty(&summary)?;
        if let Err(e) = std::fs::write(&record_path, json) {
            let _ = std::fs::remove_file(&image_path);
            return Err(e.into());
        }

        info!(id = %id, size = bytes.len(), "Photo stored");
        Ok(id)
    }

    fn list(&self) -> Result<Vec<PhotoSummary>, StorageError> {
        let mut photos = Vec::new();
        for entry in std::fs::read_dir(&self.dir)?.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match Self::read_summary(&path) {
                Ok(summary) => photos.push(summary),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable record"),
            }
        }
        newest_first(&mut photos);
        debug!(count = photos.len(), "Listed photos");
        Ok(photos)
    }

    fn get(&self, id: &str) -> Result<Option<PhotoRecord>, StorageError> {
        let Some((image_path, record_path)) = self.paths(id) else {
            return Ok(None);
        };
        if !record_path.exists() {
            return Ok(None);
        }
        let summary = Self::read_summary(&record_path)?;
        let bytes = std::fs::read(&image_path).map_err(|e| {
            StorageError::Corrupt(format!("{}: {}", image_path.display(), e))
        })?;
        Ok(Some(PhotoRecord { summary, bytes }))
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let Some((image_path, record_path)) = self.paths(id) else {
            return Ok(false);
        };
        if !record_path.exists() && !image_path.exists() {
            return Ok(false);
        }
        for path in [&image_path, &record_path] {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        info!(id, "Photo deleted");
        Ok(true)
    }

    fn clear(&self) -> Result<usize, StorageError> {
        let photos = self.list()?;
        let mut removed = 0;
        for photo in &photos {
            if self.delete(&photo.id)? {
                removed += 1;
            }
        }
        info!(removed, "Photo store cleared");
        Ok(removed)
    }
}

/// Session-only store
#[derive(Debug, Default)]
pub struct MemoryPhotoStore {
    records: Mutex<Vec<PhotoRecord>>,
    clock: CreationClock,
}

impl MemoryPhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> Result<std::sync::MutexGuard<'_, Vec<PhotoRecord>>, StorageError> {
        self.records
            .lock()
            .map_err(|_| StorageError::Unavailable("memory store poisoned".to_string()))
    }
}

impl PhotoStore for MemoryPhotoStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    fn save(&self, bytes: &[u8], metadata: RecordMetadata) -> Result<String, StorageError> {
        let id = Uuid::new_v4().to_string();
        let record = PhotoRecord {
            summary: PhotoSummary {
                id: id.clone(),
                created_at: self.clock.next()?,
                size_bytes: bytes.len() as u64,
                metadata,
            },
            bytes: bytes.to_vec(),
        };
        self.records()?.push(record);
        debug!(id = %id, "Photo kept in memory");
        Ok(id)
    }

    fn list(&self) -> Result<Vec<PhotoSummary>, StorageError> {
        let mut photos: Vec<PhotoSummary> =
            self.records()?.iter().map(|r| r.summary.clone()).collect();
        newest_first(&mut photos);
        Ok(photos)
    }

    fn get(&self, id: &str) -> Result<Option<PhotoRecord>, StorageError> {
        Ok(self.records()?.iter().find(|r| r.summary.id == id).cloned())
    }

    fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let mut records = self.records()?;
        let before = records.len();
        records.retain(|r| r.summary.id != id);
        Ok(records.len() != before)
    }

    fn clear(&self) -> Result<usize, StorageError> {
        let mut records = self.records()?;
        let removed = records.len();
        records.clear();
        Ok(removed)
    }
}

/// Disk store in the configured directory, or memory when that fails
pub fn open_photo_store(config: &Config) -> Arc<dyn PhotoStore> {
    match config.photo_directory() {
        Some(dir) => match FsPhotoStore::open(&dir) {
            Ok(store) => return Arc::new(store),
            Err(e) => warn!(error = %e, "Photo store unavailable, keeping photos in memory"),
        },
        None => warn!("No data directory on this system, keeping photos in memory"),
    }
    Arc::new(MemoryPhotoStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("kokoro-store-{}", Uuid::new_v4()))
    }

    fn meta(bpm: u32) -> RecordMetadata {
        RecordMetadata {
            bpm: Some(bpm),
            aperture: ApertureValue::new(8),
            ..RecordMetadata::default()
        }
    }

    fn exercise(store: &dyn PhotoStore) {
        let first = store.save(b"first", meta(60)).unwrap();
        let second = store.save(b"second!", meta(72)).unwrap();

        let listed: Vec<String> = store.list().unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(listed, vec![second.clone(), first.clone()]);

        let record = store.get(&first).unwrap().unwrap();
        assert_eq!(record.bytes, b"first");
        assert_eq!(record.summary.metadata.bpm, Some(60));

        assert_eq!(
            store.usage().unwrap(),
            StorageUsage {
                photos: 2,
                bytes: 12
            }
        );

        assert!(store.delete(&first).unwrap());
        assert!(!store.delete(&first).unwrap());
        assert!(store.get(&first).unwrap().is_none());

        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryPhotoStore::new());
    }

    #[test]
    fn test_disk_store() {
        let dir = temp_dir();
        let store = FsPhotoStore::open(&dir).unwrap();
        exercise(&store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_disk_store_rejects_foreign_ids() {
        let dir = temp_dir();
        let store = FsPhotoStore::open(&dir).unwrap();
        assert!(store.get("../../etc/passwd").unwrap().is_none());
        assert!(!store.delete("not-an-id").unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_disk_store_skips_corrupt_records() {
        let dir = temp_dir();
        let store = FsPhotoStore::open(&dir).unwrap();
        let id = store.save(b"ok", meta(80)).unwrap();
        std::fs::write(dir.join("garbage.json"), "{ nope").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_unusable_directory_falls_back_to_memory() {
        let dir = temp_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let blocker = dir.join("file");
        std::fs::write(&blocker, "not a directory").unwrap();

        let config = Config {
            photo_dir: Some(blocker.join("photos")),
            ..Config::default()
        };
        assert_eq!(open_photo_store(&config).kind(), "memory");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
