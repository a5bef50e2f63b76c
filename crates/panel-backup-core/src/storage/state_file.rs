use chrono::{DateTime, Utc};
use std::fs;
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::models::{PersistentState, ScanRecord, Statistics};
use crate::error::Error;

/// Owner of [`PersistentState`]. Every mutation is applied to a copy, written
/// to disk, and only then made visible, so a failed save leaves memory as it was.
pub struct ScanStore {
    path: Option<PathBuf>,
    state: Mutex<PersistentState>,
}

impl ScanStore {
    /// Load the snapshot at `path`. A missing file means an empty state.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::File::open(&path) {
            Ok(file) => {
                let state: PersistentState = serde_json::from_reader(BufReader::new(file))?;
                info!(
                    "Loaded state from {} ({} cached scans)",
                    path.display(),
                    state.scans.len()
                );
                state
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state file at {}, starting empty", path.display());
                PersistentState::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub fn open_in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(PersistentState::default()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, PersistentState> {
        // State is only replaced wholesale, so a poisoned guard still holds a consistent value.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut PersistentState) -> R) -> Result<R, Error> {
        let mut guard = self.lock();
        let mut next = guard.clone();
        let result = f(&mut next);
        self.write_snapshot(&next)?;
        *guard = next;
        Ok(result)
    }

    fn write_snapshot(&self, state: &PersistentState) -> Result<(), Error> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer_pretty(&mut writer, state)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!("State written to {}", path.display());
        Ok(())
    }

    pub fn snapshot(&self) -> PersistentState {
        self.lock().clone()
    }

    pub fn statistics(&self) -> Statistics {
        self.lock().statistics.clone()
    }

    pub fn sink_id(&self) -> Option<String> {
        self.lock().sink_id.clone()
    }

    pub fn set_sink_id(&self, sink_id: &str) -> Result<(), Error> {
        self.mutate(|state| state.sink_id = Some(sink_id.to_string()))
    }

    /// Counts a scan attempt, whether or not it goes on to produce a record.
    pub fn record_scan_started(&self, at: DateTime<Utc>) -> Result<(), Error> {
        self.mutate(|state| {
            state.statistics.total_scans += 1;
            state.statistics.last_scan_at = Some(at);
        })
    }

    /// Store a new record. If its id is already taken, a `_NNN` suffix is
    /// appended; the stored (possibly renamed) record is returned.
    pub fn insert_scan(&self, mut record: ScanRecord) -> Result<ScanRecord, Error> {
        self.mutate(|state| {
            if state.scans.contains_key(&record.scan_id) {
                let base = record.scan_id.clone();
                let mut seq = 1u32;
                while state.scans.contains_key(&format!("{}_{:03}", base, seq)) {
                    seq += 1;
                }
                record.scan_id = format!("{}_{:03}", base, seq);
                debug!("Scan id {} taken, using {}", base, record.scan_id);
            }
            state.scans.insert(record.scan_id.clone(), record.clone());
            record
        })
    }

    pub fn scan(&self, scan_id: &str) -> Option<ScanRecord> {
        self.lock().scans.get(scan_id).cloned()
    }

    pub fn scans(&self) -> Vec<ScanRecord> {
        self.lock().scans.values().cloned().collect()
    }

    pub fn latest_scan_id(&self) -> Option<String> {
        self.lock().scans.keys().next_back().cloned()
    }

    pub fn scan_count(&self) -> usize {
        self.lock().scans.len()
    }

    pub fn record_backup(
        &self,
        backed_up: u64,
        deletions: u64,
        at: DateTime<Utc>,
    ) -> Result<(), Error> {
        self.mutate(|state| {
            state.statistics.total_backups += backed_up;
            state.statistics.total_deletions += deletions;
            state.statistics.last_backup_at = Some(at);
        })
    }

    /// Drop every cached scan record. Statistics are kept.
    pub fn clear_scans(&self) -> Result<usize, Error> {
        self.mutate(|state| {
            let cleared = state.scans.len();
            state.scans.clear();
            cleared
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::models::FileMatch;
    use chrono::TimeZone;

    fn record(scan_id: &str) -> ScanRecord {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ScanRecord {
            scan_id: scan_id.to_string(),
            created_at: at,
            matches: vec![FileMatch {
                instance_id: "a1b2c3d4".to_string(),
                instance_name: "srv1".to_string(),
                file_path: "data/creds.json".to_string(),
                directory: "/data".to_string(),
                size: 80,
                modified_at: at,
            }],
            instance_count: 1,
            quick_mode: false,
        }
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = ScanStore::open(dir.path().join("state.json")).unwrap();
        assert_eq!(store.snapshot(), PersistentState::default());
    }

    #[test]
    fn test_save_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();

        let store = ScanStore::open(&path).unwrap();
        store.set_sink_id("-100123").unwrap();
        store.record_scan_started(at).unwrap();
        store.insert_scan(record("20240501_120000")).unwrap();
        store.record_backup(2, 1, at).unwrap();

        let reloaded = ScanStore::open(&path).unwrap();
        assert_eq!(reloaded.statistics(), store.statistics());
        assert_eq!(reloaded.snapshot().scans, store.snapshot().scans);
        assert_eq!(reloaded.sink_id().as_deref(), Some("-100123"));
        assert_eq!(reloaded.statistics().total_backups, 2);
        assert_eq!(reloaded.statistics().total_deletions, 1);
    }

    #[test]
    fn test_colliding_scan_ids_get_suffix() {
        let store = ScanStore::open_in_memory();
        let first = store.insert_scan(record("20240501_120000")).unwrap();
        let second = store.insert_scan(record("20240501_120000")).unwrap();
        let third = store.insert_scan(record("20240501_120000")).unwrap();

        assert_eq!(first.scan_id, "20240501_120000");
        assert_eq!(second.scan_id, "20240501_120000_001");
        assert_eq!(third.scan_id, "20240501_120000_002");
        assert_eq!(store.scan_count(), 3);
        assert_eq!(store.latest_scan_id().as_deref(), Some("20240501_120000_002"));
    }

    #[test]
    fn test_suffixed_ids_sort_before_next_second() {
        let store = ScanStore::open_in_memory();
        store.insert_scan(record("20240501_120000")).unwrap();
        store.insert_scan(record("20240501_120000")).unwrap();
        store.insert_scan(record("20240501_120001")).unwrap();
        assert_eq!(store.latest_scan_id().as_deref(), Some("20240501_120001"));
    }

    #[test]
    fn test_clear_scans_keeps_statistics() {
        let store = ScanStore::open_in_memory();
        store.record_scan_started(Utc::now()).unwrap();
        store.insert_scan(record("20240501_120000")).unwrap();
        store.insert_scan(record("20240501_120500")).unwrap();

        assert_eq!(store.clear_scans().unwrap(), 2);
        assert_eq!(store.scan_count(), 0);
        assert_eq!(store.statistics().total_scans, 1);
        assert_eq!(store.clear_scans().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(ScanStore::open(&path), Err(Error::Json(_))));
    }
}
