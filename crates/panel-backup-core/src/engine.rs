use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::error::Error;
use crate::panel::PanelApi;
use crate::progress::{ProgressReporter, ScanProgress};
use crate::scanner::{InstanceScanner, ScanSettings};
use crate::storage::{ScanRecord, ScanStore};

/// Format of scan ids: creation time to the second, so ids sort by age.
pub const SCAN_ID_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn scan_id_for(at: DateTime<Utc>) -> String {
    at.format(SCAN_ID_FORMAT).to_string()
}

/// Fleet-wide scan: every instance, one after another.
pub struct ScanEngine {
    api: Arc<dyn PanelApi>,
    store: Arc<ScanStore>,
    settings: ScanSettings,
}

impl ScanEngine {
    pub fn new(api: Arc<dyn PanelApi>, store: Arc<ScanStore>, settings: ScanSettings) -> Self {
        Self {
            api,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Run the full pipeline:
    /// 1. Count the attempt in the statistics
    /// 2. Enumerate instances (failure or empty fleet ends the run)
    /// 3. Scan each instance, skipping ones whose root cannot be read
    /// 4. Store the record
    pub fn run_scan(
        &self,
        quick_mode: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanRecord, Error> {
        info!("Starting server scan...");
        self.store.record_scan_started(Utc::now())?;

        let instances = self.api.list_instances()?;
        if instances.is_empty() {
            return Err(Error::NoInstances);
        }

        let total = instances.len();
        reporter.on_scan_start(total);
        let scan_start = Instant::now();
        let scanner = InstanceScanner::new(self.api.as_ref(), &self.settings);
        let mut matches = Vec::new();

        for (i, instance) in instances.iter().enumerate() {
            reporter.on_instance_progress(&ScanProgress {
                index: i + 1,
                total,
                instance_name: &instance.name,
                matches_so_far: matches.len(),
            });

            match scanner.scan_instance(&instance.id, &instance.name) {
                Ok(found) => matches.extend(found),
                Err(err) => error!("Error scanning server {}: {}", instance.name, err),
            }
        }

        let created_at = Utc::now();
        let record = self.store.insert_scan(ScanRecord {
            scan_id: scan_id_for(created_at),
            created_at,
            matches,
            instance_count: total,
            quick_mode,
        })?;

        let duration = scan_start.elapsed();
        info!(
            "Scan {} completed in {:.2}s: {} matches across {} servers",
            record.scan_id,
            duration.as_secs_f64(),
            record.matches.len(),
            total,
        );
        reporter.on_scan_complete(&record, duration.as_secs_f64());

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_scan_id_format() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 5, 7).unwrap();
        assert_eq!(scan_id_for(at), "20240501_090507");
    }

    #[test]
    fn test_scan_ids_sort_chronologically() {
        let earlier = scan_id_for(Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 59).unwrap());
        let later = scan_id_for(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap());
        assert!(earlier < later);
    }
}
