use std::sync::Arc;
use tracing::info;

use crate::backup::{BackupPipeline, BackupResult, BackupSettings};
use crate::config::AppConfig;
use crate::engine::ScanEngine;
use crate::error::Error;
use crate::panel::{PanelApi, PanelClient};
use crate::progress::ProgressReporter;
use crate::runs::{RunKey, RunLocks};
use crate::scanner::ScanSettings;
use crate::sink::{LocalDirSink, NotificationSink};
use crate::storage::{ScanRecord, ScanStore, Statistics};

/// Process-wide context: configuration, panel client, store, sink and run
/// locks, built once at start-up and shared by every operation.
pub struct BackupService {
    config: AppConfig,
    store: Arc<ScanStore>,
    sink: Arc<dyn NotificationSink>,
    engine: ScanEngine,
    pipeline: BackupPipeline,
    runs: RunLocks,
}

impl BackupService {
    pub fn new(
        config: AppConfig,
        api: Arc<dyn PanelApi>,
        store: Arc<ScanStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, Error> {
        if let Some(sink_id) = store.sink_id() {
            sink.configure(&sink_id)?;
        }

        let engine = ScanEngine::new(api.clone(), store.clone(), ScanSettings::from(&config));
        let pipeline = BackupPipeline::new(
            api,
            store.clone(),
            sink.clone(),
            BackupSettings::from(&config),
        );

        Ok(Self {
            config,
            store,
            sink,
            engine,
            pipeline,
            runs: RunLocks::new(),
        })
    }

    /// Production wiring: reqwest client, state file and local outbox from `config`.
    pub fn from_config(config: AppConfig) -> Result<Self, Error> {
        let api = Arc::new(PanelClient::from_config(&config)?);
        let store = Arc::new(ScanStore::open(&config.state_path)?);
        let sink = Arc::new(LocalDirSink::new(&config.outbox_dir));
        info!("Service ready for {}", config.panel_url);
        Self::new(config, api, store, sink)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn start_scan(
        &self,
        quick_mode: bool,
        reporter: &dyn ProgressReporter,
    ) -> Result<ScanRecord, Error> {
        let _guard = self
            .runs
            .try_acquire(RunKey::Scan)
            .ok_or_else(|| Error::RunInProgress(RunKey::Scan.to_string()))?;
        self.engine.run_scan(quick_mode, reporter)
    }

    pub fn start_backup(
        &self,
        scan_id: &str,
        reporter: &dyn ProgressReporter,
    ) -> Result<BackupResult, Error> {
        if !self.sink.is_configured() {
            return Err(Error::SinkNotConfigured);
        }
        let record = self
            .store
            .scan(scan_id)
            .ok_or_else(|| Error::ScanNotFound(scan_id.to_string()))?;

        let key = RunKey::Backup(record.scan_id.clone());
        let _guard = self
            .runs
            .try_acquire(key.clone())
            .ok_or_else(|| Error::RunInProgress(key.to_string()))?;
        self.pipeline.run_backup(&record.matches, reporter)
    }

    pub fn is_running(&self, key: &RunKey) -> bool {
        self.runs.is_running(key)
    }

    /// Returns how many cached scan records were dropped.
    pub fn clear_cache(&self) -> Result<usize, Error> {
        let cleared = self.store.clear_scans()?;
        info!("Cleared {} cached scan results", cleared);
        Ok(cleared)
    }

    pub fn statistics(&self) -> Statistics {
        self.store.statistics()
    }

    pub fn set_sink(&self, sink_id: &str) -> Result<(), Error> {
        self.sink.configure(sink_id)?;
        self.store.set_sink_id(sink_id)?;
        info!("Notification sink set to {}", sink_id);
        Ok(())
    }

    pub fn sink_id(&self) -> Option<String> {
        self.store.sink_id()
    }

    pub fn is_sink_configured(&self) -> bool {
        self.sink.is_configured()
    }

    pub fn scan(&self, scan_id: &str) -> Option<ScanRecord> {
        self.store.scan(scan_id)
    }

    pub fn scans(&self) -> Vec<ScanRecord> {
        self.store.scans()
    }

    pub fn latest_scan_id(&self) -> Option<String> {
        self.store.latest_scan_id()
    }

    pub fn cached_scan_count(&self) -> usize {
        self.store.scan_count()
    }
}
