pub mod backup;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod panel;
pub mod progress;
pub mod runs;
pub mod scanner;
pub mod service;
pub mod sink;
pub mod storage;

pub use backup::{BackupPipeline, BackupResult};
pub use config::AppConfig;
pub use dispatch::{Action, Dispatcher, Reply};
pub use engine::ScanEngine;
pub use error::Error;
pub use panel::{PanelApi, PanelClient};
pub use progress::{ProgressReporter, SilentReporter};
pub use service::BackupService;
pub use sink::{LocalDirSink, NotificationSink};
pub use storage::{FileMatch, ScanRecord, ScanStore, Statistics};
