use std::fmt;

use crate::error::Error;
use crate::storage::ScanRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Scanning,
    ScanComplete { scan_id: String, matches: usize },
    AwaitingConfirmation { scan_id: String },
    BackupRunning { scan_id: String },
    BackupComplete { scan_id: String },
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::Idle => write!(f, "idle"),
            WorkflowState::Scanning => write!(f, "scanning"),
            WorkflowState::ScanComplete { scan_id, .. } => write!(f, "scan {} is complete", scan_id),
            WorkflowState::AwaitingConfirmation { scan_id } => {
                write!(f, "waiting for confirmation of scan {}", scan_id)
            }
            WorkflowState::BackupRunning { scan_id } => write!(f, "backing up scan {}", scan_id),
            WorkflowState::BackupComplete { scan_id } => {
                write!(f, "backup of scan {} is complete", scan_id)
            }
        }
    }
}

/// Caller-facing lifecycle of one session:
/// `Idle → Scanning → ScanComplete → AwaitingConfirmation → BackupRunning → BackupComplete`,
/// with `AwaitingConfirmation → Idle` on cancel.
#[derive(Debug, Clone)]
pub struct Workflow {
    state: WorkflowState,
    current_scan_id: Option<String>,
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow {
    pub fn new() -> Self {
        Self {
            state: WorkflowState::Idle,
            current_scan_id: None,
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Latest scan completed in this session.
    pub fn current_scan_id(&self) -> Option<&str> {
        self.current_scan_id.as_deref()
    }

    pub fn pending_scan_id(&self) -> Option<&str> {
        match &self.state {
            WorkflowState::AwaitingConfirmation { scan_id } => Some(scan_id),
            _ => None,
        }
    }

    fn reject(&self, action: &str) -> Error {
        Error::InvalidTransition {
            action: action.to_string(),
            state: self.state.to_string(),
        }
    }

    fn is_settled(&self) -> bool {
        matches!(
            self.state,
            WorkflowState::Idle
                | WorkflowState::ScanComplete { .. }
                | WorkflowState::BackupComplete { .. }
        )
    }

    pub fn begin_scan(&mut self) -> Result<(), Error> {
        if !self.is_settled() {
            return Err(self.reject("start a scan"));
        }
        self.state = WorkflowState::Scanning;
        Ok(())
    }

    pub fn scan_finished(&mut self, record: &ScanRecord) {
        self.current_scan_id = Some(record.scan_id.clone());
        self.state = WorkflowState::ScanComplete {
            scan_id: record.scan_id.clone(),
            matches: record.matches.len(),
        };
    }

    pub fn scan_failed(&mut self) {
        self.state = WorkflowState::Idle;
    }

    /// Move to confirmation for `scan_id`, or for the session's current scan.
    /// A scan that found nothing cannot be backed up.
    pub fn request_backup(&mut self, scan_id: Option<&str>) -> Result<String, Error> {
        if !self.is_settled() {
            return Err(self.reject("start a backup"));
        }
        if let WorkflowState::ScanComplete { matches: 0, scan_id: done } = &self.state {
            if scan_id.is_none() || scan_id == Some(done.as_str()) {
                return Err(self.reject("start a backup"));
            }
        }

        let scan_id = scan_id
            .or(self.current_scan_id.as_deref())
            .map(str::to_string)
            .ok_or_else(|| self.reject("start a backup without a scan"))?;
        self.state = WorkflowState::AwaitingConfirmation {
            scan_id: scan_id.clone(),
        };
        Ok(scan_id)
    }

    pub fn confirm(&mut self, scan_id: &str) -> Result<(), Error> {
        match &self.state {
            WorkflowState::AwaitingConfirmation { scan_id: pending } if pending == scan_id => {
                self.state = WorkflowState::BackupRunning {
                    scan_id: scan_id.to_string(),
                };
                Ok(())
            }
            _ => Err(self.reject(&format!("confirm backup of scan {}", scan_id))),
        }
    }

    pub fn backup_finished(&mut self) {
        if let WorkflowState::BackupRunning { scan_id } = &self.state {
            self.state = WorkflowState::BackupComplete {
                scan_id: scan_id.clone(),
            };
        }
    }

    pub fn backup_failed(&mut self) {
        self.state = WorkflowState::Idle;
    }

    pub fn cancel(&mut self) -> Result<(), Error> {
        match self.state {
            WorkflowState::AwaitingConfirmation { .. } => {
                self.state = WorkflowState::Idle;
                Ok(())
            }
            _ => Err(self.reject("cancel")),
        }
    }
}
