//! Maps front-end action identifiers onto service calls. The front-end owns
//! rendering; it gets back plain text plus the follow-up actions to offer.

pub mod replies;
mod workflow;

use std::str::FromStr;
use tracing::{info, warn};

use crate::error::Error;
use crate::progress::ProgressReporter;
use crate::service::BackupService;

pub use workflow::{Workflow, WorkflowState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetupSink(String),
    QuickScan,
    FullScan,
    Status,
    Stats,
    Help,
    Clean,
    /// `None` backs up the session's current scan.
    StartBackup(Option<String>),
    ConfirmBackup(String),
    CancelBackup,
}

impl Action {
    /// Identifier a front-end attaches to a button for this action.
    pub fn id(&self) -> String {
        match self {
            Action::SetupSink(sink_id) => format!("setup_sink:{}", sink_id),
            Action::QuickScan => "quick_scan".to_string(),
            Action::FullScan => "scan".to_string(),
            Action::Status => "status".to_string(),
            Action::Stats => "stats".to_string(),
            Action::Help => "help".to_string(),
            Action::Clean => "clean".to_string(),
            Action::StartBackup(None) => "start_backup".to_string(),
            Action::StartBackup(Some(scan_id)) => format!("start_backup_{}", scan_id),
            Action::ConfirmBackup(scan_id) => format!("confirm_backup_{}", scan_id),
            Action::CancelBackup => "cancel_backup".to_string(),
        }
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches('/');
        if let Some(sink_id) = s
            .strip_prefix("setup_sink:")
            .or_else(|| s.strip_prefix("setup_log:"))
        {
            if sink_id.is_empty() {
                return Err(Error::Other("setup needs a sink id".to_string()));
            }
            return Ok(Action::SetupSink(sink_id.to_string()));
        }
        if let Some(scan_id) = s.strip_prefix("confirm_backup_") {
            return Ok(Action::ConfirmBackup(scan_id.to_string()));
        }
        if let Some(scan_id) = s.strip_prefix("start_backup_") {
            return Ok(Action::StartBackup(Some(scan_id.to_string())));
        }

        match s {
            "quick_scan" => Ok(Action::QuickScan),
            "scan" => Ok(Action::FullScan),
            "status" | "bot_status" => Ok(Action::Status),
            "stats" => Ok(Action::Stats),
            "help" | "show_help" | "start" => Ok(Action::Help),
            "clean" => Ok(Action::Clean),
            "start_backup" => Ok(Action::StartBackup(None)),
            "cancel_backup" => Ok(Action::CancelBackup),
            other => Err(Error::Other(format!("unknown action '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    /// `(label, action)` pairs the front-end may offer next.
    pub choices: Vec<(String, Action)>,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
        }
    }

    fn choice(mut self, label: &str, action: Action) -> Self {
        self.choices.push((label.to_string(), action));
        self
    }

    pub fn offers(&self, action: &Action) -> bool {
        self.choices.iter().any(|(_, a)| a == action)
    }
}

/// One front-end session (a chat, a terminal) driving the shared service.
pub struct Dispatcher<'a> {
    service: &'a BackupService,
    workflow: Workflow,
}

impl<'a> Dispatcher<'a> {
    pub fn new(service: &'a BackupService) -> Self {
        Self {
            service,
            workflow: Workflow::new(),
        }
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn dispatch(
        &mut self,
        user_id: i64,
        action: Action,
        reporter: &dyn ProgressReporter,
    ) -> Result<Reply, Error> {
        if !self.service.config().is_user_allowed(user_id) {
            warn!("Rejected {} from user {}", action.id(), user_id);
            return Err(Error::Unauthorized(user_id));
        }
        info!("User {} -> {}", user_id, action.id());

        match action {
            Action::SetupSink(sink_id) => {
                self.service.set_sink(&sink_id)?;
                Ok(Reply::text(format!(
                    "Sink configured!\n\nSink ID: {}\nBackup files will be delivered there.",
                    sink_id
                )))
            }
            Action::QuickScan => self.scan(true, reporter),
            Action::FullScan => self.scan(false, reporter),
            Action::Status => {
                let sink_id = self.service.sink_id();
                Ok(Reply::text(replies::status_report(
                    self.service.config(),
                    sink_id.as_deref(),
                    &self.service.statistics(),
                ))
                .choice("Refresh", Action::Status))
            }
            Action::Stats => Ok(Reply::text(replies::statistics_report(
                self.service.config(),
                &self.service.statistics(),
                self.service.cached_scan_count(),
            ))),
            Action::Help => Ok(Reply::text(replies::HELP_TEXT)),
            Action::Clean => {
                let cleared = self.service.clear_cache()?;
                Ok(Reply::text(replies::cache_cleared(cleared)))
            }
            Action::StartBackup(scan_id) => self.request_backup(scan_id.as_deref()),
            Action::ConfirmBackup(scan_id) => self.confirm_backup(&scan_id, reporter),
            Action::CancelBackup => {
                self.workflow.cancel()?;
                Ok(Reply::text("Backup cancelled by user."))
            }
        }
    }

    fn sink_missing() -> Reply {
        Reply::text("Sink is not configured! Set one up first.")
            .choice("Setup sink", Action::Help)
    }

    fn scan(&mut self, quick_mode: bool, reporter: &dyn ProgressReporter) -> Result<Reply, Error> {
        if !self.service.is_sink_configured() {
            return Ok(Self::sink_missing());
        }

        self.workflow.begin_scan()?;
        let record = match self.service.start_scan(quick_mode, reporter) {
            Ok(record) => record,
            Err(err) => {
                self.workflow.scan_failed();
                return Err(err);
            }
        };
        self.workflow.scan_finished(&record);

        let reply = Reply::text(replies::scan_summary(
            &record,
            &self.service.config().target_filename,
        ));
        if record.matches.is_empty() {
            Ok(reply)
        } else {
            Ok(reply.choice("Start Backup", Action::StartBackup(None)))
        }
    }

    fn request_backup(&mut self, scan_id: Option<&str>) -> Result<Reply, Error> {
        let scan_id = self.workflow.request_backup(scan_id)?;
        let Some(record) = self.service.scan(&scan_id) else {
            self.workflow.cancel()?;
            return Err(Error::ScanNotFound(scan_id));
        };

        Ok(Reply::text(replies::backup_confirmation(
            &record,
            self.service.config().auto_delete,
        ))
        .choice("Yes, continue", Action::ConfirmBackup(scan_id))
        .choice("Cancel", Action::CancelBackup))
    }

    fn confirm_backup(
        &mut self,
        scan_id: &str,
        reporter: &dyn ProgressReporter,
    ) -> Result<Reply, Error> {
        if !self.service.is_sink_configured() {
            return Ok(Self::sink_missing());
        }

        self.workflow.confirm(scan_id)?;
        match self.service.start_backup(scan_id, reporter) {
            Ok(result) => {
                self.workflow.backup_finished();
                Ok(Reply::text(replies::backup_summary(&result)))
            }
            Err(err) => {
                self.workflow.backup_failed();
                Err(err)
            }
        }
    }
}
