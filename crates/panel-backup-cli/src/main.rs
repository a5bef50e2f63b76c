mod commands;
mod logging;
mod progress;

use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use panel_backup_core::config::load_configuration_from;
use panel_backup_core::{Action, AppConfig, BackupService, Dispatcher, Reply};
use progress::CliReporter;
use tracing::info;

fn main() -> Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();
    let Some(command) = args.command else {
        Cli::command().print_long_help()?;
        return Ok(());
    };

    let config = load_configuration_from(&args.config)
        .with_context(|| format!("loading configuration '{}'", args.config))?
        .validate()
        .context("invalid configuration")?;

    if let Commands::PrintConfig = command {
        println!("Configuration: {:#?}", redacted(&config));
        return Ok(());
    }

    let service = BackupService::from_config(config).context("starting backup service")?;
    let mut session = Session {
        dispatcher: Dispatcher::new(&service),
        user_id: args.as_user,
        reporter: CliReporter::new(),
    };

    match command {
        Commands::Scan { quick, yes } => {
            let action = if quick {
                Action::QuickScan
            } else {
                Action::FullScan
            };
            let reply = session.run(action)?;
            print_reply(&reply);

            if reply.offers(&Action::StartBackup(None))
                && (yes || prompt_confirm("Back up the files found now?", Some(false))?)
            {
                session.backup(None, yes)?;
            }
        }
        Commands::Backup { scan_id, yes } => {
            let scan_id = scan_id
                .or_else(|| service.latest_scan_id())
                .context("no cached scan to back up; run a scan first")?;
            session.backup(Some(scan_id), yes)?;
        }
        Commands::Clean => print_reply(&session.run(Action::Clean)?),
        Commands::Stats => print_reply(&session.run(Action::Stats)?),
        Commands::Status => print_reply(&session.run(Action::Status)?),
        Commands::SetSink { sink_id } => print_reply(&session.run(Action::SetupSink(sink_id))?),
        Commands::Scans => print_scans(&service),
        Commands::PrintConfig => unreachable!("handled before the service starts"),
    }

    Ok(())
}

struct Session<'a> {
    dispatcher: Dispatcher<'a>,
    user_id: i64,
    reporter: CliReporter,
}

impl Session<'_> {
    fn run(&mut self, action: Action) -> Result<Reply> {
        let id = action.id();
        self.dispatcher
            .dispatch(self.user_id, action, &self.reporter)
            .with_context(|| format!("action '{}' failed", id))
    }

    fn backup(&mut self, scan_id: Option<String>, assume_yes: bool) -> Result<()> {
        let reply = self.run(Action::StartBackup(scan_id))?;
        println!("{}", reply.text.yellow());

        let Some(confirm) = reply
            .choices
            .iter()
            .map(|(_, action)| action)
            .find(|action| matches!(action, Action::ConfirmBackup(_)))
            .cloned()
        else {
            return Ok(());
        };

        if assume_yes || prompt_confirm("Proceed with the backup?", Some(false))? {
            let reply = self.run(confirm)?;
            print_reply(&reply);
        } else {
            print_reply(&self.run(Action::CancelBackup)?);
        }
        Ok(())
    }
}

fn print_reply(reply: &Reply) {
    println!();
    println!("{}", reply.text);
    let next: Vec<String> = reply
        .choices
        .iter()
        .filter(|(_, action)| !matches!(action, Action::Status))
        .map(|(label, action)| format!("{} ({})", label, action.id()))
        .collect();
    if !next.is_empty() {
        println!("\nNext: {}", next.join(", ").cyan());
    }
}

fn print_scans(service: &BackupService) {
    let scans = service.scans();
    if scans.is_empty() {
        println!("No cached scans");
        return;
    }
    for record in scans {
        let label = if record.quick_mode { "quick" } else { "full" };
        println!(
            "{}  {} files on {} servers ({})",
            record.scan_id.green(),
            format!("{}", record.matches.len()).red(),
            record.instance_count,
            label
        );
    }
    info!("{} cached scans", service.cached_scan_count());
}

fn redacted(config: &AppConfig) -> AppConfig {
    let mut shown = config.clone();
    shown.application_api_key = mask(&shown.application_api_key);
    shown.client_api_key = mask(&shown.client_api_key);
    shown
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
