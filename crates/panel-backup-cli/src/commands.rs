use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "panel-backup")]
#[command(about = "Find a target file across panel servers and back it up", long_about = None)]
pub struct Cli {
    /// Configuration file name, without extension
    #[arg(long, default_value = "Config")]
    pub config: String,

    /// User id the commands are issued as (checked against allowed_users)
    #[arg(long, default_value_t = 0)]
    pub as_user: i64,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan every server for the target file
    Scan {
        /// Label the scan as a quick scan
        #[arg(long)]
        quick: bool,
        /// Continue straight into the backup without prompting
        #[arg(long, short)]
        yes: bool,
    },
    /// Back up the files found by a scan (latest scan by default)
    Backup {
        scan_id: Option<String>,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
    },
    /// Drop every cached scan result
    Clean,
    /// Print detailed statistics
    Stats,
    /// Print configuration and sink status
    Status,
    /// Deliver backups to the given sink
    SetSink { sink_id: String },
    /// List cached scans
    Scans,
    /// Print configuration values
    PrintConfig,
}
