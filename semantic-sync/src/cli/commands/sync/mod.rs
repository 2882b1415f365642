mod handler;

pub use handler::{handle_diff_command, handle_sync_command};

use clap::{Args, ValueEnum};

use semantic_sync::diff::SyncMode;
use semantic_sync::sync::SyncRequest;

#[derive(Args)]
pub struct SyncArgs {
    /// Connector to read the wanted model from
    pub source: String,

    /// Connector to change
    pub target: String,

    /// Detect changes but leave the target untouched
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the snapshot of the target taken before applying
    #[arg(long)]
    pub no_snapshot: bool,

    /// Stop applying after this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(flatten)]
    pub detect: DetectArgs,
}

#[derive(Args)]
pub struct DiffArgs {
    /// Connector to read the wanted model from
    pub source: String,

    /// Connector to compare against
    pub target: String,

    #[command(flatten)]
    pub detect: DetectArgs,
}

/// Detector switches shared by `sync` and `diff`
#[derive(Args)]
pub struct DetectArgs {
    /// Which changes to consider (default from config)
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Match table, column and measure names exactly
    #[arg(long)]
    pub case_sensitive: bool,

    /// Leave hidden entities out of the comparison
    #[arg(long)]
    pub ignore_hidden: bool,
}

impl DetectArgs {
    /// Layer the command line switches over the configured request
    pub fn apply(&self, mut request: SyncRequest) -> SyncRequest {
        if let Some(mode) = self.mode {
            request = request.mode(mode.into());
        }
        if self.case_sensitive {
            request = request.case_insensitive(false);
        }
        if self.ignore_hidden {
            request = request.ignore_hidden(true);
        }
        request
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Additions and modifications
    Incremental,
    /// Descriptions, format strings, folders and hidden flags only
    MetadataOnly,
}

impl From<ModeArg> for SyncMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Incremental => SyncMode::Incremental,
            ModeArg::MetadataOnly => SyncMode::MetadataOnly,
        }
    }
}
