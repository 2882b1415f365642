mod handler;

pub use handler::handle_snapshot_command;

use clap::Subcommand;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Capture the live model of a connector
    Create {
        /// Connector to capture
        source: String,

        /// Free-form note stored with the snapshot
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// List snapshots, newest first
    List {
        /// Only snapshots of this connector
        #[arg(long)]
        source: Option<String>,

        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show the model stored in a snapshot
    Show { id: Uuid },
    /// Revert a target to the state captured in a snapshot
    Restore {
        id: Uuid,

        /// Connector to revert
        target: String,

        /// Show the changes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Only compute the change set; the applier is not run at all
        #[arg(long, conflicts_with = "dry_run")]
        plan: bool,

        /// Also drop tables created after the snapshot
        #[arg(long)]
        remove_new_tables: bool,
    },
    /// Delete one snapshot
    Delete { id: Uuid },
    /// Delete all but the most recent snapshots
    Cleanup {
        /// How many to keep (default from config)
        #[arg(long)]
        keep: Option<usize>,
    },
}
