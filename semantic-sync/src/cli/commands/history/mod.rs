mod handler;

pub use handler::handle_history_command;

use clap::Args;
use uuid::Uuid;

#[derive(Args)]
pub struct HistoryArgs {
    /// Show one run in full
    #[arg(long)]
    pub id: Option<Uuid>,

    /// Number of runs to list
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Delete finished runs beyond the given number of most recent ones
    #[arg(long, value_name = "KEEP")]
    pub prune: Option<usize>,
}
