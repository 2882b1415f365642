use anyhow::Result;
use colored::*;

use super::HistoryArgs;
use crate::cli::AppContext;
use crate::cli::output;

pub async fn handle_history_command(ctx: &AppContext, args: HistoryArgs) -> Result<i32> {
    let orchestrator = ctx.orchestrator();

    if let Some(keep) = args.prune {
        let removed = orchestrator.cleanup_history(keep).await?;
        println!("{} {} run(s)", "Removed".green(), removed);
        return Ok(0);
    }

    if let Some(id) = args.id {
        match orchestrator.run(&id).await? {
            Some(run) => output::print_run(&run),
            None => anyhow::bail!("No sync run with id {}", id),
        }
        return Ok(0);
    }

    let runs = orchestrator.history(Some(args.limit)).await?;
    if runs.is_empty() {
        println!("{}", "No sync runs recorded".dimmed());
    }
    for run in &runs {
        output::print_run_line(run);
    }
    Ok(0)
}
