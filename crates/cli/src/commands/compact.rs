//! `memline compact` — Force a compaction cycle.

use super::CliError;
use memline_core::scope::StreamScope;
use std::path::PathBuf;

pub async fn run(config: Option<PathBuf>, scope: StreamScope) -> Result<(), CliError> {
    let service = super::build_service(config).await?;

    match service.compact(&scope).await? {
        Some(report) => {
            println!(
                "Compacted turns {}..{} on {scope}",
                report.summary.turn_range_start, report.summary.turn_range_end
            );
            println!("  Window size: {}", report.window_after);
        }
        None => println!("Nothing to compact on {scope}"),
    }

    Ok(())
}
