//! `memline record` — Ingest one dialogue turn.

use super::CliError;
use memline_core::scope::StreamScope;
use memline_core::turn::{Citation, TurnRole};
use std::path::PathBuf;

pub async fn run(
    config: Option<PathBuf>,
    scope: StreamScope,
    role: &str,
    content: &str,
    citations: Vec<String>,
) -> Result<(), CliError> {
    let role = match role {
        "user" => TurnRole::User,
        "assistant" => TurnRole::Assistant,
        other => return Err(format!("unknown role '{other}' (expected user|assistant)").into()),
    };
    let citations = citations
        .iter()
        .map(|raw| parse_citation(raw))
        .collect::<Result<Vec<_>, CliError>>()?;

    let service = super::build_service(config).await?;
    let receipt = service.record_turn(&scope, role, content, citations).await?;

    println!("Recorded turn {} on {}", receipt.turn.number, scope);
    println!("  Window size: {}", receipt.window_size);
    if let Some(report) = &receipt.extraction {
        if !report.merged.is_empty() {
            println!("  Facts merged: {}", report.merged.len());
            for fact in &report.merged {
                println!("    [{}] {}", fact.category.as_str(), fact.text);
            }
        }
        if report.discarded_low_confidence > 0 {
            println!(
                "  Discarded (low confidence): {}",
                report.discarded_low_confidence
            );
        }
        if !report.failures.is_empty() {
            println!("  Merge failures: {}", report.failures.len());
        }
    }
    if let Some(compaction) = &receipt.compaction {
        println!(
            "  Compacted turns {}..{}",
            compaction.summary.turn_range_start, compaction.summary.turn_range_end
        );
    }

    Ok(())
}

/// Parse `source_type:item_count[:date_range]`.
fn parse_citation(raw: &str) -> Result<Citation, CliError> {
    let mut parts = raw.splitn(3, ':');
    let source_type = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("invalid citation '{raw}'"))?;
    let item_count: u32 = parts
        .next()
        .ok_or_else(|| format!("citation '{raw}' is missing an item count"))?
        .parse()
        .map_err(|_| format!("citation '{raw}' has a non-numeric item count"))?;
    let date_range = parts.next().map(str::to_string);

    Ok(Citation {
        source_type: source_type.to_string(),
        item_count,
        date_range,
    })
}
