//! `memline context` — Print the assembled context for a stream.

use super::CliError;
use memline_core::scope::StreamScope;
use std::path::PathBuf;

pub async fn run(
    config: Option<PathBuf>,
    scope: StreamScope,
    budget: usize,
    stats: bool,
) -> Result<(), CliError> {
    let service = super::build_service(config).await?;
    let ctx = service.get_context(&scope, budget).await?;

    if stats {
        println!("Context for {scope} (budget {budget} chars)");
        println!(
            "  Facts:   {}/{} items, {} chars",
            ctx.facts.included, ctx.facts.total, ctx.facts.chars
        );
        println!(
            "  Turns:   {}/{} items, {} chars",
            ctx.turns.included, ctx.turns.total, ctx.turns.chars
        );
        println!(
            "  Summary: {}/{} items, {} chars",
            ctx.summary.included, ctx.summary.total, ctx.summary.chars
        );
        println!("  Total:   {} chars", ctx.chars_used());
    } else {
        print!("{}", ctx.text);
    }

    Ok(())
}
