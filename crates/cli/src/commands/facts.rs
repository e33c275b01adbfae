//! `memline facts` — List active hard facts, newest first.

use super::CliError;
use memline_core::scope::StreamScope;
use std::path::PathBuf;

pub async fn run(config: Option<PathBuf>, scope: StreamScope) -> Result<(), CliError> {
    let service = super::build_service(config).await?;
    let facts = service.active_facts(&scope).await?;

    if facts.is_empty() {
        println!("No active facts for {scope}");
        return Ok(());
    }

    println!("Active facts for {scope}:");
    for fact in facts {
        println!("  {}  [{}] {}", fact.id, fact.category.as_str(), fact.text);
        let key = fact.conflict_key.as_deref().unwrap_or("-");
        println!(
            "      key: {key}  confidence: {:.2}  source: {}",
            fact.provenance.confidence, fact.provenance.extractor
        );
    }

    Ok(())
}
