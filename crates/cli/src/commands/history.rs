//! `memline history` — Show a fact's supersession chain.

use super::CliError;
use std::path::PathBuf;

pub async fn run(config: Option<PathBuf>, fact_id: &str) -> Result<(), CliError> {
    let service = super::build_service(config).await?;
    let chain = service.history(fact_id).await?;

    println!("Supersession chain (newest first):");
    for fact in chain {
        let marker = if fact.active { "*" } else { " " };
        println!(
            "  {marker} {}  {}  [{}] {}",
            fact.id,
            fact.created_at.format("%Y-%m-%d %H:%M"),
            fact.category.as_str(),
            fact.text
        );
    }

    Ok(())
}
