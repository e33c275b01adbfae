//! `memline correct` — Enter a human correction.

use super::CliError;
use memline_core::fact::FactCategory;
use memline_core::scope::StreamScope;
use std::path::PathBuf;

pub async fn run(
    config: Option<PathBuf>,
    scope: StreamScope,
    text: &str,
    key: Option<String>,
    category: &str,
) -> Result<(), CliError> {
    let category = FactCategory::parse(category)
        .ok_or_else(|| format!("unknown fact category '{category}'"))?;

    let service = super::build_service(config).await?;
    let fact = service.propose_fact(&scope, key, text, category).await?;

    println!("Recorded correction {}", fact.id);
    println!("  [{}] {}", fact.category.as_str(), fact.text);
    if let Some(old) = &fact.supersedes {
        println!("  Supersedes {old}");
    }

    Ok(())
}
