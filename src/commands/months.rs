/// `months` command: list month scopes with their review progress.
use std::path::Path;

use anyhow::{Context, Result};

use super::{load_config, open_library, parse_month, scan};

pub async fn run(config_path: &Path, dir: &Path, complete_before: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let library = open_library(&config)?;
    let mut scopes = scan(dir).await?;

    if scopes.is_empty() {
        println!("📭 No photos or videos found in {}", dir.display());
        return Ok(());
    }

    if let Some(month) = complete_before {
        let (year, month) = parse_month(month)?;
        let marked = library
            .mark_scopes_completed_before(&scopes, year, month)
            .context("Failed to mark earlier months complete")?;
        println!("✅ Marked {marked} earlier month(s) as reviewed");
    }

    library
        .load_progress(&mut scopes)
        .context("Failed to read review progress")?;

    println!("📅 {} month(s) in {}", scopes.len(), dir.display());
    for scope in &scopes {
        let marker = if scope.is_completed() { "✅" } else { "  " };
        println!(
            "{marker} {:<8} {:<10} {:>5}/{:<5} {:>3.0}%",
            scope.id().as_str(),
            scope.display_name(),
            scope.reviewed_count,
            scope.total_count(),
            scope.progress() * 100.0,
        );
    }

    let remaining: usize = scopes.iter().map(|s| s.remaining_count()).sum();
    println!("{remaining} item(s) left to review");
    Ok(())
}
