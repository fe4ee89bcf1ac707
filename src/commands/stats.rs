/// `stats` command: lifetime statistics and achievements.
use std::path::Path;

use anyhow::{Context, Result};

use swipe_review::state::stats::Achievement;

use super::{load_config, open_library};

pub fn run(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let library = open_library(&config)?;
    let stats = library.load_stats().context("Failed to read statistics")?;

    println!("📊 Lifetime statistics");
    println!("  Reviewed:        {}", stats.total_reviewed);
    println!("  Kept:            {}", stats.total_kept);
    println!("  Favourited:      {}", stats.total_favourited);
    println!("  Deleted:         {} ({:.0}%)", stats.total_deleted, stats.delete_ratio());
    println!("  Storage freed:   {}", stats.storage_freed_formatted());
    println!("  Months done:     {}", stats.months_completed);
    println!("  Sessions:        {}", stats.sessions_completed);
    println!(
        "  Daily streak:    {} (best {})",
        stats.current_streak, stats.best_streak
    );

    let unlocked = stats.unlocked_achievements();
    println!();
    println!("🏆 Achievements {}/{}", unlocked.len(), Achievement::ALL.len());
    for achievement in Achievement::ALL {
        let marker = if unlocked.contains(&achievement) { "🔓" } else { "🔒" };
        println!("  {marker} {:<17} {}", achievement.title(), achievement.description());
    }

    Ok(())
}
