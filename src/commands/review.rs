/// `review` command: interactive keep/delete/favourite session on stdin.
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;

use swipe_review::media::delete::FileDeletionGateway;
use swipe_review::media::scan::MonthScope;
use swipe_review::media::thumbnail::{default_cache_dir, ThumbnailLoader};
use swipe_review::session::{SessionEngine, SessionPhase, Signal};
use swipe_review::state::data::DecisionKind;
use swipe_review::state::library::Library;

use super::{load_config, open_library, parse_month, scan};

/// Deleted files pass through here; hidden so scans skip it
const STAGING_DIR: &str = ".swipe-review-staging";

type Engine = SessionEngine<ThumbnailLoader, Library>;

pub async fn run(config_path: &Path, dir: &Path, scope: &str, restart: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let (year, month) = parse_month(scope)?;
    let library = Arc::new(open_library(&config)?);

    let wanted = MonthScope::scope_id(year, month);
    let Some(month_scope) = scan(dir).await?.into_iter().find(|s| s.id() == &wanted) else {
        bail!("No photos or videos from {scope} in {}", dir.display());
    };
    let title = month_scope.full_display_name();

    let loader = match config.thumbnail_cache_dir.clone().or_else(default_cache_dir) {
        Some(cache_dir) => ThumbnailLoader::with_cache_dir(cache_dir),
        None => ThumbnailLoader::new(),
    };
    let mut engine = SessionEngine::new(Arc::new(loader), Arc::clone(&library), &config.engine);
    let mut signals = engine.subscribe();

    if restart {
        engine.restart(month_scope.collection);
    } else {
        engine.resume(month_scope.collection).await;
    }

    println!("🗓️  {title}: {} item(s)", engine.collection().len());
    if engine.phase() == SessionPhase::Empty {
        println!("📭 Nothing to review");
        return Ok(());
    }
    if engine.phase() == SessionPhase::Active && engine.current_index() > 0 {
        println!("⏩ Resuming at item {}", engine.current_index() + 1);
    }

    let mut lines = BufReader::new(stdin()).lines();
    loop {
        match engine.phase() {
            SessionPhase::Active => {
                print_current(&engine);
                println!("[k]eep [d]elete [f]avourite [u]ndo [a]bandon [q]uit");
            }
            SessionPhase::Finished => {
                print_finished(&engine)?;
                println!("[y] delete now, [u]ndo, [q]uit and decide later");
            }
            _ => break,
        }

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let finished = engine.phase() == SessionPhase::Finished;

        let outcome = match (line.trim().to_lowercase().as_str(), finished) {
            ("k", false) => engine.decide(DecisionKind::Kept).map(drop),
            ("d", false) => engine.decide(DecisionKind::Deleted).map(drop),
            ("f", false) => engine.decide(DecisionKind::Favourited).map(drop),
            ("y", true) => {
                if let Err(e) = delete_and_record(&mut engine, &library, dir).await {
                    println!("⚠️  {e:#}");
                }
                break;
            }
            ("u", _) => engine
                .undo()
                .map(|d| println!("↩️  Undid {} for item {}", d.kind, d.index + 1)),
            ("a", _) => {
                engine.abandon();
                println!("🗑️  Decisions discarded, {title} starts over next time");
                break;
            }
            ("q", _) => {
                println!("💾 Progress saved");
                break;
            }
            (other, _) => {
                println!("Unknown command '{other}'");
                Ok(())
            }
        };

        if let Err(e) = outcome {
            println!("⚠️  {e}");
        }
        print_signals(&mut signals);
    }

    engine.settle().await;
    Ok(())
}

fn print_current(engine: &Engine) {
    let Some(item) = engine.current_item() else {
        return;
    };

    let name = item
        .path
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| item.id.to_string());
    let preview = engine
        .current_handle()
        .map(|t| format!("{}x{}", t.width(), t.height()))
        .unwrap_or_else(|| "no preview".to_string());
    let fire = if engine.velocity().is_on_fire() { " 🔥" } else { "" };

    println!();
    println!(
        "[{}/{}] {name} ({:?}, {}, {preview}){fire}",
        item.index + 1,
        engine.collection().len(),
        item.kind,
        format_size(item.estimated_size_bytes),
    );
}

fn print_finished(engine: &Engine) -> Result<()> {
    let summary = engine.summary();
    let batch = engine.finalize()?;

    println!();
    println!(
        "🏁 Done: {} kept, {} favourited, {} to delete",
        summary.kept - summary.favourited,
        summary.favourited,
        summary.deleted
    );
    if !batch.is_empty() {
        println!("   Deleting frees about {}", format_size(batch.total_estimated_bytes()));
    }
    Ok(())
}

fn print_signals(signals: &mut broadcast::Receiver<Signal>) {
    while let Ok(signal) = signals.try_recv() {
        match signal {
            Signal::OnFire(true) => println!("🔥 On fire!"),
            Signal::OnFire(false) => println!("🧊 Cooling down"),
            Signal::Milestone(milestone) => println!("🎉 {}", milestone.title()),
        }
    }
}

async fn delete_and_record(engine: &mut Engine, library: &Library, dir: &Path) -> Result<()> {
    let freed = engine.finalize()?.total_estimated_bytes();
    let velocity = engine.velocity().summary();

    let gateway = FileDeletionGateway::new(dir.join(STAGING_DIR));
    let summary = engine
        .execute_deletion(&gateway)
        .await
        .context("Nothing was deleted, run review again to retry")?;
    println!("🧹 Deleted {} item(s), freed {}", summary.deleted, format_size(freed));
    if velocity.max_streak > 0 {
        println!("   Best streak this session: {}", velocity.max_streak);
    }

    let mut stats = library.load_stats().context("Failed to read statistics")?;
    let before = stats.unlocked_achievements();
    stats.record_session(&summary, freed, Local::now().date_naive());
    stats.record_month_completed();
    library.save_stats(&stats).context("Failed to save statistics")?;

    for achievement in stats.unlocked_achievements() {
        if !before.contains(&achievement) {
            println!("🏆 {}: {}", achievement.title(), achievement.description());
        }
    }
    Ok(())
}

fn format_size(bytes: u64) -> String {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if mb >= 1024.0 {
        format!("{:.1} GB", mb / 1024.0)
    } else {
        format!("{mb:.1} MB")
    }
}
