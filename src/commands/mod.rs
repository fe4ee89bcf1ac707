/// CLI command implementations.
use std::path::Path;

use anyhow::{bail, Context, Result};

use swipe_review::config::Config;
use swipe_review::media::scan::{scan_folder, MonthScope};
use swipe_review::state::library::Library;

pub mod months;
pub mod review;
pub mod stats;

/// Load the config file, falling back to defaults when it is missing
pub fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("Failed to load config '{}'", path.display()))
}

/// Open the progress database named by the config, or the default one
pub fn open_library(config: &Config) -> Result<Library> {
    let library = match &config.database_path {
        Some(path) => Library::open(path),
        None => Library::new(),
    };
    library.context("Failed to open the progress database")
}

/// Scan a folder on a blocking thread
pub async fn scan(dir: &Path) -> Result<Vec<MonthScope>> {
    if !dir.is_dir() {
        bail!("'{}' is not a directory", dir.display());
    }
    let root = dir.to_path_buf();
    let scopes = tokio::task::spawn_blocking(move || scan_folder(&root))
        .await
        .context("Folder scan failed")?;
    Ok(scopes)
}

/// Parse a month identifier like "2019-6" or "2019-06"
pub fn parse_month(value: &str) -> Result<(i32, u32)> {
    let parsed = value
        .split_once('-')
        .and_then(|(year, month)| Some((year.parse::<i32>().ok()?, month.parse::<u32>().ok()?)));

    match parsed {
        Some((year, month)) if (1..=12).contains(&month) => Ok((year, month)),
        _ => bail!("'{value}' is not a month, expected YYYY-M"),
    }
}
