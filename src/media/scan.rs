/// Folder scanning into calendar-month scopes
///
/// Every supported file under a root becomes one `MediaRef`. Files are
/// grouped by the local calendar month of their modification time, each
/// month becoming an independent review scope ordered oldest first.
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::state::data::{Collection, MediaKind, MediaRef, ScopeId};

/// Supported still image extensions, including common RAW formats
const PHOTO_EXTENSIONS: [&str; 26] = [
    "jpg", "jpeg", "png", "heic", "heif", "webp", "tif", "tiff", "gif", "bmp", "nef", "dng", "cr2",
    "cr3", "arw", "raf", "orf", "rw2", "pef", "srw", "erf", "kdc", "dcr", "mos", "raw", "rwl",
];

const VIDEO_EXTENSIONS: [&str; 6] = ["mov", "mp4", "m4v", "avi", "mkv", "3gp"];

/// One calendar month of media
#[derive(Debug, Clone, PartialEq)]
pub struct MonthScope {
    pub year: i32,
    /// 1-based month
    pub month: u32,
    pub collection: Collection,
    /// Items already reviewed, from the saved position
    pub reviewed_count: usize,
}

impl MonthScope {
    pub fn new(year: i32, month: u32, collection: Collection) -> Self {
        Self {
            year,
            month,
            collection,
            reviewed_count: 0,
        }
    }

    /// Scope identifier in the form "YYYY-M"
    pub fn scope_id(year: i32, month: u32) -> ScopeId {
        ScopeId::new(format!("{year}-{month}"))
    }

    pub fn id(&self) -> &ScopeId {
        self.collection.scope()
    }

    pub fn total_count(&self) -> usize {
        self.collection.len()
    }

    pub fn progress(&self) -> f64 {
        if self.total_count() == 0 {
            return 0.0;
        }
        self.reviewed_count as f64 / self.total_count() as f64
    }

    pub fn is_completed(&self) -> bool {
        self.total_count() > 0 && self.reviewed_count >= self.total_count()
    }

    pub fn remaining_count(&self) -> usize {
        self.total_count().saturating_sub(self.reviewed_count)
    }

    /// Strictly earlier than `year`/`month`
    pub fn is_before(&self, year: i32, month: u32) -> bool {
        (self.year, self.month) < (year, month)
    }

    /// Short name like "Dec '18"
    pub fn display_name(&self) -> String {
        self.first_day()
            .map(|d| d.format("%b '%y").to_string())
            .unwrap_or_else(|| self.id().to_string())
    }

    /// Long name like "December 2018"
    pub fn full_display_name(&self) -> String {
        self.first_day()
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| self.id().to_string())
    }

    fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }
}

/// A supported file found while walking the folder
#[derive(Debug)]
struct FoundFile {
    path: PathBuf,
    kind: MediaKind,
    size: u64,
    modified: DateTime<Utc>,
    companion: Option<PathBuf>,
}

/// Scan a folder recursively and group its media into month scopes,
/// oldest month first.
pub fn scan_folder(root: &Path) -> Vec<MonthScope> {
    info!(root = %root.display(), "scanning folder");

    let mut photos = Vec::new();
    let mut videos = Vec::new();

    // Walk the directory tree recursively, skipping hidden directories
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(kind) = classify(entry.path()) else {
            continue;
        };
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        // Items without a timestamp cannot be placed in a month
        let Ok(modified) = metadata.modified() else {
            debug!(path = %entry.path().display(), "skipping file without timestamp");
            continue;
        };

        let found = FoundFile {
            path: entry.path().to_path_buf(),
            kind,
            size: metadata.len(),
            modified: DateTime::<Utc>::from(modified),
            companion: None,
        };
        match kind {
            MediaKind::Video => videos.push(found),
            _ => photos.push(found),
        }
    }

    let files = pair_live_photos(photos, videos);
    let scopes = group_by_month(files);

    info!(
        months = scopes.len(),
        items = scopes.iter().map(MonthScope::total_count).sum::<usize>(),
        "scan complete"
    );

    scopes
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn classify(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    if PHOTO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Photo)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// Path of the motion clip that belongs to a live photo, if present
pub fn live_photo_companion(path: &Path) -> Option<PathBuf> {
    ["mov", "MOV"]
        .iter()
        .map(|ext| path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

fn pairing_key(path: &Path) -> (Option<PathBuf>, String) {
    (
        path.parent().map(Path::to_path_buf),
        path.file_stem()
            .map(OsStr::to_string_lossy)
            .unwrap_or_default()
            .to_lowercase(),
    )
}

/// A still image with a `.mov` of the same stem is one live photo.
fn pair_live_photos(photos: Vec<FoundFile>, videos: Vec<FoundFile>) -> Vec<FoundFile> {
    let mut clips: HashMap<(Option<PathBuf>, String), FoundFile> = HashMap::new();
    let mut files = Vec::with_capacity(photos.len() + videos.len());

    for video in videos {
        let is_mov = video
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("mov"));
        if is_mov {
            clips.insert(pairing_key(&video.path), video);
        } else {
            files.push(video);
        }
    }

    for mut photo in photos {
        if let Some(clip) = clips.remove(&pairing_key(&photo.path)) {
            photo.kind = MediaKind::LivePhoto;
            photo.size += clip.size;
            photo.companion = Some(clip.path);
        }
        files.push(photo);
    }

    // Unpaired .mov files are ordinary videos
    files.extend(clips.into_values());
    files
}

fn group_by_month(files: Vec<FoundFile>) -> Vec<MonthScope> {
    let mut months: BTreeMap<(i32, u32), Vec<FoundFile>> = BTreeMap::new();
    for file in files {
        let local = file.modified.with_timezone(&Local);
        months.entry((local.year(), local.month())).or_default().push(file);
    }

    months
        .into_iter()
        .map(|((year, month), mut files)| {
            files.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
            let items = files
                .into_iter()
                .enumerate()
                .map(|(index, file)| {
                    let media = MediaRef::new(file.path.to_string_lossy().to_string(), index, file.size, file.kind)
                        .with_captured_at(file.modified)
                        .with_path(file.path);
                    match file.companion {
                        Some(clip) => media.with_companion(clip),
                        None => media,
                    }
                })
                .collect();
            MonthScope::new(year, month, Collection::new(MonthScope::scope_id(year, month), items))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use std::time::SystemTime;

    fn touch(dir: &Path, name: &str, when: DateTime<Utc>) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"not really an image").unwrap();
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(SystemTime::from(when)).unwrap();
        path
    }

    fn mid_month(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_groups_by_month_oldest_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.jpg", mid_month(2023, 5, 16));
        touch(dir.path(), "a.jpg", mid_month(2023, 5, 15));
        touch(dir.path(), "older/c.png", mid_month(2022, 12, 14));
        touch(dir.path(), "notes.txt", mid_month(2022, 12, 14));

        let scopes = scan_folder(dir.path());

        assert_eq!(scopes.len(), 2);
        assert_eq!(scopes[0].id().as_str(), "2022-12");
        assert_eq!(scopes[0].display_name(), "Dec '22");
        assert_eq!(scopes[1].full_display_name(), "May 2023");

        let may: Vec<_> = scopes[1]
            .collection
            .iter()
            .map(|m| m.path.as_ref().unwrap().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(may, vec!["a.jpg", "b.jpg"]);
        assert_eq!(scopes[1].collection.get(1).map(|m| m.index), Some(1));
    }

    #[test]
    fn test_pairs_live_photos_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let when = mid_month(2024, 3, 10);
        touch(dir.path(), "IMG_1.HEIC", when);
        touch(dir.path(), "IMG_1.MOV", when);
        touch(dir.path(), "clip.mp4", when);
        touch(dir.path(), ".staging/IMG_9.jpg", when);

        let scopes = scan_folder(dir.path());

        assert_eq!(scopes.len(), 1);
        let kinds: Vec<_> = scopes[0].collection.iter().map(|m| m.kind).collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&MediaKind::LivePhoto));
        assert!(kinds.contains(&MediaKind::Video));
    }

    #[test]
    fn test_live_photo_keeps_clip_path_across_case() {
        let dir = tempfile::tempdir().unwrap();
        let when = mid_month(2024, 3, 10);
        touch(dir.path(), "img_1.jpg", when);
        let clip = touch(dir.path(), "IMG_1.MOV", when);

        let scopes = scan_folder(dir.path());

        let items = scopes[0].collection.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, MediaKind::LivePhoto);
        assert_eq!(items[0].companion.as_deref(), Some(clip.as_path()));
    }

    #[test]
    fn test_progress_helpers() {
        let items = (0..4)
            .map(|i| MediaRef::new(format!("{i}"), i, 1, MediaKind::Photo))
            .collect();
        let mut scope = MonthScope::new(2021, 1, Collection::new("2021-1", items));

        assert_eq!(scope.progress(), 0.0);
        scope.reviewed_count = 3;
        assert_eq!(scope.remaining_count(), 1);
        assert!(!scope.is_completed());
        scope.reviewed_count = 4;
        assert!(scope.is_completed());
        assert_eq!(scope.progress(), 1.0);

        assert!(scope.is_before(2021, 2));
        assert!(!scope.is_before(2021, 1));
        assert!(scope.is_before(2022, 1));
    }
}
