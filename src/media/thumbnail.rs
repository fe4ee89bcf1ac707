use image::{imageops::FilterType, RgbaImage};
use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task;
use tracing::{debug, warn};

use super::loader::{MediaLoader, TargetSize};
use crate::state::data::{MediaId, MediaKind, MediaRef};

/// A decoded, resized image ready for display
#[derive(Debug)]
pub struct Thumbnail {
    pub media_id: MediaId,
    pub image: RgbaImage,
}

impl Thumbnail {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

pub type ThumbnailHandle = Arc<Thumbnail>;

/// Get the default thumbnail cache directory
/// Returns ~/.cache/swipe-review/thumbnails on Linux
pub fn default_cache_dir() -> Option<PathBuf> {
    let mut path = dirs_next::cache_dir().or_else(dirs_next::home_dir)?;

    path.push("swipe-review");
    path.push("thumbnails");
    Some(path)
}

/// Loads thumbnails from disk with the `image` crate.
///
/// Resized thumbnails are written to the cache directory (when one is set)
/// so the next session can skip decoding the original.
#[derive(Debug, Clone, Default)]
pub struct ThumbnailLoader {
    cache_dir: Option<PathBuf>,
}

impl ThumbnailLoader {
    /// A loader without an on-disk cache
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: Some(cache_dir.into()),
        }
    }

    /// Where the resized thumbnail for `media` at `target` is cached.
    ///
    /// The name hashes the media id; a toolchain change to the hasher only
    /// costs a cache miss.
    pub fn cache_path(&self, media: &MediaRef, target: TargetSize) -> Option<PathBuf> {
        let dir = self.cache_dir.as_ref()?;
        let mut hasher = DefaultHasher::new();
        media.id.hash(&mut hasher);
        Some(dir.join(format!(
            "{:016x}_{}x{}.jpg",
            hasher.finish(),
            target.width,
            target.height
        )))
    }
}

impl MediaLoader for ThumbnailLoader {
    type Handle = ThumbnailHandle;

    fn load(
        &self,
        media: &MediaRef,
        target: TargetSize,
    ) -> impl Future<Output = Option<Self::Handle>> + Send {
        let media = media.clone();
        let cache_path = self.cache_path(&media, target);

        async move {
            // Video frames are not decoded here
            if media.kind == MediaKind::Video {
                debug!(media_id = %media.id, "skipping thumbnail for video");
                return None;
            }
            let path = media.path.clone()?;

            // Spawn blocking because decoding and resizing are CPU-intensive
            let image = task::spawn_blocking(move || {
                generate_thumbnail(&path, target, cache_path.as_deref())
            })
            .await;

            match image {
                Ok(Some(image)) => Some(Arc::new(Thumbnail {
                    media_id: media.id,
                    image,
                })),
                Ok(None) => None,
                Err(e) => {
                    warn!(media_id = %media.id, error = %e, "thumbnail task failed");
                    None
                }
            }
        }
    }
}

/// Decode and resize a file, preferring a previously cached thumbnail
fn generate_thumbnail(source: &Path, target: TargetSize, cache_path: Option<&Path>) -> Option<RgbaImage> {
    if let Some(cached) = cache_path.filter(|p| p.exists()) {
        match image::open(cached) {
            Ok(img) => return Some(img.to_rgba8()),
            Err(e) => debug!(path = %cached.display(), error = %e, "ignoring unreadable cached thumbnail"),
        }
    }

    let img = match image::open(source) {
        Ok(img) => img,
        Err(e) => {
            warn!(path = %source.display(), error = %e, "failed to decode media");
            return None;
        }
    };

    let thumbnail = img.resize(target.width, target.height, FilterType::Lanczos3);

    if let Some(cache_path) = cache_path {
        // JPEG has no alpha channel
        let saved = cache_path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .map_err(image::ImageError::IoError)
            .and_then(|()| thumbnail.to_rgb8().save(cache_path));
        if let Err(e) = saved {
            debug!(path = %cache_path.display(), error = %e, "could not cache thumbnail");
        }
    }

    Some(thumbnail.to_rgba8())
}
