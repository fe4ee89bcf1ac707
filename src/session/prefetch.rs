/// Bounded look-ahead cache of rendered media.
///
/// Handles are keyed by traversal index. Each index owns a slot that is
/// either in flight or resolved; concurrent requests for the same index
/// share the slot, so the loader runs once per index.
use std::collections::HashMap;
use std::ops::{Range, RangeInclusive};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OnceCell;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::media::loader::{MediaLoader, TargetSize};
use crate::state::data::Collection;

/// Index range around the current position that stays resident
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheWindow {
    pub lagging: usize,
    pub leading: usize,
}

impl Default for CacheWindow {
    fn default() -> Self {
        Self {
            lagging: 2,
            leading: 5,
        }
    }
}

impl From<&CacheConfig> for CacheWindow {
    fn from(config: &CacheConfig) -> Self {
        Self {
            lagging: config.lagging_margin,
            leading: config.leading_margin,
        }
    }
}

impl CacheWindow {
    /// Indices allowed to stay cached around `center`
    pub fn retained(&self, center: usize) -> RangeInclusive<usize> {
        center.saturating_sub(self.lagging)..=center.saturating_add(self.leading)
    }

    /// Indices to load ahead of `center`, clamped to `len`
    pub fn prefetch(&self, center: usize, len: usize) -> Range<usize> {
        let end = center.saturating_add(self.leading).saturating_add(1).min(len);
        center.min(end)..end
    }

    /// Most entries the cache holds after an eviction
    pub fn capacity(&self) -> usize {
        self.lagging + self.leading + 1
    }
}

/// `None` inside a resolved slot means the load failed
type Slot<H> = Arc<OnceCell<Option<H>>>;

/// Index-keyed cache with a sliding eviction window.
///
/// Cloning is cheap and every clone shares the same entries.
pub struct PrefetchCache<H> {
    window: CacheWindow,
    slots: Arc<Mutex<HashMap<usize, Slot<H>>>>,
}

impl<H> Clone for PrefetchCache<H> {
    fn clone(&self) -> Self {
        Self {
            window: self.window,
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<H: Clone + Send + Sync + 'static> PrefetchCache<H> {
    pub fn new(window: CacheWindow) -> Self {
        Self {
            window,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn window(&self) -> CacheWindow {
        self.window
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<usize, Slot<H>>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Synchronous lookup of a loaded handle
    pub fn get(&self, index: usize) -> Option<H> {
        self.slots().get(&index)?.get()?.clone()
    }

    /// Number of entries, loaded or in flight
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cached indices in ascending order
    pub fn indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.slots().keys().copied().collect();
        indices.sort_unstable();
        indices
    }

    /// Load every missing handle in `[center, center + leading]`.
    ///
    /// Completes when every load it started or joined has resolved. Failed
    /// loads leave the index absent; the next call covering it retries.
    pub async fn ensure_window<L>(
        &self,
        center: usize,
        collection: &Collection,
        loader: &Arc<L>,
        target: TargetSize,
    ) where
        L: MediaLoader<Handle = H>,
    {
        let mut loads = JoinSet::new();

        {
            let mut slots = self.slots();
            for index in self.window.prefetch(center, collection.len()) {
                let Some(media) = collection.get(index) else {
                    continue;
                };

                let slot = match slots.get(&index) {
                    Some(slot) if !is_failed(slot) => Arc::clone(slot),
                    _ => {
                        let slot: Slot<H> = Arc::new(OnceCell::new());
                        slots.insert(index, Arc::clone(&slot));
                        slot
                    }
                };
                if slot.initialized() {
                    continue;
                }

                let media = media.clone();
                let loader = Arc::clone(loader);
                loads.spawn(async move {
                    // A second request for an in-flight index waits here
                    // on the first one's result.
                    slot.get_or_init(|| async move {
                        let handle = loader.load(&media, target).await;
                        if handle.is_none() {
                            warn!(index = media.index, media_id = %media.id, "media load failed");
                        }
                        handle
                    })
                    .await;
                });
            }
        }

        while let Some(result) = loads.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "prefetch task failed");
            }
        }
    }

    /// Drop every entry outside the window around `center`.
    ///
    /// A load still in flight for a dropped index finishes into a detached
    /// slot and its result is discarded.
    pub fn evict(&self, center: usize) {
        let keep = self.window.retained(center);
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|index, _| keep.contains(index));
        if slots.len() < before {
            debug!(center, evicted = before - slots.len(), "evicted cache entries");
        }
    }

    /// Release every entry
    pub fn clear(&self) {
        self.slots().clear();
    }
}

fn is_failed<H>(slot: &Slot<H>) -> bool {
    matches!(slot.get(), Some(None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::{MediaKind, MediaRef};
    use std::collections::HashSet;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts calls per index and fails the indices it is told to.
    #[derive(Default)]
    struct CountingLoader {
        calls: Mutex<HashMap<usize, usize>>,
        failing: Mutex<HashSet<usize>>,
        total: AtomicUsize,
    }

    impl CountingLoader {
        fn calls_for(&self, index: usize) -> usize {
            self.calls.lock().unwrap().get(&index).copied().unwrap_or(0)
        }
    }

    impl MediaLoader for CountingLoader {
        type Handle = Arc<String>;

        fn load(
            &self,
            media: &MediaRef,
            _target: TargetSize,
        ) -> impl Future<Output = Option<Self::Handle>> + Send {
            *self.calls.lock().unwrap().entry(media.index).or_default() += 1;
            self.total.fetch_add(1, Ordering::SeqCst);
            let fail = self.failing.lock().unwrap().contains(&media.index);
            let id = media.id.to_string();
            async move {
                tokio::time::sleep(Duration::from_millis(5)).await;
                (!fail).then(|| Arc::new(id))
            }
        }
    }

    fn collection(n: usize) -> Collection {
        let items = (0..n)
            .map(|i| MediaRef::new(format!("IMG_{i}"), i, 1, MediaKind::Photo))
            .collect();
        Collection::new("2024-4", items)
    }

    fn target() -> TargetSize {
        TargetSize::new(64, 64)
    }

    #[test]
    fn test_window_ranges() {
        let window = CacheWindow::default();

        assert_eq!(window.retained(1), 0..=6);
        assert_eq!(window.retained(10), 8..=15);
        assert_eq!(window.prefetch(0, 20), 0..6);
        assert_eq!(window.prefetch(18, 20), 18..20);
        assert_eq!(window.prefetch(20, 20), 20..20);
        assert_eq!(window.capacity(), 8);
    }

    #[tokio::test]
    async fn test_ensure_window_loads_leading_range() {
        let cache = PrefetchCache::new(CacheWindow::default());
        let loader = Arc::new(CountingLoader::default());
        let items = collection(20);

        cache.ensure_window(3, &items, &loader, target()).await;

        assert_eq!(cache.indices(), vec![3, 4, 5, 6, 7, 8]);
        assert_eq!(cache.get(3).as_deref().map(String::as_str), Some("IMG_3"));
        assert!(cache.get(2).is_none());

        // Already cached: no new loads
        cache.ensure_window(3, &items, &loader, target()).await;
        assert_eq!(loader.total.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_load() {
        let cache = PrefetchCache::new(CacheWindow::default());
        let loader = Arc::new(CountingLoader::default());
        let items = collection(10);

        tokio::join!(
            cache.ensure_window(0, &items, &loader, target()),
            cache.ensure_window(0, &items, &loader, target()),
            cache.ensure_window(2, &items, &loader, target()),
        );

        for index in 0..=7 {
            assert_eq!(loader.calls_for(index), 1, "index {index}");
        }
    }

    #[tokio::test]
    async fn test_failed_load_is_absent_and_retried() {
        let cache = PrefetchCache::new(CacheWindow::default());
        let loader = Arc::new(CountingLoader::default());
        loader.failing.lock().unwrap().insert(2);
        let items = collection(10);

        cache.ensure_window(0, &items, &loader, target()).await;
        assert!(cache.get(2).is_none());
        assert!(cache.get(3).is_some());

        loader.failing.lock().unwrap().clear();
        cache.ensure_window(1, &items, &loader, target()).await;

        assert!(cache.get(2).is_some());
        assert_eq!(loader.calls_for(2), 2);
        assert_eq!(loader.calls_for(3), 1);
    }

    #[tokio::test]
    async fn test_evict_bounds_size() {
        let window = CacheWindow::default();
        let cache = PrefetchCache::new(window);
        let loader = Arc::new(CountingLoader::default());
        let items = collection(50);

        let path = [0, 1, 2, 3, 4, 3, 4, 5, 6, 7, 8, 9, 8, 9, 10, 11, 12];
        for &center in &path {
            cache.ensure_window(center, &items, &loader, target()).await;
            cache.evict(center);
            assert!(cache.len() <= window.capacity());
        }

        let last = *path.last().unwrap();
        assert!(cache.indices().iter().all(|i| window.retained(last).contains(i)));
        assert!(cache.get(last - 2).is_some());
    }

    #[tokio::test]
    async fn test_evicted_in_flight_load_is_discarded() {
        let cache = PrefetchCache::new(CacheWindow::default());
        let loader = Arc::new(CountingLoader::default());
        let items = collection(30);

        // join! polls the prefetch first, so its slots exist before the
        // eviction runs and its loads are still sleeping.
        let evict_later = async {
            tokio::task::yield_now().await;
            cache.evict(20);
        };
        tokio::join!(cache.ensure_window(0, &items, &loader, target()), evict_later);

        assert_eq!(loader.total.load(Ordering::SeqCst), 6);
        assert!(cache.is_empty());
    }
}
