/// Size estimates for the storage-freed counter.
use rand::Rng;

use crate::config::SizeEstimate;
use crate::state::data::MediaRef;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Sizes a deleted item for the gamification counters.
pub trait SizeEstimator: Send + Sync {
    fn estimate(&self, media: &MediaRef) -> u64;
}

/// Uses the size recorded on the item.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordedSize;

impl SizeEstimator for RecordedSize {
    fn estimate(&self, media: &MediaRef) -> u64 {
        media.estimated_size_bytes
    }
}

/// A uniformly random size per item, 2-5 MB by default.
#[derive(Debug, Clone, Copy)]
pub struct RandomSize {
    pub min_bytes: u64,
    pub max_bytes: u64,
}

impl Default for RandomSize {
    fn default() -> Self {
        Self {
            min_bytes: 2 * BYTES_PER_MB,
            max_bytes: 5 * BYTES_PER_MB,
        }
    }
}

impl SizeEstimator for RandomSize {
    fn estimate(&self, _media: &MediaRef) -> u64 {
        if self.max_bytes <= self.min_bytes {
            return self.min_bytes;
        }
        rand::rng().random_range(self.min_bytes..=self.max_bytes)
    }
}

/// Build the estimator selected in the config
pub fn estimator_for(choice: SizeEstimate) -> Box<dyn SizeEstimator> {
    match choice {
        SizeEstimate::Recorded => Box::new(RecordedSize),
        SizeEstimate::Random => Box::new(RandomSize::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::MediaKind;

    #[test]
    fn test_recorded_uses_item_size() {
        let media = MediaRef::new("a", 0, 4_321, MediaKind::Photo);
        assert_eq!(RecordedSize.estimate(&media), 4_321);
    }

    #[test]
    fn test_random_stays_in_range() {
        let media = MediaRef::new("a", 0, 0, MediaKind::Photo);
        let estimator = RandomSize::default();
        for _ in 0..100 {
            let size = estimator.estimate(&media);
            assert!((2 * BYTES_PER_MB..=5 * BYTES_PER_MB).contains(&size));
        }
    }
}
