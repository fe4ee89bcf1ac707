/// Loader contract for rendered media
use std::future::Future;

use crate::state::data::MediaRef;

/// Requested bounding box for a rendered item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl TargetSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Fetches a renderable handle for a media item.
///
/// Implementations must be idempotent and safe to call repeatedly for the
/// same item. A failed load resolves to `None`.
pub trait MediaLoader: Send + Sync + 'static {
    /// Read-only handle handed out by the prefetch cache
    type Handle: Clone + Send + Sync + 'static;

    fn load(
        &self,
        media: &MediaRef,
        target: TargetSize,
    ) -> impl Future<Output = Option<Self::Handle>> + Send;
}
