/// Media access module
///
/// This module handles everything that touches the source media:
/// - Scanning a folder into month scopes (scan.rs)
/// - The loader contract used by the prefetch cache (loader.rs)
/// - Decoding and caching resized thumbnails (thumbnail.rs)
/// - Executing a deletion batch against the file system (delete.rs)

pub mod delete;
pub mod loader;
pub mod scan;
pub mod thumbnail;
