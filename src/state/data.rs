/// Shared data structures for a review session
///
/// These types represent the data model that flows between
/// the media scanner, the session engine and the persistence layer.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Stable identifier of a media item in its source store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaId(String);

impl MediaId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MediaId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Identifier of an independently tracked traversal scope (e.g. "2024-3")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ScopeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// What kind of media an item is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    LivePhoto,
    Video,
}

/// A single item in a traversal.
///
/// Identity is `id`; `index` is only meaningful within the collection
/// that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRef {
    pub id: MediaId,
    /// Position in the traversal ordering
    pub index: usize,
    pub estimated_size_bytes: u64,
    pub kind: MediaKind,
    /// Source file, if the item lives on disk
    pub path: Option<PathBuf>,
    /// Capture (or modification) time used for month grouping
    pub captured_at: Option<DateTime<Utc>>,
    /// Motion clip of a live photo, removed together with `path`
    pub companion: Option<PathBuf>,
}

impl MediaRef {
    pub fn new(id: impl Into<MediaId>, index: usize, estimated_size_bytes: u64, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            index,
            estimated_size_bytes,
            kind,
            path: None,
            captured_at: None,
            companion: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_captured_at(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = Some(captured_at);
        self
    }

    pub fn with_companion(mut self, companion: impl Into<PathBuf>) -> Self {
        self.companion = Some(companion.into());
        self
    }
}

impl From<String> for MediaId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// The verdict recorded for one item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Kept,
    Deleted,
    Favourited,
}

impl DecisionKind {
    /// Favourites are also kept for aggregate statistics
    pub fn counts_as_kept(self) -> bool {
        matches!(self, DecisionKind::Kept | DecisionKind::Favourited)
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionKind::Kept => write!(f, "kept"),
            DecisionKind::Deleted => write!(f, "deleted"),
            DecisionKind::Favourited => write!(f, "favourited"),
        }
    }
}

/// One decision at one traversal index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub index: usize,
    pub media_id: MediaId,
    pub kind: DecisionKind,
}

impl Decision {
    pub fn new(index: usize, media_id: MediaId, kind: DecisionKind) -> Self {
        Self {
            index,
            media_id,
            kind,
        }
    }
}

/// An ordered, immutable sequence of media for one scope
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    scope: ScopeId,
    items: Vec<MediaRef>,
}

impl Collection {
    /// Build a collection, renumbering every item so that `index`
    /// matches its position.
    pub fn new(scope: impl Into<ScopeId>, items: Vec<MediaRef>) -> Self {
        let items = items
            .into_iter()
            .enumerate()
            .map(|(index, mut item)| {
                item.index = index;
                item
            })
            .collect();

        Self {
            scope: scope.into(),
            items,
        }
    }

    pub fn empty(scope: impl Into<ScopeId>) -> Self {
        Self::new(scope, Vec::new())
    }

    pub fn scope(&self) -> &ScopeId {
        &self.scope
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MediaRef> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[MediaRef] {
        &self.items
    }

    pub fn iter(&self) -> impl Iterator<Item = &MediaRef> {
        self.items.iter()
    }
}

impl From<String> for ScopeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Items selected for removal once a scope is finished
#[derive(Debug, Clone, PartialEq)]
pub struct DeletionBatch {
    pub scope: ScopeId,
    pub items: Vec<MediaRef>,
}

impl DeletionBatch {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &MediaId> {
        self.items.iter().map(|item| &item.id)
    }

    /// Sum of the recorded sizes of every item in the batch
    pub fn total_estimated_bytes(&self) -> u64 {
        self.items.iter().map(|item| item.estimated_size_bytes).sum()
    }
}

/// Decision counts for one scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSummary {
    pub reviewed: usize,
    /// Includes favourites
    pub kept: usize,
    pub deleted: usize,
    pub favourited: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_renumbers_items() {
        let items = vec![
            MediaRef::new("a", 7, 10, MediaKind::Photo),
            MediaRef::new("b", 3, 20, MediaKind::Video),
        ];
        let collection = Collection::new("2024-1", items);

        assert_eq!(collection.get(0).map(|m| m.index), Some(0));
        assert_eq!(collection.get(1).map(|m| m.index), Some(1));
        assert_eq!(collection.get(1).map(|m| m.id.as_str()), Some("b"));
        assert!(collection.get(2).is_none());
    }

    #[test]
    fn test_favourite_counts_as_kept() {
        assert!(DecisionKind::Favourited.counts_as_kept());
        assert!(DecisionKind::Kept.counts_as_kept());
        assert!(!DecisionKind::Deleted.counts_as_kept());
    }

    #[test]
    fn test_decision_json_shape() {
        let decision = Decision::new(4, MediaId::new("IMG_0004"), DecisionKind::Favourited);
        let json = serde_json::to_string(&decision).unwrap();

        assert_eq!(json, r#"{"index":4,"media_id":"IMG_0004","kind":"favourited"}"#);
    }

    #[test]
    fn test_batch_total_size() {
        let batch = DeletionBatch {
            scope: ScopeId::new("2024-1"),
            items: vec![
                MediaRef::new("a", 0, 1_000, MediaKind::Photo),
                MediaRef::new("b", 1, 2_500, MediaKind::Video),
            ],
        };

        assert_eq!(batch.total_estimated_bytes(), 3_500);
        assert_eq!(batch.ids().count(), 2);
    }
}
