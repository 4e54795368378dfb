//! Track catalog for trackdeck
//!
//! A catalog answers "which tracks exist" and "which of them did the user
//! pick". The controller turns the answer into a playlist; it never talks to
//! the storage behind a catalog directly.

mod manifest;

pub use manifest::ManifestCatalog;

use crate::player::{Track, TrackId};
use crate::utils::error::CatalogError;

/// Result of a catalog query
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Subset of the catalog to build a playlist from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSelection {
    /// Explicit picks, played in the order given
    Ids(Vec<TrackId>),

    /// Every track by this artist (case-insensitive)
    Artist(String),

    /// Every track whose title contains the text (case-insensitive)
    TitleContains(String),
}

impl TrackSelection {
    /// Whether `track` belongs to a filter-style selection
    fn matches(&self, track: &Track) -> bool {
        match self {
            TrackSelection::Ids(ids) => ids.contains(&track.id),
            TrackSelection::Artist(artist) => track.artist.eq_ignore_ascii_case(artist),
            TrackSelection::TitleContains(needle) => track
                .title
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }

    /// Apply the selection to a full track list
    pub fn apply(&self, tracks: Vec<Track>) -> Vec<Track> {
        match self {
            TrackSelection::Ids(ids) => ids
                .iter()
                .filter_map(|id| tracks.iter().find(|t| &t.id == id).cloned())
                .collect(),
            _ => tracks.into_iter().filter(|t| self.matches(t)).collect(),
        }
    }
}

/// Source of playable tracks
///
/// An empty result is a valid, empty playlist. Failures are reported as
/// [`CatalogError`] and passed to the caller unchanged.
pub trait Catalog: Send + Sync {
    /// Every track the catalog knows about, in catalog order
    fn list_available_tracks(&self) -> CatalogResult<Vec<Track>>;

    /// Tracks picked by `selection`
    fn list_tracks(&self, selection: &TrackSelection) -> CatalogResult<Vec<Track>> {
        Ok(selection.apply(self.list_available_tracks()?))
    }
}

/// Catalog backed by a fixed list of tracks
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    tracks: Vec<Track>,
}

impl InMemoryCatalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn push(&mut self, track: Track) {
        self.tracks.push(track);
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

impl Catalog for InMemoryCatalog {
    fn list_available_tracks(&self) -> CatalogResult<Vec<Track>> {
        Ok(self.tracks.clone())
    }
}
