//! TOML manifest catalog
//!
//! A manifest lists tracks as `[[track]]` tables:
//!
//! ```toml
//! [[track]]
//! id = "a1"
//! source = "/music/intro.flac"
//! title = "Intro"
//! artist = "Someone"
//! duration_ms = 95000
//! ```
//!
//! The file is read on every query, so edits show up on the next reload.

use crate::catalog::{Catalog, CatalogResult};
use crate::player::Track;
use crate::utils::error::{CatalogError, IntoPlayerError, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    #[serde(default, rename = "track")]
    tracks: Vec<Track>,
}

/// Catalog read from a TOML manifest file
#[derive(Debug, Clone)]
pub struct ManifestCatalog {
    path: PathBuf,
}

impl ManifestCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse manifest text
    pub fn parse(text: &str) -> CatalogResult<Vec<Track>> {
        let manifest: Manifest =
            toml::from_str(text).map_err(|e| CatalogError::Manifest(e.to_string()))?;

        let mut seen = HashSet::new();
        for track in &manifest.tracks {
            if track.id.as_str().is_empty() {
                return Err(CatalogError::Manifest(format!(
                    "track '{}' has an empty id",
                    track.title
                )));
            }
            if !seen.insert(&track.id) {
                return Err(CatalogError::Manifest(format!(
                    "duplicate track id '{}'",
                    track.id
                )));
            }
        }

        Ok(manifest.tracks)
    }

    /// Write `tracks` as a manifest at `path`
    pub fn write(path: &Path, tracks: &[Track]) -> Result<()> {
        let manifest = Manifest {
            tracks: tracks.to_vec(),
        };
        let text = toml::to_string_pretty(&manifest).catalog_err("Failed to serialize manifest")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        Ok(())
    }
}

impl Catalog for ManifestCatalog {
    fn list_available_tracks(&self) -> CatalogResult<Vec<Track>> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                CatalogError::Unavailable(format!("{} not found", self.path.display()))
            }
            _ => CatalogError::Unavailable(format!("{}: {}", self.path.display(), e)),
        })?;

        let tracks = Self::parse(&text)?;
        debug!(
            "Read {} tracks from manifest {}",
            tracks.len(),
            self.path.display()
        );
        Ok(tracks)
    }
}
