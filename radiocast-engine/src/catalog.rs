//! Catalog collaborator
//!
//! The engine only reads ranked items. `fetch_ordered_items` is synchronous;
//! runners call it on the blocking pool under a timeout.

use crate::error::{Error, Result};
use radiocast_common::events::PlaybackMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One ranked track
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub rank: u32,
    pub track_name: String,
    pub artist_name: String,
    #[serde(default)]
    pub spotify_track_id: Option<String>,
    #[serde(default)]
    pub spotify_artist_id: Option<String>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Which ranking a sequence plays from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CatalogScope {
    DecadeGenre {
        decade: String,
        /// Unset: every genre of the decade
        #[serde(default)]
        genre: Option<String>,
    },
    Collection {
        slug: String,
    },
}

impl CatalogScope {
    pub fn mode(&self) -> PlaybackMode {
        match self {
            CatalogScope::DecadeGenre { .. } => PlaybackMode::DecadeGenre,
            CatalogScope::Collection { .. } => PlaybackMode::Collection,
        }
    }
}

impl std::fmt::Display for CatalogScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogScope::DecadeGenre { decade, genre: Some(genre) } => {
                write!(f, "{}/{}", decade, genre)
            }
            CatalogScope::DecadeGenre { decade, genre: None } => write!(f, "{}", decade),
            CatalogScope::Collection { slug } => write!(f, "collection:{}", slug),
        }
    }
}

/// Inclusive rank range
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankRange {
    pub start: u32,
    pub end: u32,
}

impl RankRange {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    pub fn single(rank: u32) -> Self {
        Self { start: rank, end: rank }
    }

    pub fn validate(&self) -> Result<()> {
        if self.start == 0 {
            return Err(Error::BadRequest("rank range starts at 1".to_string()));
        }
        if self.start > self.end {
            return Err(Error::BadRequest(format!(
                "rank range start {} is after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    pub fn contains(&self, rank: u32) -> bool {
        (self.start..=self.end).contains(&rank)
    }
}

/// Source of ranked catalog items
pub trait CatalogSource: Send + Sync {
    /// Items of `scope` whose rank lies in `range`, sorted by ascending rank
    fn fetch_ordered_items(&self, scope: &CatalogScope, range: RankRange) -> Result<Vec<CatalogItem>>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecadeGenreRanking {
    decade: String,
    genre: String,
    items: Vec<CatalogItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct CollectionRanking {
    slug: String,
    items: Vec<CatalogItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogFile {
    #[serde(default)]
    decade_genre: Vec<DecadeGenreRanking>,
    #[serde(default)]
    collections: Vec<CollectionRanking>,
}

/// Catalog held in memory, loaded from JSON or built in code
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    data: CatalogFile,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog file
    ///
    /// ```json
    /// {
    ///   "decadeGenre": [{ "decade": "1980s", "genre": "rock", "items": [...] }],
    ///   "collections": [{ "slug": "road-trip", "items": [...] }]
    /// }
    /// ```
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let data: CatalogFile = serde_json::from_str(&content)
            .map_err(|e| Error::Catalog(format!("Failed to parse {:?}: {}", path, e)))?;
        info!(
            "Loaded catalog from {:?}: {} decade/genre rankings, {} collections",
            path,
            data.decade_genre.len(),
            data.collections.len()
        );
        Ok(Self { data })
    }

    pub fn with_decade_genre(mut self, decade: &str, genre: &str, items: Vec<CatalogItem>) -> Self {
        self.data.decade_genre.push(DecadeGenreRanking {
            decade: decade.to_string(),
            genre: genre.to_string(),
            items,
        });
        self
    }

    pub fn with_collection(mut self, slug: &str, items: Vec<CatalogItem>) -> Self {
        self.data.collections.push(CollectionRanking {
            slug: slug.to_string(),
            items,
        });
        self
    }
}

impl CatalogSource for StaticCatalog {
    fn fetch_ordered_items(&self, scope: &CatalogScope, range: RankRange) -> Result<Vec<CatalogItem>> {
        range.validate()?;

        let mut items: Vec<CatalogItem> = match scope {
            CatalogScope::DecadeGenre { decade, genre } => self
                .data
                .decade_genre
                .iter()
                .filter(|r| r.decade.eq_ignore_ascii_case(decade))
                .filter(|r| match genre {
                    Some(g) => r.genre.eq_ignore_ascii_case(g),
                    None => true,
                })
                .flat_map(|r| r.items.iter())
                .filter(|item| range.contains(item.rank))
                .cloned()
                .collect(),
            CatalogScope::Collection { slug } => self
                .data
                .collections
                .iter()
                .filter(|c| c.slug == *slug)
                .flat_map(|c| c.items.iter())
                .filter(|item| range.contains(item.rank))
                .cloned()
                .collect(),
        };

        items.sort_by_key(|item| item.rank);
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn item(rank: u32) -> CatalogItem {
        CatalogItem {
            rank,
            track_name: format!("Track {}", rank),
            artist_name: format!("Artist {}", rank),
            spotify_track_id: Some(format!("trk{}", rank)),
            spotify_artist_id: None,
            duration_ms: None,
        }
    }

    #[test]
    fn range_validation() {
        assert!(RankRange::new(1, 10).is_ok());
        assert!(RankRange::new(0, 10).is_err());
        assert!(RankRange::new(5, 2).is_err());
        assert!(RankRange::single(4).contains(4));
    }

    #[test]
    fn decade_genre_fetch_filters_and_sorts() {
        let catalog = StaticCatalog::new()
            .with_decade_genre("1980s", "rock", vec![item(3), item(1), item(2), item(7)])
            .with_decade_genre("1990s", "rock", vec![item(1)]);

        let scope = CatalogScope::DecadeGenre {
            decade: "1980S".to_string(),
            genre: Some("Rock".to_string()),
        };
        let items = catalog.fetch_ordered_items(&scope, RankRange::new(1, 3).unwrap()).unwrap();
        let ranks: Vec<u32> = items.iter().map(|i| i.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn unknown_collection_is_empty() {
        let catalog = StaticCatalog::new().with_collection("road-trip", vec![item(1)]);
        let scope = CatalogScope::Collection {
            slug: "missing".to_string(),
        };
        let items = catalog.fetch_ordered_items(&scope, RankRange::new(1, 5).unwrap()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn loads_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "decadeGenre": [{{
                    "decade": "1970s",
                    "genre": "disco",
                    "items": [
                        {{"rank": 2, "trackName": "B", "artistName": "Y"}},
                        {{"rank": 1, "trackName": "A", "artistName": "X", "spotifyTrackId": "abc"}}
                    ]
                }}]
            }}"#
        )
        .unwrap();

        let catalog = StaticCatalog::from_json_file(file.path()).unwrap();
        let scope = CatalogScope::DecadeGenre {
            decade: "1970s".to_string(),
            genre: None,
        };
        let items = catalog.fetch_ordered_items(&scope, RankRange::new(1, 2).unwrap()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].spotify_track_id.as_deref(), Some("abc"));
        assert_eq!(items[1].spotify_track_id, None);
    }

    #[test]
    fn scope_serializes_with_kind_tag() {
        let scope: CatalogScope =
            serde_json::from_str(r#"{"kind":"collection","slug":"summer"}"#).unwrap();
        assert_eq!(scope.mode(), PlaybackMode::Collection);
        assert_eq!(scope.to_string(), "collection:summer");
    }
}
