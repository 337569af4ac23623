//! Narration asset keys and resolvers
//!
//! Narration clips are pre-rendered and stored per language bucket:
//! - intro: `intro/{decade}_{genre}_{rank:02}.mp3`
//! - collection intro: `collections-intro/{slug}_{rank:02}.mp3`
//! - detail: `detail/{spotify_track_id}.mp3`
//! - artist: `artist/{spotify_artist_id}.mp3`

use crate::catalog::{CatalogItem, CatalogScope};
use crate::config::LanguageBuckets;
use crate::error::{Error, Result};
use radiocast_common::events::PlaybackPhase;
use std::path::PathBuf;

/// Canonical narration language: `en`, `es` or `pt-BR`
pub fn canonical_language(language: &str) -> &'static str {
    match language.trim().to_ascii_lowercase().as_str() {
        "es" => "es",
        "ptbr" | "pt-br" | "pt_br" | "pt" => "pt-BR",
        _ => "en",
    }
}

pub fn bucket_for_language<'a>(buckets: &'a LanguageBuckets, language: &str) -> &'a str {
    match canonical_language(language) {
        "es" => &buckets.es,
        "pt-BR" => &buckets.pt_br,
        _ => &buckets.en,
    }
}

/// Lowercase, spaces and slashes to `_`, `&` to `and`
pub fn normalize_for_filename(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .replace('&', "and")
        .replace([' ', '/'], "_")
}

/// Storage key for one narration phase of `item`, if derivable
pub fn narration_key(phase: PlaybackPhase, scope: &CatalogScope, item: &CatalogItem) -> Option<String> {
    match phase {
        PlaybackPhase::Intro => match scope {
            CatalogScope::DecadeGenre {
                decade,
                genre: Some(genre),
            } => Some(format!(
                "intro/{}_{}_{:02}.mp3",
                normalize_for_filename(decade),
                normalize_for_filename(genre),
                item.rank
            )),
            CatalogScope::DecadeGenre { genre: None, .. } => None,
            CatalogScope::Collection { slug } => Some(format!(
                "collections-intro/{}_{:02}.mp3",
                normalize_for_filename(slug),
                item.rank
            )),
        },
        PlaybackPhase::Detail => item
            .spotify_track_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("detail/{}.mp3", id)),
        PlaybackPhase::Artist => item
            .spotify_artist_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("artist/{}.mp3", id)),
        _ => None,
    }
}

/// Turns `(bucket, key)` into something the renderer can fetch
pub trait NarrationResolver: Send + Sync {
    /// Fails with [`Error::AssetMissing`] when the asset is absent
    fn resolve_audio_ref(&self, bucket: &str, key: &str) -> Result<String>;
}

/// Public object-storage URLs
///
/// `{base}/storage/v1/object/public/{bucket}/{key}` with each key segment
/// percent-encoded.
#[derive(Debug, Clone)]
pub struct PublicUrlResolver {
    base_url: String,
}

impl PublicUrlResolver {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl NarrationResolver for PublicUrlResolver {
    fn resolve_audio_ref(&self, bucket: &str, key: &str) -> Result<String> {
        let mut path = key.trim_start_matches('/');
        if let Some(stripped) = path.strip_prefix(bucket).and_then(|p| p.strip_prefix('/')) {
            path = stripped;
        }
        if path.is_empty() {
            return Err(Error::AssetMissing {
                bucket: bucket.to_string(),
                key: key.to_string(),
            });
        }

        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();

        Ok(format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            bucket,
            encoded.join("/")
        ))
    }
}

/// Files under `{root}/{bucket}/{key}`
#[derive(Debug, Clone)]
pub struct LocalDirResolver {
    root: PathBuf,
}

impl LocalDirResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl NarrationResolver for LocalDirResolver {
    fn resolve_audio_ref(&self, bucket: &str, key: &str) -> Result<String> {
        let path = self.root.join(bucket).join(key.trim_start_matches('/'));
        if path.is_file() {
            Ok(path.to_string_lossy().into_owned())
        } else {
            Err(Error::AssetMissing {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
        }
    }
}
