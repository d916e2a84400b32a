//! Media metadata lookup
//!
//! Search results are cached per channel so that `enqueue` can resolve a url
//! without calling the provider again.

use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::{Result, WatchPartyError};
use crate::models::VideoMetadata;

/// Resolves search queries into media metadata
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Search for media matching `query`
    async fn search(&self, query: &str) -> Result<Vec<VideoMetadata>>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}

/// Provider backed by a fixed list of known media
///
/// # Example
///
/// ```
/// use watchparty::metadata::{MetadataProvider, StaticCatalog};
/// use watchparty::models::VideoMetadata;
///
/// # tokio_test::block_on(async {
/// let catalog = StaticCatalog::new(vec![VideoMetadata {
///     url: "https://v.example/1".to_string(),
///     title: "Clip A".to_string(),
///     thumbnail_url: String::new(),
///     duration: 90,
/// }]);
///
/// let hits = catalog.search("clip").await.unwrap();
/// assert_eq!(hits[0].url, "https://v.example/1");
/// # });
/// ```
#[derive(Debug, Default)]
pub struct StaticCatalog {
    entries: Vec<VideoMetadata>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<VideoMetadata>) -> Self {
        Self { entries }
    }

    /// Load a JSON array of `VideoMetadata`
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await?;
        let entries: Vec<VideoMetadata> = serde_json::from_str(&raw).map_err(|e| {
            WatchPartyError::InvalidConfig(format!(
                "catalog {} is not a valid JSON array: {}",
                path.display(),
                e
            ))
        })?;

        info!("Loaded {} catalog entries from {}", entries.len(), path.display());
        Ok(Self::new(entries))
    }
}

#[async_trait]
impl MetadataProvider for StaticCatalog {
    async fn search(&self, query: &str) -> Result<Vec<VideoMetadata>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let results: Vec<VideoMetadata> = self
            .entries
            .iter()
            .filter(|e| e.url == query.trim() || e.title.to_lowercase().contains(&needle))
            .cloned()
            .collect();

        debug!(query, hits = results.len(), "Catalog search");
        Ok(results)
    }

    fn provider_name(&self) -> &'static str {
        "static"
    }
}
