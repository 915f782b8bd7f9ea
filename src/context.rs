use std::time::Duration;

use crate::catalog::{CatalogClient, Track};
use crate::config::CuratorConfig;
use crate::errors::CuratorError;
use crate::fetch::{ReqwestTransport, ResilientFetch};
use crate::metadata::{MetadataCache, Requirements};

/// A catalog client over the blocking HTTP transport, with its own
/// request counter.
pub fn catalog_client(config: &CuratorConfig) -> Result<CatalogClient, CuratorError> {
    let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))
        .map_err(|e| CuratorError::Network(e.to_string()))?;
    let fetch = ResilientFetch::new(Box::new(transport), config.retry.clone());
    Ok(CatalogClient::new(
        fetch,
        &config.api_base_url,
        config.access_token.clone(),
    ))
}

/// State scoped to one pipeline invocation: the catalog client (which owns
/// the request counter), the metadata cache, and the tracks the last range
/// filter excluded.
pub struct RunContext {
    pub catalog: CatalogClient,
    pub metadata: MetadataCache,
    pub last_out_range: Vec<Track>,
}

impl RunContext {
    pub fn new(catalog: CatalogClient) -> Self {
        Self {
            catalog,
            metadata: MetadataCache::new(),
            last_out_range: Vec::new(),
        }
    }

    pub fn from_config(config: &CuratorConfig) -> Result<Self, CuratorError> {
        Ok(Self::new(catalog_client(config)?))
    }

    pub fn ensure(&mut self, tracks: &[Track], requirements: Requirements) {
        if requirements.is_empty() {
            return;
        }
        self.metadata.ensure(&self.catalog, tracks, requirements);
    }

    pub fn request_count(&self) -> u64 {
        self.catalog.request_count()
    }
}
