//! Plex Media Server control API
//!
//! Adding a movie to a collection by name makes the server create the
//! collection (tag, collection record, membership) asynchronously.

use crate::error::ProviderError;
use crate::providers::http::{classify_error, classify_status, USER_AGENT};
use crate::providers::MediaServer;
use crate::types::MediaRecord;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

const PLEX_TOKEN_HEADER: &str = "X-Plex-Token";

/// Plex HTTP client
pub struct PlexServer {
    client: Client,
    base_url: String,
    token: String,
}

impl PlexServer {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Permanent(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl MediaServer for PlexServer {
    async fn add_to_collection(
        &self,
        record: &MediaRecord,
        collection_title: &str,
    ) -> Result<(), ProviderError> {
        let url = format!(
            "{}/library/sections/{}/all",
            self.base_url, record.library_section_id
        );
        let item_id = record.id.to_string();
        let item_type = record.kind.metadata_type().to_string();
        let query = [
            ("type", item_type.as_str()),
            ("id", item_id.as_str()),
            ("collection[0].tag.tag", collection_title),
            ("collection.locked", "1"),
        ];

        let response = self
            .client
            .put(&url)
            .header(PLEX_TOKEN_HEADER, &self.token)
            .query(&query)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, &url));
        }

        info!(
            movie = %record.title,
            collection = collection_title,
            "Requested collection membership from media server"
        );
        Ok(())
    }
}
