//! GitHub contents API as a content store

use async_trait::async_trait;
use reconflow_config::GithubSettings;
use reconflow_core::{ContentRef, ContentStore, ReconcileError, Result};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw";

/// Fetches raw file content from a GitHub-compatible API
pub struct GithubContentStore {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GithubContentStore {
    /// `timeout` bounds each request from connect to the last body byte
    pub fn new(
        api_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("reconflow/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Contents API URL for `content`
    pub fn contents_url(&self, content: &ContentRef) -> String {
        format!(
            "{}/repos/{}/contents/{}?ref={}",
            self.api_url,
            content.repo,
            content.path.trim_start_matches('/'),
            content.git_ref
        )
    }
}

/// Build the content store, or `None` when it cannot be used
///
/// A missing token only downgrades to anonymous access.
pub fn content_store(settings: &GithubSettings, timeout: Duration) -> Option<Arc<dyn ContentStore>> {
    let token = std::env::var(&settings.token_env)
        .ok()
        .filter(|t| !t.is_empty());
    if token.is_none() {
        warn!(
            "{} is not set; fetching worker scripts anonymously",
            settings.token_env
        );
    }

    match GithubContentStore::new(&settings.api_url, token, timeout) {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!("GitHub content store unavailable: {}", e);
            None
        }
    }
}

#[async_trait]
impl ContentStore for GithubContentStore {
    async fn get_file(&self, content: &ContentRef) -> Result<Vec<u8>> {
        let url = self.contents_url(content);
        tracing::debug!("Fetching {}", url);

        let mut request = self.client.get(&url).header("Accept", RAW_MEDIA_TYPE);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ReconcileError::backend(&content.repo, e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(ReconcileError::NotFound(format!(
                "{}:{}@{}",
                content.repo, content.path, content.git_ref
            ))),
            status if !status.is_success() => Err(ReconcileError::backend(
                &content.repo,
                format!("GitHub returned {}", status),
            )),
            _ => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ReconcileError::backend(&content.repo, e))?;
                Ok(bytes.to_vec())
            }
        }
    }
}
