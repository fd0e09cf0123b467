//! Slack chat.postMessage notifier

use async_trait::async_trait;
use reconflow_config::SlackSettings;
use reconflow_core::{Notifier, ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const SLACK_API_BASE: &str = "https://slack.com/api";
const POST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SlackNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct PostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_api_base(SLACK_API_BASE, token)
    }

    pub fn with_api_base(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into(),
            token: token.into(),
        }
    }
}

/// Build the notifier when notifications are configured and a token exists
pub fn notifier(settings: Option<&SlackSettings>) -> Option<Arc<dyn Notifier>> {
    let settings = settings?;
    match std::env::var(&settings.token_env) {
        Ok(token) if !token.is_empty() => Some(Arc::new(SlackNotifier::new(token))),
        _ => {
            warn!(
                "{} is not set; Slack notifications are disabled",
                settings.token_env
            );
            None
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
        let url = format!("{}/chat.postMessage", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .timeout(POST_TIMEOUT)
            .json(&PostMessage { channel, text })
            .send()
            .await
            .map_err(|e| ReconcileError::backend("slack", e))?;

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ReconcileError::backend("slack", e))?;

        if !api_response.ok {
            let error_msg = api_response
                .error
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(ReconcileError::execution("slack", error_msg));
        }

        Ok(())
    }
}
