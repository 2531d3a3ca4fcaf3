//! HTTP client for the Todoist REST API.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;

use crate::{config::TodoistConfig, error::FetchError, todoist::task::RawTask};

/// Where the task tool gets its tasks from.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Fetch at most `limit` tasks due today or overdue, in upstream order.
    async fn today_and_overdue(&self, limit: u32) -> Result<Vec<RawTask>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct FilterPage {
    #[serde(default)]
    results: Option<Vec<serde_json::Value>>,
}

/// Todoist API client
pub struct TodoistClient {
    client: reqwest::Client,
    api_token: String,
    base_url: String,
    filter: String,
}

impl TodoistClient {
    pub fn new(config: &TodoistConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout())
            .timeout(config.timeout())
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Transport)?;

        Ok(Self {
            client,
            api_token: config.api_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            filter: config.filter.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }
}

#[async_trait]
impl TaskSource for TodoistClient {
    async fn today_and_overdue(&self, limit: u32) -> Result<Vec<RawTask>, FetchError> {
        let url = format!("{}/tasks/filter", self.base_url);
        let limit = limit.to_string();
        tracing::debug!(url = %url, filter = %self.filter, limit = %limit, "Fetching tasks");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .header(CONTENT_TYPE, "application/json")
            .query(&[("query", self.filter.as_str()), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(FetchError::Transport)?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Todoist request failed");
            return Err(FetchError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let page: FilterPage = serde_json::from_str(&body).map_err(FetchError::InvalidResponse)?;
        let tasks = page
            .results
            .unwrap_or_default()
            .iter()
            .map(RawTask::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count = tasks.len(), "Fetched tasks");
        Ok(tasks)
    }
}
