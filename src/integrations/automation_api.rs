//! HTTP client for the automation platform's workspace API.

use super::common::{Envelope, RetryPolicy};
use super::RunSource;
use crate::config::ApiConfig;
use crate::error::{AppError, Result};
use crate::models::{Process, ProcessRun, RunState, StepRun};
use crate::vault::Credentials;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Client for the process, process-run and step-run listing endpoints
#[derive(Clone)]
pub struct AutomationApiClient {
    client: Client,
    base_url: String,
    auth_header: String,
    workspace_id: String,
    retry: RetryPolicy,
}

impl AutomationApiClient {
    /// Create a client bound to one workspace
    pub fn new(config: &ApiConfig, credentials: &Credentials) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("run-history-export/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: format!("{} {}", config.auth_scheme, credentials.api_key),
            workspace_id: credentials.workspace_id.clone(),
            retry: RetryPolicy::from_config(config),
        })
    }

    /// Replace the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn workspace_url(&self, resource: &str) -> String {
        format!("{}/workspaces/{}/{}", self.base_url, self.workspace_id, resource)
    }

    /// GET a listing endpoint and unwrap its data envelope, retrying transient failures
    async fn get_list<T: DeserializeOwned>(
        &self,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let url = self.workspace_url(resource);
        let url = url.as_str();
        self.retry
            .run(resource, move || self.get_list_once(url, resource, query))
            .await
    }

    async fn get_list_once<T: DeserializeOwned>(
        &self,
        url: &str,
        resource: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("Content-Type", "application/json")
            .header("Authorization", &self.auth_header)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_error(status, resource, &body));
        }

        let items = Envelope::decode(&body, resource)?;
        debug!(resource, count = items.len(), "Listing fetched");
        Ok(items)
    }
}

/// Map a non-success status to the error taxonomy
fn status_error(status: StatusCode, resource: &str, body: &str) -> AppError {
    let message = format!("{} request failed: {}", resource, truncate(body, 200));
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Authentication(message),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimit(message),
        _ => AppError::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}

fn truncate(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[async_trait]
impl RunSource for AutomationApiClient {
    async fn list_processes(&self) -> Result<Vec<Process>> {
        self.get_list("processes", &[]).await
    }

    async fn list_process_runs(&self, process_id: &str, state: RunState) -> Result<Vec<ProcessRun>> {
        let state = state.to_string();
        self.get_list(
            "process-runs",
            &[("process_id", process_id), ("state", state.as_str())],
        )
        .await
    }

    async fn list_step_runs(&self, process_run_id: &str) -> Result<Vec<StepRun>> {
        self.get_list("step-runs", &[("process_run_id", process_run_id)])
            .await
    }
}

impl std::fmt::Debug for AutomationApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationApiClient")
            .field("base_url", &self.base_url)
            .field("workspace_id", &self.workspace_id)
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, "processes", ""),
            AppError::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, "processes", ""),
            AppError::Authentication(_)
        ));
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "processes", ""),
            AppError::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "processes", ""),
            AppError::RateLimit(_)
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "processes", ""),
            AppError::Upstream { status: 502, .. }
        ));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("short", 200), "short");
    }

    #[test]
    fn test_workspace_url_and_redacted_debug() {
        let config = ApiConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            ..ApiConfig::default()
        };
        let client = AutomationApiClient::new(&config, &Credentials::new("ws-9", "secret-key")).unwrap();

        assert_eq!(
            client.workspace_url("processes"),
            "https://api.example.com/v1/workspaces/ws-9/processes"
        );
        assert_eq!(client.auth_header, "RC-WSKEY secret-key");
        assert!(!format!("{:?}", client).contains("secret-key"));
    }
}
