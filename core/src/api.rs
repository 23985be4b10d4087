//! REST client for the simulation service.
//!
//! Every call is a single request with no automatic retry. Non-2xx answers
//! become `ReplayError::Status` carrying the response body, so the view can
//! show the service's own error text.

use crate::{
    error::{ReplayError, ReplayResult},
    model::{Run, RunDetail, Scenario, ScenarioConfig, TimelineEvent},
};
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    http:     reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> ReplayResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ReplayError::InvalidBaseUrl { url: base_url });
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ── Scenarios ──────────────────────────────────────────────────

    pub async fn list_scenarios(&self) -> ReplayResult<Vec<Scenario>> {
        self.get_json("/scenarios/").await
    }

    pub async fn create_scenario(&self, config: &ScenarioConfig) -> ReplayResult<Scenario> {
        let url = self.url("/scenarios/");
        let response = self.http.post(&url).json(config).send().await?;
        Self::decode(url, response).await
    }

    pub async fn launch_run(&self, scenario_id: &str) -> ReplayResult<Run> {
        let url = self.url(&format!("/scenarios/{scenario_id}/launch"));
        let response = self.http.post(&url).send().await?;
        Self::decode(url, response).await
    }

    // ── Runs ───────────────────────────────────────────────────────

    /// All runs, newest first.
    pub async fn list_runs(&self) -> ReplayResult<Vec<Run>> {
        self.get_json("/scenarios/runs").await
    }

    pub async fn get_run(&self, run_id: &str) -> ReplayResult<RunDetail> {
        self.get_json(&format!("/scenarios/runs/{run_id}")).await
    }

    pub async fn get_timeline(&self, run_id: &str) -> ReplayResult<Vec<TimelineEvent>> {
        self.get_json(&format!("/scenarios/runs/{run_id}/timeline")).await
    }

    /// Ask the service to cancel. Accepted (202) does not mean the run has
    /// stopped; the stage change arrives later through the usual channels.
    pub async fn cancel_run(&self, run_id: &str) -> ReplayResult<()> {
        let url = self.url(&format!("/scenarios/runs/{run_id}/cancel"));
        let response = self.http.post(&url).send().await?;
        Self::check(url, response).await.map(|_| ())
    }

    /// Push-stream endpoint for `run_id`, on the ws/wss scheme matching the
    /// base URL.
    pub fn stream_url(&self, run_id: &str) -> ReplayResult<String> {
        stream_url(&self.base_url, run_id)
    }

    // ── Plumbing ───────────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> ReplayResult<T> {
        let url = self.url(path);
        log::debug!("GET {url}");
        let response = self.http.get(&url).send().await?;
        Self::decode(url, response).await
    }

    async fn decode<T: DeserializeOwned>(url: String, response: reqwest::Response) -> ReplayResult<T> {
        let response = Self::check(url, response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn check(url: String, response: reqwest::Response) -> ReplayResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ReplayError::Status {
            url,
            status: status.as_u16(),
            body,
        })
    }
}

/// `http://host/api/v1` + `run-1` → `ws://host/api/v1/scenarios/runs/run-1/stream`.
pub fn stream_url(base_url: &str, run_id: &str) -> ReplayResult<String> {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(ReplayError::InvalidBaseUrl {
            url: base_url.to_string(),
        });
    };
    Ok(format!("{ws_base}/scenarios/runs/{run_id}/stream"))
}
