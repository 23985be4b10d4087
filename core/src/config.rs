//! Client configuration.
//!
//! Sources, lowest to highest precedence:
//!   1. Built-in defaults.
//!   2. An optional JSON file.
//!   3. `SW_*` environment variables.

use crate::{
    connection::{ReconnectPolicy, DEFAULT_MAX_BACKOFF_SECS, DEFAULT_MAX_RECONNECT_ATTEMPTS},
    tick_buffer::DEFAULT_TICK_CAPACITY,
    timeline::DEFAULT_TIMELINE_CAPACITY,
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url:           String,
    pub tick_buffer_capacity:   usize,
    pub timeline_capacity:      usize,
    pub max_reconnect_attempts: u32,
    pub max_backoff_secs:       u64,
    /// Run-list refresh cadence while the catalog is healthy.
    pub catalog_refresh_secs:   u64,
    /// Run metadata poll cadence once the stream is gone for good.
    pub run_poll_secs:          u64,
    pub request_timeout_secs:   u64,
    pub show_heatmap:           bool,
    /// Pixel size of one grid cell. Falls back to the layout's own size.
    pub cell_px:                Option<u32>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url:           DEFAULT_API_BASE_URL.to_string(),
            tick_buffer_capacity:   DEFAULT_TICK_CAPACITY,
            timeline_capacity:      DEFAULT_TIMELINE_CAPACITY,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            max_backoff_secs:       DEFAULT_MAX_BACKOFF_SECS,
            catalog_refresh_secs:   5,
            run_poll_secs:          5,
            request_timeout_secs:   10,
            show_heatmap:           true,
            cell_px:                None,
        }
    }
}

impl ClientConfig {
    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config {path}"))?;
        serde_json::from_str(&content).with_context(|| format!("Cannot parse config {path}"))
    }

    /// Apply `SW_*` overrides. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SW_API_BASE_URL") {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup("SW_TICK_BUFFER_CAPACITY") {
            self.tick_buffer_capacity = raw
                .parse()
                .with_context(|| format!("SW_TICK_BUFFER_CAPACITY: not a number: {raw}"))?;
        }
        if let Some(raw) = lookup("SW_TIMELINE_CAPACITY") {
            self.timeline_capacity = raw
                .parse()
                .with_context(|| format!("SW_TIMELINE_CAPACITY: not a number: {raw}"))?;
        }
        if let Some(raw) = lookup("SW_MAX_RECONNECT_ATTEMPTS") {
            self.max_reconnect_attempts = raw
                .parse()
                .with_context(|| format!("SW_MAX_RECONNECT_ATTEMPTS: not a number: {raw}"))?;
        }
        Ok(())
    }

    pub fn view_config(&self) -> ViewConfig {
        ViewConfig {
            tick_capacity:     self.tick_buffer_capacity,
            timeline_capacity: self.timeline_capacity,
            reconnect:         ReconnectPolicy {
                max_attempts:     self.max_reconnect_attempts,
                max_backoff_secs: self.max_backoff_secs,
            },
            run_poll_interval: Duration::from_secs(self.run_poll_secs.max(1)),
            show_heatmap:      self.show_heatmap,
        }
    }
}

/// The slice of configuration the view engine needs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewConfig {
    pub tick_capacity:     usize,
    pub timeline_capacity: usize,
    pub reconnect:         ReconnectPolicy,
    pub run_poll_interval: Duration,
    pub show_heatmap:      bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        ClientConfig::default().view_config()
    }
}
