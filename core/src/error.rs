use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request to {url} failed with status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("Invalid base URL '{url}': expected http:// or https://")]
    InvalidBaseUrl { url: String },

    #[error("Scenario '{id}' not found in catalog")]
    ScenarioNotFound { id: String },

    #[error("No run is active")]
    NoActiveRun,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ReplayResult<T> = Result<T, ReplayError>;
