//! Telemetry and replay client for warehouse simulation runs.
//!
//! `view` is the single-threaded reducer that owns every store; `driver`
//! runs it on tokio and executes its effects against the REST API and the
//! per-run push stream.

pub mod api;
pub mod catalog;
pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod frame;
pub mod model;
pub mod notice;
pub mod render;
pub mod replay;
pub mod stream;
pub mod tick_buffer;
pub mod timeline;
pub mod types;
pub mod view;
