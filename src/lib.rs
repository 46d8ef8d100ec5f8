//! News Digest - dashboard for a categorized daily news digest
//!
//! This crate renders the daily digest, stats and security newsletter served by
//! the digest backend. It contains a typed client for the backend REST API, the
//! summary segmenters used to turn free text into bullet points and sections,
//! and the web server that renders the dashboard and proxies `/api/*` calls.

pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod models;
pub mod proxy;
pub mod routes;
pub mod segment;

pub use client::{ApiClient, ExecutionContext};
pub use error::ApiError;
