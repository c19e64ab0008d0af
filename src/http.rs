// src/http.rs
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Tunables;

const USER_AGENT: &str = concat!("cinema-sync/", env!("CARGO_PKG_VERSION"));

/// Shared reqwest client with bounded connect and total request time.
pub fn build_client(tunables: &Tunables) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(tunables.connect_timeout_secs))
        .timeout(Duration::from_secs(tunables.request_timeout_secs))
        .build()
        .context("building HTTP client")
}
