// src/error.rs
//! Error classification shared by the adapters, the store and the engine.

use std::time::Duration;

use thiserror::Error;

/// Longest server-requested wait honoured before a retry.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);
/// Error bodies kept for diagnostics, in characters.
const MAX_BODY_CHARS: usize = 300;

/// Failure of one call to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service}: request failed: {source}")]
    Network {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service}: not found")]
    NotFound { service: &'static str },
    #[error("{service}: rate limited (retry after {retry_after:?})")]
    RateLimited {
        service: &'static str,
        retry_after: Option<Duration>,
    },
    #[error("{service}: HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },
    #[error("{service}: unexpected response: {reason}")]
    Decode { service: &'static str, reason: String },
    #[error("{service}: scratch I/O failed: {source}")]
    Io {
        service: &'static str,
        #[source]
        source: std::io::Error,
    },
}

impl ServiceError {
    pub fn network(service: &'static str, source: reqwest::Error) -> Self {
        Self::Network { service, source }
    }

    pub fn decode(service: &'static str, reason: impl Into<String>) -> Self {
        Self::Decode {
            service,
            reason: reason.into(),
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::NotFound { .. } => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Status { .. } => "status",
            Self::Decode { .. } => "decode",
            Self::Io { .. } => "io",
        }
    }

    /// Map a non-success HTTP response to its class. Consumes the body for diagnostics.
    pub async fn from_response(service: &'static str, resp: reqwest::Response) -> Self {
        let status = resp.status();
        match status.as_u16() {
            404 => Self::NotFound { service },
            429 => Self::RateLimited {
                service,
                retry_after: retry_after(&resp),
            },
            code => {
                let body = resp.text().await.unwrap_or_default();
                let body: String = body.chars().take(MAX_BODY_CHARS).collect();
                Self::Status {
                    service,
                    status: code,
                    body,
                }
            }
        }
    }
}

/// `Retry-After` in seconds (fractions allowed, as Discord sends them).
fn retry_after(resp: &reqwest::Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

/// Seconds to wait, capped at [`MAX_RETRY_AFTER`]. Negative or NaN values are ignored.
pub fn parse_retry_after(raw: &str) -> Option<Duration> {
    let secs = raw.trim().parse::<f64>().ok()?;
    if secs.is_nan() || secs < 0.0 {
        return None;
    }
    let wait = Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_AFTER);
    Some(wait.min(MAX_RETRY_AFTER))
}

/// Failure of the reconciliation store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("store file {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Why a single record was skipped during a tick.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record has no catalog link")]
    MissingLink,
    #[error("catalog link {link:?} has no /title/<ref> segment")]
    MalformedRef { link: String },
    #[error("reading sync state failed: {0}")]
    StoreRead(#[source] StoreError),
    #[error("catalog lookup failed: {0}")]
    Enrichment(#[source] ServiceError),
    #[error("publishing failed: {0}")]
    Publish(#[source] ServiceError),
}

impl RecordError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingLink => "missing_link",
            Self::MalformedRef { .. } => "malformed_ref",
            Self::StoreRead(_) => "store_read",
            Self::Enrichment(_) => "enrichment",
            Self::Publish(_) => "publish",
        }
    }
}
