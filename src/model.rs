// src/model.rs
//! Records, persisted sync state and the per-record publish request.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// One schedule entry as read from the source on this tick. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub id: String,
    /// URL-shaped field carrying the catalog reference, e.g. an IMDb link.
    pub external_link: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub has_host: bool,
}

impl SourceRecord {
    /// Hosted and not yet started.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.has_host && self.scheduled_at >= now
    }

    pub fn external_ref(&self) -> Result<String, RecordError> {
        let link = self
            .external_link
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .ok_or(RecordError::MissingLink)?;
        extract_external_ref(link)
    }
}

/// Pull `<ref>` out of `.../title/<ref>...`.
pub fn extract_external_ref(link: &str) -> Result<String, RecordError> {
    static RE_TITLE: OnceCell<Regex> = OnceCell::new();
    let re = RE_TITLE.get_or_init(|| Regex::new(r"(?i)/title/(\w+)").unwrap());
    re.captures(link)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| RecordError::MalformedRef {
            link: link.to_string(),
        })
}

/// Last-known mapping between a source record and its target event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub external_ref: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    pub target_event_id: Option<String>,
}

impl SyncState {
    /// The only staleness signal: same start time and same catalog reference.
    pub fn matches(&self, external_ref: &str, scheduled_at: DateTime<Utc>) -> bool {
        self.scheduled_at == scheduled_at && self.external_ref == external_ref
    }
}

/// Catalog metadata for one reference. Lives for one record of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnrichedMetadata {
    pub title: String,
    pub synopsis: String,
    pub genres: Vec<String>,
    pub adult: bool,
    pub release_year: Option<i32>,
    pub runtime_minutes: Option<u32>,
    /// Catalog-relative image path (e.g. a TMDB backdrop path).
    pub image_ref: Option<String>,
}

/// An embeddable image, already encoded as a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload(pub String);

impl ImagePayload {
    pub fn as_data_uri(&self) -> &str {
        &self.0
    }
}

/// Who can see the published event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privacy {
    GuildOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub channel_id: String,
    pub name: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub privacy: Privacy,
    pub image: Option<ImagePayload>,
}

/// `start + runtime`; no end when the catalog has no runtime.
pub fn end_time(start: DateTime<Utc>, runtime_minutes: Option<u32>) -> Option<DateTime<Utc>> {
    runtime_minutes
        .filter(|m| *m > 0)
        .map(|m| start + ChronoDuration::milliseconds(i64::from(m) * 60_000))
}

/// Create-or-update, decided from local state only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOp {
    Create,
    Update { event_id: String },
}

impl PublishOp {
    pub fn for_state(state: Option<&SyncState>) -> Self {
        match state.and_then(|s| s.target_event_id.as_deref()) {
            Some(id) if !id.is_empty() => Self::Update {
                event_id: id.to_string(),
            },
            _ => Self::Create,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update { .. } => "update",
        }
    }
}
