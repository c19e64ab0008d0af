// src/render.rs
//! Event name and description assembly.

use crate::model::{end_time, EnrichedMetadata, ImagePayload, Privacy, PublishRequest, SourceRecord};

/// Discord limits for guild scheduled events.
pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 1000;

const ADULT_WARNING: &str = "🔞 **This is an adult movie**";

/// Canonical catalog page for a reference.
pub fn catalog_url(external_ref: &str) -> String {
    format!("https://www.imdb.com/title/{external_ref}")
}

/// `"Title (1994)"`, or just the title when the year is unknown.
pub fn event_name(meta: &EnrichedMetadata) -> String {
    let name = match meta.release_year {
        Some(year) => format!("{} ({year})", meta.title),
        None => meta.title.clone(),
    };
    truncate_chars(&name, MAX_NAME_CHARS)
}

/// Warning line, genre tags, overview, blank line, catalog URL.
/// The overview is shortened first when the whole thing would not fit.
pub fn event_description(meta: &EnrichedMetadata, external_ref: &str) -> String {
    let mut head = String::new();
    if meta.adult {
        head.push_str(ADULT_WARNING);
        head.push('\n');
    }
    let tags: Vec<String> = meta.genres.iter().map(|g| format!("`{g}`")).collect();
    head.push_str(&tags.join("  "));
    head.push('\n');

    let tail = format!("\n\n{}", catalog_url(external_ref));

    let fixed = head.chars().count() + tail.chars().count();
    if fixed > MAX_DESCRIPTION_CHARS {
        tracing::warn!(
            external_ref,
            chars = fixed,
            limit = MAX_DESCRIPTION_CHARS,
            "genre tags and link alone exceed the description limit; discord will reject the event"
        );
    }
    let room = MAX_DESCRIPTION_CHARS.saturating_sub(fixed);
    let overview = truncate_chars(meta.synopsis.trim(), room);

    format!("{head}{overview}{tail}")
}

pub fn build_request(
    record: &SourceRecord,
    external_ref: &str,
    meta: &EnrichedMetadata,
    image: Option<ImagePayload>,
    channel_id: &str,
) -> PublishRequest {
    PublishRequest {
        channel_id: channel_id.to_string(),
        name: event_name(meta),
        description: event_description(meta, external_ref),
        start: record.scheduled_at,
        end: end_time(record.scheduled_at, meta.runtime_minutes),
        privacy: Privacy::GuildOnly,
        image,
    }
}

/// Cut to `max` chars, ending with an ellipsis when something was dropped.
fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out: String = s.chars().take(max - 1).collect();
    out.push('…');
    out
}
