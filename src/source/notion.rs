// src/source/notion.rs
//! Notion database as the schedule source.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use super::RecordSource;
use crate::config::Tunables;
use crate::error::ServiceError;
use crate::model::SourceRecord;

const SERVICE: &str = "notion";
const DEFAULT_BASE_URL: &str = "https://api.notion.com";
const NOTION_VERSION: &str = "2022-06-28";
/// Notion's maximum page size.
const PAGE_SIZE: u32 = 100;

/// Database property names holding the start date, the host and the catalog link.
#[derive(Debug, Clone)]
pub struct PropertyNames {
    pub date: String,
    pub host: String,
    pub link: String,
}

impl From<&Tunables> for PropertyNames {
    fn from(t: &Tunables) -> Self {
        Self {
            date: t.date_property.clone(),
            host: t.host_property.clone(),
            link: t.link_property.clone(),
        }
    }
}

pub struct NotionSource {
    http: reqwest::Client,
    base_url: String,
    token: String,
    database_id: String,
    props: PropertyNames,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl NotionSource {
    pub fn new(
        http: reqwest::Client,
        token: impl Into<String>,
        database_id: impl Into<String>,
        props: PropertyNames,
    ) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            database_id: database_id.into(),
            props,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Check the token can read the database.
    pub async fn probe(&self) -> Result<(), ServiceError> {
        let url = format!("{}/v1/databases/{}", self.base_url, self.database_id);
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .send()
            .await
            .map_err(|e| ServiceError::network(SERVICE, e))?;
        if !resp.status().is_success() {
            return Err(ServiceError::from_response(SERVICE, resp).await);
        }
        Ok(())
    }

    fn query_body(&self, now: DateTime<Utc>, cursor: Option<&str>) -> Value {
        let mut body = json!({
            "page_size": PAGE_SIZE,
            "filter": {
                "and": [
                    {
                        "property": self.props.date,
                        "date": { "on_or_after": now.to_rfc3339() },
                    },
                    {
                        "property": self.props.host,
                        "people": { "is_not_empty": true },
                    },
                ]
            }
        });
        if let Some(c) = cursor {
            body["start_cursor"] = Value::String(c.to_string());
        }
        body
    }

    async fn query_page(
        &self,
        now: DateTime<Utc>,
        cursor: Option<&str>,
    ) -> Result<QueryResponse, ServiceError> {
        let url = format!("{}/v1/databases/{}/query", self.base_url, self.database_id);
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(&self.query_body(now, cursor))
            .send()
            .await
            .map_err(|e| ServiceError::network(SERVICE, e))?;
        if !resp.status().is_success() {
            return Err(ServiceError::from_response(SERVICE, resp).await);
        }
        resp.json()
            .await
            .map_err(|e| ServiceError::decode(SERVICE, e.to_string()))
    }
}

#[async_trait]
impl RecordSource for NotionSource {
    async fn fetch_eligible(&self, now: DateTime<Utc>) -> Result<Vec<SourceRecord>, ServiceError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.query_page(now, cursor.as_deref()).await?;
            for result in &page.results {
                match parse_page(result, &self.props) {
                    Ok(rec) => records.push(rec),
                    Err(reason) => {
                        let id = result.get("id").and_then(Value::as_str).unwrap_or("?");
                        tracing::warn!(record_id = id, %reason, "skipping unreadable Notion page");
                    }
                }
            }
            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }
        tracing::debug!(count = records.len(), "notion query done");
        Ok(records)
    }

    fn name(&self) -> &'static str {
        SERVICE
    }
}

/// Turn one Notion page object into a `SourceRecord`.
pub fn parse_page(page: &Value, props: &PropertyNames) -> Result<SourceRecord, String> {
    let id = page
        .get("id")
        .and_then(Value::as_str)
        .ok_or("page has no id")?
        .to_string();
    let properties = page.get("properties").ok_or("page has no properties")?;

    let start = properties
        .get(&props.date)
        .and_then(|p| p.get("date"))
        .and_then(|d| d.get("start"))
        .and_then(Value::as_str)
        .ok_or_else(|| format!("property {:?} has no start date", props.date))?;
    let scheduled_at = parse_notion_date(start)?;

    let external_link = properties
        .get(&props.link)
        .and_then(|p| p.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let has_host = properties
        .get(&props.host)
        .and_then(|p| p.get("people"))
        .and_then(Value::as_array)
        .is_some_and(|people| !people.is_empty());

    Ok(SourceRecord {
        id,
        external_link,
        scheduled_at,
        has_host,
    })
}

/// Notion dates are either full ISO-8601 timestamps or bare `YYYY-MM-DD` days (read as midnight UTC).
pub fn parse_notion_date(s: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("unrecognized date {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn page(date: Value, people: Value, url: Value) -> Value {
        json!({
            "object": "page",
            "id": "0f6c3a8e-1111-2222-3333-444455556666",
            "properties": {
                "Date": { "type": "date", "date": date },
                "Host (primary)": { "type": "people", "people": people },
                "IMDb": { "type": "url", "url": url },
            }
        })
    }

    #[test]
    fn parses_full_page() {
        let p = page(
            json!({ "start": "2030-03-14T20:00:00.000+01:00", "end": null }),
            json!([{ "object": "user", "id": "u1" }]),
            json!("https://www.imdb.com/title/tt0111161/"),
        );
        let rec = parse_page(&p, &PropertyNames::from(&Tunables::default())).unwrap();
        assert_eq!(rec.id, "0f6c3a8e-1111-2222-3333-444455556666");
        assert_eq!(
            rec.scheduled_at,
            Utc.with_ymd_and_hms(2030, 3, 14, 19, 0, 0).unwrap()
        );
        assert!(rec.has_host);
        assert_eq!(rec.external_ref().unwrap(), "tt0111161");
    }

    #[test]
    fn empty_people_and_null_url() {
        let p = page(json!({ "start": "2030-03-14" }), json!([]), Value::Null);
        let rec = parse_page(&p, &PropertyNames::from(&Tunables::default())).unwrap();
        assert!(!rec.has_host);
        assert_eq!(rec.external_link, None);
        assert_eq!(
            rec.scheduled_at,
            Utc.with_ymd_and_hms(2030, 3, 14, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn missing_date_is_an_error() {
        let p = page(Value::Null, json!([]), Value::Null);
        assert!(parse_page(&p, &PropertyNames::from(&Tunables::default())).is_err());
    }

    #[test]
    fn query_filter_uses_configured_properties() {
        let src = NotionSource::new(
            reqwest::Client::new(),
            "secret",
            "db",
            PropertyNames {
                date: "When".into(),
                host: "Host".into(),
                link: "Link".into(),
            },
        );
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let body = src.query_body(now, Some("cur-2"));
        assert_eq!(body["filter"]["and"][0]["property"], "When");
        assert_eq!(body["filter"]["and"][0]["date"]["on_or_after"], now.to_rfc3339());
        assert_eq!(body["filter"]["and"][1]["people"]["is_not_empty"], true);
        assert_eq!(body["start_cursor"], "cur-2");
    }
}
