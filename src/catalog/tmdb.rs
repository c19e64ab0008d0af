// src/catalog/tmdb.rs
use async_trait::async_trait;
use serde::Deserialize;

use super::CatalogLookup;
use crate::error::ServiceError;
use crate::model::EnrichedMetadata;

const SERVICE: &str = "tmdb";
const DEFAULT_BASE_URL: &str = "https://api.themoviedb.org";

/// TMDB movie details. The endpoint accepts IMDb ids as well as TMDB ids.
pub struct TmdbCatalog {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct Genre {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MovieDetails {
    title: String,
    #[serde(default)]
    overview: Option<String>,
    #[serde(default)]
    genres: Vec<Genre>,
    #[serde(default)]
    adult: bool,
    #[serde(default)]
    release_date: Option<String>,
    #[serde(default)]
    runtime: Option<u32>,
    #[serde(default)]
    backdrop_path: Option<String>,
}

impl From<MovieDetails> for EnrichedMetadata {
    fn from(m: MovieDetails) -> Self {
        EnrichedMetadata {
            release_year: m.release_date.as_deref().and_then(release_year),
            title: m.title,
            synopsis: m.overview.unwrap_or_default(),
            genres: m.genres.into_iter().map(|g| g.name).collect(),
            adult: m.adult,
            runtime_minutes: m.runtime,
            image_ref: m.backdrop_path.filter(|p| !p.is_empty()),
        }
    }
}

/// Year part of `YYYY-MM-DD`; `None` for an empty or odd date.
pub fn release_year(date: &str) -> Option<i32> {
    date.split('-').next()?.trim().parse().ok()
}

impl TmdbCatalog {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Check the API key is accepted.
    pub async fn probe(&self) -> Result<(), ServiceError> {
        let url = format!("{}/3/configuration", self.base_url);
        let resp = self
            .http
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ServiceError::network(SERVICE, e))?;
        if !resp.status().is_success() {
            return Err(ServiceError::from_response(SERVICE, resp).await);
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogLookup for TmdbCatalog {
    async fn lookup(&self, external_ref: &str) -> Result<EnrichedMetadata, ServiceError> {
        let url = format!("{}/3/movie/{}", self.base_url, external_ref);
        let resp = self
            .http
            .get(url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ServiceError::network(SERVICE, e))?;
        if !resp.status().is_success() {
            return Err(ServiceError::from_response(SERVICE, resp).await);
        }
        let details: MovieDetails = resp
            .json()
            .await
            .map_err(|e| ServiceError::decode(SERVICE, e.to_string()))?;
        Ok(details.into())
    }
}
