// src/asset.rs
//! Turns a catalog image path into an inline data URI.
//!
//! The download goes to a named temporary file inside the scratch directory.
//! The file is owned by a `NamedTempFile` guard, so it is removed on every
//! exit path (success, HTTP error, size overrun, or a dropped future).

use std::path::PathBuf;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::io::AsyncWriteExt;

use crate::error::ServiceError;
use crate::model::ImagePayload;

const SERVICE: &str = "assets";
const DEFAULT_MIME: &str = "image/jpeg";

#[async_trait]
pub trait AssetMaterializer: Send + Sync {
    async fn materialize(&self, image_ref: &str) -> Result<ImagePayload, ServiceError>;
}

pub struct HttpAssetMaterializer {
    http: reqwest::Client,
    base_url: String,
    scratch_dir: PathBuf,
    max_bytes: u64,
}

impl HttpAssetMaterializer {
    pub fn new(
        http: reqwest::Client,
        base_url: impl Into<String>,
        scratch_dir: impl Into<PathBuf>,
        max_bytes: u64,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            scratch_dir: scratch_dir.into(),
            max_bytes,
        }
    }

    fn image_url(&self, image_ref: &str) -> String {
        if image_ref.starts_with("http://") || image_ref.starts_with("https://") {
            image_ref.to_string()
        } else {
            format!("{}/{}", self.base_url, image_ref.trim_start_matches('/'))
        }
    }

    fn io(source: std::io::Error) -> ServiceError {
        ServiceError::Io {
            service: SERVICE,
            source,
        }
    }
}

#[async_trait]
impl AssetMaterializer for HttpAssetMaterializer {
    async fn materialize(&self, image_ref: &str) -> Result<ImagePayload, ServiceError> {
        let url = self.image_url(image_ref);
        let mut resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ServiceError::network(SERVICE, e))?;
        if !resp.status().is_success() {
            return Err(ServiceError::from_response(SERVICE, resp).await);
        }
        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| DEFAULT_MIME.to_string());

        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(Self::io)?;
        let scratch = tempfile::Builder::new()
            .prefix("asset-")
            .tempfile_in(&self.scratch_dir)
            .map_err(Self::io)?;

        let mut file = tokio::fs::File::create(scratch.path())
            .await
            .map_err(Self::io)?;
        let mut written: u64 = 0;
        while let Some(chunk) = resp
            .chunk()
            .await
            .map_err(|e| ServiceError::network(SERVICE, e))?
        {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(ServiceError::decode(
                    SERVICE,
                    format!("image larger than {} bytes", self.max_bytes),
                ));
            }
            file.write_all(&chunk).await.map_err(Self::io)?;
        }
        file.flush().await.map_err(Self::io)?;
        drop(file);

        let bytes = tokio::fs::read(scratch.path()).await.map_err(Self::io)?;
        if bytes.is_empty() {
            return Err(ServiceError::decode(SERVICE, "empty image body"));
        }
        tracing::debug!(url = %url, bytes = bytes.len(), "image materialized");
        Ok(ImagePayload(format!(
            "data:{mime};base64,{}",
            STANDARD.encode(&bytes)
        )))
    }
}
