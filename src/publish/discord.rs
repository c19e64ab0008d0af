// src/publish/discord.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};

use super::EventPublisher;
use crate::error::{ServiceError, MAX_RETRY_AFTER};
use crate::model::{Privacy, PublishRequest};

const SERVICE: &str = "discord";
const DEFAULT_BASE_URL: &str = "https://discord.com/api/v10";
/// Guild scheduled event hosted in a voice channel.
const ENTITY_TYPE_VOICE: u8 = 2;
const PRIVACY_GUILD_ONLY: u8 = 2;

/// Guild scheduled events over the Discord REST API.
#[derive(Clone)]
pub struct DiscordPublisher {
    client: Client,
    base_url: String,
    token: String,
    guild_id: String,
    audit_reason: String,
    max_retries: u8,
    backoff_base: Duration,
}

#[derive(Serialize)]
struct ScheduledEventBody<'a> {
    channel_id: &'a str,
    name: &'a str,
    description: &'a str,
    entity_type: u8,
    privacy_level: u8,
    scheduled_start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduled_end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    image: Option<&'a str>,
}

impl<'a> From<&'a PublishRequest> for ScheduledEventBody<'a> {
    fn from(req: &'a PublishRequest) -> Self {
        let privacy_level = match req.privacy {
            Privacy::GuildOnly => PRIVACY_GUILD_ONLY,
        };
        Self {
            channel_id: &req.channel_id,
            name: &req.name,
            description: &req.description,
            entity_type: ENTITY_TYPE_VOICE,
            privacy_level,
            scheduled_start_time: req.start.to_rfc3339(),
            scheduled_end_time: req.end.map(|e| e.to_rfc3339()),
            image: req.image.as_ref().map(|i| i.as_data_uri()),
        }
    }
}

#[derive(Deserialize)]
struct CreatedEvent {
    id: String,
}

impl DiscordPublisher {
    pub fn new(
        client: Client,
        token: impl Into<String>,
        guild_id: impl Into<String>,
        audit_reason: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            guild_id: guild_id.into(),
            audit_reason: audit_reason.into(),
            max_retries: 3,
            backoff_base: Duration::from_millis(500),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    pub fn with_backoff(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Check the bot can see the guild.
    pub async fn probe(&self) -> Result<(), ServiceError> {
        let url = format!("{}/guilds/{}", self.base_url, self.guild_id);
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .send()
            .await
            .map_err(|e| ServiceError::network(SERVICE, e))?;
        if !resp.status().is_success() {
            return Err(ServiceError::from_response(SERVICE, resp).await);
        }
        Ok(())
    }

    /// Exponential wait before retry `attempt` (1-based), capped like `Retry-After`.
    fn backoff(&self, attempt: u8) -> Duration {
        let factor = 1u32
            .checked_shl(u32::from(attempt.saturating_sub(1)))
            .unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(MAX_RETRY_AFTER)
    }

    /// Send one request. Only 429s are retried: Discord rejected those without
    /// acting, so a retry cannot create a second event.
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: &ScheduledEventBody<'_>,
    ) -> Result<reqwest::Response, ServiceError> {
        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let resp = self
                .client
                .request(method.clone(), url)
                .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
                .header("X-Audit-Log-Reason", &self.audit_reason)
                .json(body)
                .send()
                .await
                .map_err(|e| ServiceError::network(SERVICE, e))?;

            if resp.status().is_success() {
                return Ok(resp);
            }
            let err = ServiceError::from_response(SERVICE, resp).await;
            match err {
                ServiceError::RateLimited { retry_after, .. } if attempt < self.max_retries => {
                    let wait = retry_after.unwrap_or_else(|| self.backoff(attempt));
                    tracing::warn!(attempt, wait_ms = wait.as_millis() as u64, "discord rate limited");
                    tokio::time::sleep(wait).await;
                }
                other => return Err(other),
            }
        }
    }
}

#[async_trait]
impl EventPublisher for DiscordPublisher {
    async fn create(&self, req: &PublishRequest) -> Result<String, ServiceError> {
        let url = format!("{}/guilds/{}/scheduled-events", self.base_url, self.guild_id);
        let body = ScheduledEventBody::from(req);
        let resp = self.send(Method::POST, &url, &body).await?;
        let created: CreatedEvent = resp
            .json()
            .await
            .map_err(|e| ServiceError::decode(SERVICE, e.to_string()))?;
        Ok(created.id)
    }

    async fn update(&self, event_id: &str, req: &PublishRequest) -> Result<(), ServiceError> {
        let url = format!(
            "{}/guilds/{}/scheduled-events/{}",
            self.base_url, self.guild_id, event_id
        );
        let body = ScheduledEventBody::from(req);
        self.send(Method::PATCH, &url, &body).await?;
        Ok(())
    }
}
