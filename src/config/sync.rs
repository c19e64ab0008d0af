// src/config/sync.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf};

pub const ENV_CONFIG_PATH: &str = "SYNC_CONFIG_PATH";
pub const ENV_METRICS_ADDR: &str = "METRICS_ADDR";
const DEFAULT_CONFIG_PATH: &str = "config/sync.toml";

pub const DEFAULT_IMAGE_BASE_URL: &str =
    "https://www.themoviedb.org/t/p/w1920_and_h800_multi_faces";

fn default_interval_secs() -> u64 {
    300
}
fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_request_timeout_secs() -> u64 {
    10
}
fn default_concurrency() -> usize {
    4
}
fn default_store_path() -> PathBuf {
    PathBuf::from("state/sync_state.json")
}
fn default_scratch_dir() -> PathBuf {
    PathBuf::from("tmp")
}
fn default_max_image_bytes() -> u64 {
    8 * 1024 * 1024
}
fn default_audit_reason() -> String {
    "Synced from Notion".to_string()
}
fn default_date_property() -> String {
    "Date".to_string()
}
fn default_host_property() -> String {
    "Host (primary)".to_string()
}
fn default_link_property() -> String {
    "IMDb".to_string()
}
fn default_image_base_url() -> String {
    DEFAULT_IMAGE_BASE_URL.to_string()
}

/// Non-secret knobs. Every field is optional in `config/sync.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tunables {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Records processed at once within a tick.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,
    #[serde(default = "default_audit_reason")]
    pub audit_reason: String,
    #[serde(default = "default_date_property")]
    pub date_property: String,
    #[serde(default = "default_host_property")]
    pub host_property: String,
    #[serde(default = "default_link_property")]
    pub link_property: String,
    #[serde(default = "default_image_base_url")]
    pub image_base_url: String,
    #[serde(default)]
    pub metrics_addr: Option<String>,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            concurrency: default_concurrency(),
            store_path: default_store_path(),
            scratch_dir: default_scratch_dir(),
            max_image_bytes: default_max_image_bytes(),
            audit_reason: default_audit_reason(),
            date_property: default_date_property(),
            host_property: default_host_property(),
            link_property: default_link_property(),
            image_base_url: default_image_base_url(),
            metrics_addr: None,
        }
    }
}

impl Tunables {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading sync config from {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let mut cfg: Tunables = toml::from_str(s)?;
        cfg.sanitize()?;
        Ok(cfg)
    }

    /// 1) $SYNC_CONFIG_PATH (must exist)
    /// 2) config/sync.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
            }
            return Self::load_from_file(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from_file(&default_p);
        }
        Ok(Self::default())
    }

    fn sanitize(&mut self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("interval_secs must be > 0");
        }
        if self.request_timeout_secs == 0 || self.connect_timeout_secs == 0 {
            bail!("timeouts must be > 0");
        }
        // 0 would stall the tick forever
        self.concurrency = self.concurrency.max(1);
        self.image_base_url = self.image_base_url.trim_end_matches('/').to_string();
        Ok(())
    }
}

/// Secrets and target identifiers, read from the environment only.
#[derive(Clone)]
pub struct Credentials {
    pub notion_token: String,
    pub notion_database_id: String,
    pub tmdb_key: String,
    pub discord_token: String,
    pub discord_guild_id: String,
    pub discord_channel_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Only lengths of secrets, never values
        f.debug_struct("Credentials")
            .field("notion_token_len", &self.notion_token.len())
            .field("notion_database_id", &self.notion_database_id)
            .field("tmdb_key_len", &self.tmdb_key.len())
            .field("discord_token_len", &self.discord_token.len())
            .field("discord_guild_id", &self.discord_guild_id)
            .field("discord_channel_id", &self.discord_channel_id)
            .finish()
    }
}

impl Credentials {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Same as `from_env` with a pluggable lookup; reports every missing variable at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing = Vec::new();
        let mut get = |k: &'static str| match lookup(k).map(|v| v.trim().to_string()) {
            Some(v) if !v.is_empty() => v,
            _ => {
                missing.push(k);
                String::new()
            }
        };
        let creds = Self {
            notion_token: get("NOTION_TOKEN"),
            notion_database_id: get("NOTION_DATABASE_ID"),
            tmdb_key: get("TMDB_KEY"),
            discord_token: get("DISCORD_TOKEN"),
            discord_guild_id: get("DISCORD_SERVER_ID"),
            discord_channel_id: get("DISCORD_CINEMA_CHANNEL_ID"),
        };
        if !missing.is_empty() {
            return Err(anyhow!("missing env vars: {}", missing.join(", ")));
        }
        Ok(creds)
    }
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub credentials: Credentials,
    pub tunables: Tunables,
}

impl SyncConfig {
    pub fn load() -> Result<Self> {
        let credentials = Credentials::from_env()?;
        let mut tunables = Tunables::load_default()?;
        if let Ok(addr) = env::var(ENV_METRICS_ADDR) {
            if !addr.trim().is_empty() {
                tunables.metrics_addr = Some(addr.trim().to_string());
            }
        }
        Ok(Self {
            credentials,
            tunables,
        })
    }
}
