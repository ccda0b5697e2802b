use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Runtime settings, read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub ws_url: String,
    pub ws_token: Option<String>,
    pub store_path: PathBuf,
    pub purge_on_failure: bool,
    pub http_timeout: Option<Duration>,
    /// Username (or email) and password tried when no stored session works.
    pub credentials: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup("JUKEBOX_API_URL").unwrap_or_else(|| "http://localhost:8080".into());
        let api_url = api_url.trim_end_matches('/').to_string();

        let ws_url = lookup("JUKEBOX_WS_URL").unwrap_or_else(|| {
            format!(
                "{}/chat/ws",
                api_url.replace("http://", "ws://").replace("https://", "wss://")
            )
        });

        let store_path = lookup("JUKEBOX_STORE_PATH").unwrap_or_else(|| "jukebox-client.db".into());

        let purge_on_failure = match lookup("JUKEBOX_PURGE_ON_FAILURE") {
            Some(raw) => raw
                .parse::<bool>()
                .with_context(|| format!("JUKEBOX_PURGE_ON_FAILURE must be true or false, got {:?}", raw))?,
            None => true,
        };

        let http_timeout = lookup("JUKEBOX_HTTP_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>()
                    .with_context(|| format!("JUKEBOX_HTTP_TIMEOUT_SECS must be a number, got {:?}", raw))
            })
            .transpose()?
            .map(Duration::from_secs);

        let credentials = match (lookup("JUKEBOX_USERNAME"), lookup("JUKEBOX_PASSWORD")) {
            (Some(username), Some(password)) => Some((username, password)),
            _ => None,
        };

        Ok(Self {
            api_url,
            ws_url,
            ws_token: lookup("JUKEBOX_WS_TOKEN").filter(|t| !t.is_empty()),
            store_path: PathBuf::from(store_path),
            purge_on_failure,
            http_timeout,
            credentials,
        })
    }
}
