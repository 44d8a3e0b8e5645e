//! Process configuration, collected once at startup.
//! Required fields fail fast with a contextual error instead of surfacing as
//! per-request 500s.

use std::fmt;

use anyhow::{bail, Context, Result};
use reqwest::Url;

#[derive(Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    /// Secret the sealed-cookie key is derived from.
    pub session_secret: String,
    pub redirect_uri: String,
    pub frontend_url: String,
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
    /// Master sheet holding one row per assessment submission.
    pub sheet_id: String,
    pub http_port: u16,
    pub cookie_secure: bool,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let required = |key: &str| -> Result<String> {
            match get(key) {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => bail!("{key} is not set in the environment"),
            }
        };
        let or_default = |key: &str, default: &str| -> String {
            get(key).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
        };

        let config = Config {
            client_id: required("SMARTSHEET_CLIENT_ID")?,
            client_secret: required("SMARTSHEET_CLIENT_SECRET")?,
            session_secret: required("SESSION_SECRET_KEY")?,
            sheet_id: required("SMARTSHEET_SHEET_ID")?,
            redirect_uri: or_default("COMPASS_REDIRECT_URI", "http://localhost:8000/api/callback"),
            frontend_url: or_default("COMPASS_FRONTEND_URL", "http://localhost:5173")
                .trim_end_matches('/')
                .to_string(),
            authorize_url: or_default("SMARTSHEET_AUTHORIZE_URL", "https://app.smartsheet.com/b/authorize"),
            token_url: or_default("SMARTSHEET_TOKEN_URL", "https://api.smartsheet.com/2.0/token"),
            api_base_url: or_default("SMARTSHEET_API_BASE_URL", "https://api.smartsheet.com/2.0")
                .trim_end_matches('/')
                .to_string(),
            http_port: or_default("COMPASS_HTTP_PORT", "8000")
                .parse()
                .context("COMPASS_HTTP_PORT must be a port number")?,
            cookie_secure: parse_flag(&or_default("COMPASS_COOKIE_SECURE", "false")),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        // Key derivation for the sealed cookie needs 32 bytes of material.
        if self.session_secret.len() < 32 {
            bail!("SESSION_SECRET_KEY must be at least 32 bytes long");
        }
        for (name, value) in [
            ("COMPASS_REDIRECT_URI", &self.redirect_uri),
            ("COMPASS_FRONTEND_URL", &self.frontend_url),
            ("SMARTSHEET_AUTHORIZE_URL", &self.authorize_url),
            ("SMARTSHEET_TOKEN_URL", &self.token_url),
            ("SMARTSHEET_API_BASE_URL", &self.api_base_url),
        ] {
            Url::parse(value).with_context(|| format!("{name} is not a valid URL: {value}"))?;
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
}

// Keep secrets out of logs; everything else is fair game for the startup banner.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("session_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("frontend_url", &self.frontend_url)
            .field("authorize_url", &self.authorize_url)
            .field("token_url", &self.token_url)
            .field("api_base_url", &self.api_base_url)
            .field("sheet_id", &self.sheet_id)
            .field("http_port", &self.http_port)
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}
