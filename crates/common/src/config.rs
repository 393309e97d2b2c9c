//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables to ensure
//! clean separation between code and config. `from_lookup` variants take
//! the variable source as a function so parsing can be tested without
//! touching the process environment.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

/// Largest accepted JWT clock skew, in seconds.
pub const MAX_JWT_LEEWAY: u64 = 86_400;

/// Settings consumed by the authentication middleware.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// URL templates that never require authentication (`AUTH_EXEMPT_TEMPLATES`)
    pub exempt_templates: Vec<String>,
    /// HTTP methods that skip authentication (`AUTH_EXEMPT_METHODS`)
    pub exempt_methods: Vec<String>,
    /// Name under which results are stored in the request context (`AUTH_CONTEXT_ATTR`)
    pub context_attr: String,
    /// Run backends on the blocking pool in async mode (`AUTH_OFFLOAD`)
    pub offload: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            exempt_templates: Vec::new(),
            exempt_methods: vec!["OPTIONS".to_string()],
            context_attr: "auth".to_string(),
            offload: true,
        }
    }
}

impl AuthSettings {
    /// Load middleware settings from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load middleware settings from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let exempt_templates = lookup("AUTH_EXEMPT_TEMPLATES")
            .map(|v| split_list(&v))
            .unwrap_or(defaults.exempt_templates);
        let exempt_methods = lookup("AUTH_EXEMPT_METHODS")
            .map(|v| split_list(&v))
            .unwrap_or(defaults.exempt_methods);
        let context_attr = match lookup("AUTH_CONTEXT_ATTR") {
            Some(attr) if attr.trim().is_empty() => {
                anyhow::bail!("AUTH_CONTEXT_ATTR cannot be empty")
            }
            Some(attr) => attr.trim().to_string(),
            None => defaults.context_attr,
        };
        let offload = match lookup("AUTH_OFFLOAD") {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| anyhow::anyhow!("AUTH_OFFLOAD must be a boolean, got {v:?}"))?,
            None => defaults.offload,
        };

        Ok(Self {
            exempt_templates,
            exempt_methods,
            context_attr,
            offload,
        })
    }
}

/// Runtime configuration of the demo server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Middleware settings
    pub auth: AuthSettings,

    /// HMAC secret for bearer tokens; the JWT backend is disabled when unset
    pub jwt_secret: Option<String>,
    pub jwt_issuer: Option<String>,
    pub jwt_audience: Option<String>,
    pub jwt_leeway: u64,

    /// Credentials accepted by the Basic backend of the demo
    pub demo_username: String,
    pub demo_password: String,

    /// API keys as `name=hex(salt):hex(sha256(key || salt))`, comma separated
    pub api_keys: Vec<(String, String)>,

    /// Runtime configuration
    pub rust_log: String,
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let auth = AuthSettings::from_lookup(&lookup)?;

        let api_keys = lookup("API_KEYS")
            .map(|v| {
                split_list(&v)
                    .into_iter()
                    .map(|entry| {
                        entry
                            .split_once('=')
                            .map(|(name, hash)| (name.to_string(), hash.to_string()))
                            .ok_or_else(|| {
                                anyhow::anyhow!("API_KEYS entry {entry:?} must be name=hash")
                            })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        let config = Self {
            auth,
            jwt_secret: lookup("JWT_SECRET").filter(|s| !s.is_empty()),
            jwt_issuer: lookup("JWT_ISSUER"),
            jwt_audience: lookup("JWT_AUDIENCE"),
            jwt_leeway: parse_leeway(lookup("JWT_LEEWAY"))?,

            demo_username: lookup("DEMO_USERNAME").unwrap_or_else(|| "demo".to_string()),
            demo_password: lookup("DEMO_PASSWORD")
                .ok_or_else(|| anyhow::anyhow!("DEMO_PASSWORD is required"))?,

            api_keys,

            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "warden=debug".to_string()),
            port: lookup("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .unwrap_or(3000),
        };

        if config.jwt_secret.is_none() {
            tracing::info!("JWT_SECRET not set, bearer token authentication disabled");
        }

        Ok(config)
    }
}

fn parse_leeway(value: Option<String>) -> Result<u64> {
    let Some(value) = value else {
        return Ok(0);
    };
    let leeway: u64 = value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("JWT_LEEWAY must be a number of seconds: {e}"))?;
    if leeway > MAX_JWT_LEEWAY {
        anyhow::bail!("JWT_LEEWAY cannot exceed {MAX_JWT_LEEWAY} seconds, got {leeway}");
    }
    Ok(leeway)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
