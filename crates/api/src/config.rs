use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use adgen_providers::ProviderConfig;
use axum::http::HeaderValue;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be set when PROVIDER_MODE=http")]
    Missing { var: &'static str },

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Where generation requests go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderMode {
    /// Real provider over HTTP; results arrive on the callback route.
    Http,
    /// In-process scripted provider that succeeds immediately.
    Simulated,
}

impl FromStr for ProviderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(ProviderMode::Http),
            "simulated" => Ok(ProviderMode::Simulated),
            _ => Err("expected 'http' or 'simulated'".into()),
        }
    }
}

impl fmt::Display for ProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderMode::Http => "http",
            ProviderMode::Simulated => "simulated",
        })
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: IpAddr,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// PostgreSQL URL. Without one, jobs live in memory.
    pub database_url: Option<String>,
    pub provider_mode: ProviderMode,
    pub provider: ProviderConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `HOST`                  | `0.0.0.0`                |
    /// | `PORT`                  | `3000`                   |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`  |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                     |
    /// | `DATABASE_URL`          | unset (in-memory store)  |
    /// | `PROVIDER_MODE`         | `simulated`              |
    /// | `PROVIDER_BASE_URL`     | required in `http` mode  |
    /// | `PROVIDER_API_KEY`      | required in `http` mode  |
    /// | `CALLBACK_BASE_ADDRESS` | `http://localhost:3000`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = parse_or("HOST", var("HOST"), IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port = parse_or("PORT", var("PORT"), 3000u16)?;
        let request_timeout_secs = parse_or("REQUEST_TIMEOUT_SECS", var("REQUEST_TIMEOUT_SECS"), 30u64)?;
        let provider_mode = parse_or("PROVIDER_MODE", var("PROVIDER_MODE"), ProviderMode::Simulated)?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        for origin in &cors_origins {
            if let Err(e) = origin.parse::<HeaderValue>() {
                return Err(ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    value: origin.clone(),
                    reason: e.to_string(),
                });
            }
        }

        let (provider_base_url, api_key) = match provider_mode {
            ProviderMode::Http => (
                var("PROVIDER_BASE_URL").ok_or(ConfigError::Missing {
                    var: "PROVIDER_BASE_URL",
                })?,
                var("PROVIDER_API_KEY").ok_or(ConfigError::Missing {
                    var: "PROVIDER_API_KEY",
                })?,
            ),
            ProviderMode::Simulated => (
                var("PROVIDER_BASE_URL").unwrap_or_default(),
                var("PROVIDER_API_KEY").unwrap_or_default(),
            ),
        };

        let callback_base_address =
            var("CALLBACK_BASE_ADDRESS").unwrap_or_else(|| "http://localhost:3000".into());
        if !callback_base_address.starts_with("http://") && !callback_base_address.starts_with("https://") {
            return Err(ConfigError::Invalid {
                var: "CALLBACK_BASE_ADDRESS",
                value: callback_base_address,
                reason: "must be an http(s) URL".into(),
            });
        }

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            database_url: var("DATABASE_URL"),
            provider_mode,
            provider: ProviderConfig {
                provider_base_url,
                api_key,
                callback_base_address,
            },
        })
    }
}

fn parse_or<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}
