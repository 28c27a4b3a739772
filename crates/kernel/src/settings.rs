use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "THEBOOK_ENV";
const CONFIG_DIR_ENV: &str = "THEBOOK_CONFIG_DIR";
const ENV_PREFIX: &str = "THEBOOK";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub pagination: PaginationSettings,
    #[serde(default)]
    pub media: MediaSettings,
    #[serde(default)]
    pub books: BookSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            // Default to the working directory's `config` folder.
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        Self::load_from(&config_dir, &environment)
    }

    /// Load configuration from an explicit directory and environment name.
    pub fn load_from(config_dir: &std::path::Path, environment: &str) -> anyhow::Result<Self> {
        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = match environment {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        if settings.pagination.page_size == 0 {
            return Err(anyhow!("pagination.page_size must be at least 1"));
        }

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// Record store bootstrap. The store itself lives in memory; fixtures seed it.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseSettings {
    #[serde(default)]
    pub fixtures: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "TelemetrySettings::default_log_filter")]
    pub log_filter: String,
}

impl TelemetrySettings {
    fn default_log_filter() -> String {
        "info,tower_http=info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            log_filter: Self::default_log_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// Where anonymous visitors are sent, with `next` appended.
    #[serde(default = "AuthSettings::default_login_url")]
    pub login_url: String,
    /// Mount the username-only login form under `/auth/`.
    #[serde(default)]
    pub dev_login: bool,
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "AuthSettings::default_session_ttl_minutes")]
    pub session_ttl_minutes: i64,
}

impl AuthSettings {
    fn default_login_url() -> String {
        "/auth/login/".to_string()
    }

    fn default_session_ttl_minutes() -> i64 {
        60 * 24 * 14
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_url: Self::default_login_url(),
            dev_login: false,
            secure_cookies: false,
            session_ttl_minutes: Self::default_session_ttl_minutes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationSettings {
    #[serde(default = "PaginationSettings::default_page_size")]
    pub page_size: usize,
}

impl PaginationSettings {
    fn default_page_size() -> usize {
        10
    }
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            page_size: Self::default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    #[serde(default = "MediaSettings::default_root")]
    pub root: String,
    #[serde(default = "MediaSettings::default_url_prefix")]
    pub url_prefix: String,
    #[serde(default = "MediaSettings::default_upload_dir")]
    pub upload_dir: String,
    #[serde(default = "MediaSettings::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl MediaSettings {
    fn default_root() -> String {
        "media".to_string()
    }

    fn default_url_prefix() -> String {
        "/media".to_string()
    }

    fn default_upload_dir() -> String {
        "posts".to_string()
    }

    fn default_max_upload_bytes() -> usize {
        5 * 1024 * 1024
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            url_prefix: Self::default_url_prefix(),
            upload_dir: Self::default_upload_dir(),
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}

/// Who may edit an existing book.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookEditPolicy {
    /// Any signed-in user may edit any book.
    #[default]
    AnyAuthenticated,
    /// Only the user who created the book may edit it.
    CreatorOnly,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BookSettings {
    #[serde(default)]
    pub edit_policy: BookEditPolicy,
}
