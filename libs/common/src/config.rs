//! Layered application configuration
//!
//! Values are resolved in this order, later sources overriding earlier ones:
//! built-in defaults, `config/default.yaml` (optional), the file named by
//! `APP_CONFIG_FILE` (optional), and finally `APP__SECTION__KEY` environment
//! variables. Durations are expressed in whole seconds.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Environment variable naming an extra configuration file
pub const CONFIG_FILE_ENV: &str = "APP_CONFIG_FILE";

/// Root configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub oidc: OidcSettings,
    pub orders: OrderSettings,
    pub log: LogSettings,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// HTTP listen port
    pub rest_port: u16,
    /// Graceful drain deadline in seconds
    pub shutdown_timeout: u64,
    /// Per-request deadline in seconds
    pub request_timeout: u64,
}

/// Relational store settings
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Pool acquire timeout in seconds
    pub connection_timeout: u64,
}

/// Local token issuer settings
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret for access tokens
    pub jwt_secret: String,
    /// Access token lifetime in seconds
    pub jwt_expiry: u64,
    /// HMAC secret for refresh tokens
    pub jwt_refresh_secret: String,
    /// Refresh token lifetime in seconds
    pub jwt_refresh_expiry: u64,
    /// Login attempts allowed per window
    pub login_max_attempts: u32,
    /// Login attempt window in seconds
    pub login_window: u64,
    /// Ban duration in seconds once the window is exhausted
    pub login_ban: u64,
}

/// OpenID Connect client settings
#[derive(Debug, Clone, Deserialize)]
pub struct OidcSettings {
    pub enabled: bool,
    pub provider_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
}

/// How order numbers are allocated when two orders land in the same second
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderNumberStrategy {
    /// `ORD-<secs>`, then `ORD-<secs>-1`, `ORD-<secs>-2`, ... on collision
    #[default]
    Suffix,
    /// Strictly increasing seconds clock shared by the whole process
    Monotonic,
}

/// Order engine settings
#[derive(Debug, Clone, Deserialize)]
pub struct OrderSettings {
    pub number_strategy: OrderNumberStrategy,
}

/// Logging settings
#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Settings {
    /// Load settings from defaults, optional files and the environment
    pub fn load() -> Result<Self, ConfigError> {
        let extra_file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::load_from(extra_file.as_deref())
    }

    /// Load settings, layering `path` (if any) above `config/default.yaml`
    pub fn load_from(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("server.rest_port", 8080)?
            .set_default("server.shutdown_timeout", 30)?
            .set_default("server.request_timeout", 30)?
            .set_default("database.host", "localhost")?
            .set_default("database.port", 5432)?
            .set_default("database.user", "postgres")?
            .set_default("database.password", "postgres")?
            .set_default("database.dbname", "storefront")?
            .set_default("database.sslmode", "disable")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.connection_timeout", 30)?
            .set_default("auth.jwt_secret", "")?
            .set_default("auth.jwt_expiry", 900)?
            .set_default("auth.jwt_refresh_secret", "")?
            .set_default("auth.jwt_refresh_expiry", 604_800)?
            .set_default("auth.login_max_attempts", 5)?
            .set_default("auth.login_window", 300)?
            .set_default("auth.login_ban", 3600)?
            .set_default("oidc.enabled", false)?
            .set_default("oidc.provider_url", "")?
            .set_default("oidc.client_id", "")?
            .set_default("oidc.client_secret", "")?
            .set_default("oidc.redirect_url", "")?
            .set_default("oidc.scopes", vec!["openid", "profile", "email"])?
            .set_default("orders.number_strategy", "suffix")?
            .set_default("log.level", "info")?
            .add_source(File::with_name("config/default").required(false));

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("oidc.scopes")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
