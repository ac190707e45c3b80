//! Runtime configuration, read from the environment.

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_TENANT_HEADER: &str = "x-tenant-id";
pub const DEFAULT_AUDIT_RETENTION: usize = 1024;
const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    /// Postgres document store when set, in-memory otherwise.
    pub database_url: Option<String>,
    pub tenant_header: HeaderName,
    pub audit_retention: usize,
    /// Email of an OWNER account created at startup if missing.
    pub bootstrap_owner_email: Option<String>,
}

impl ApiConfig {
    /// In-memory defaults with the given signing secret.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            database_url: None,
            tenant_header: HeaderName::from_static(DEFAULT_TENANT_HEADER),
            audit_retention: DEFAULT_AUDIT_RETENTION,
            bootstrap_owner_email: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (the environment in production).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| get(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = non_empty("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });

        let bind_addr = non_empty("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let tenant_header = match non_empty("TENANT_HEADER") {
            Some(h) => HeaderName::try_from(h.to_ascii_lowercase()).map_err(|e| ConfigError::Invalid {
                name: "TENANT_HEADER",
                reason: e.to_string(),
            })?,
            None => HeaderName::from_static(DEFAULT_TENANT_HEADER),
        };

        let audit_retention = match non_empty("AUDIT_RETENTION") {
            Some(v) => v.parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                name: "AUDIT_RETENTION",
                reason: e.to_string(),
            })?,
            None => DEFAULT_AUDIT_RETENTION,
        };

        Ok(Self {
            jwt_secret,
            bind_addr,
            database_url: non_empty("DATABASE_URL"),
            tenant_header,
            audit_retention,
            bootstrap_owner_email: non_empty("BOOTSTRAP_OWNER_EMAIL"),
        })
    }
}
