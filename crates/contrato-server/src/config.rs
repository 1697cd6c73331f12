//! Server configuration loaded from environment variables.
//!
//! Everything has a default so a local instance starts with no `.env` at all.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Placeholder JWT secrets that must not reach production.
pub const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

const DEFAULT_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Env: `CONTRATO_HOST`, default `0.0.0.0`
    pub host: String,
    /// Env: `CONTRATO_PORT`, default `3000`
    pub port: u16,
    /// Env: `CONTRATO_DB_PATH`, default `contrato.db`
    pub db_path: PathBuf,
    /// Env: `CONTRATO_JWT_SECRET`
    pub jwt_secret: String,
    /// Dashboard link placed in outgoing emails.
    /// Env: `CONTRATO_PUBLIC_URL`, default `http://localhost:{port}`
    pub public_url: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("CONTRATO_PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("Invalid CONTRATO_PORT: {raw}"))?,
            None => 3000,
        };

        Ok(Self {
            host: get("CONTRATO_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: get("CONTRATO_DB_PATH").unwrap_or_else(|| "contrato.db".into()).into(),
            jwt_secret: get("CONTRATO_JWT_SECRET").unwrap_or_else(|| DEFAULT_SECRET.into()),
            public_url: get("CONTRATO_PUBLIC_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{port}")),
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }

    pub fn uses_placeholder_secret(&self) -> bool {
        PLACEHOLDER_SECRETS.contains(&self.jwt_secret.as_str())
    }
}
