use std::str::FromStr;

use anyhow::{bail, Context, Result};

const DEFAULT_ENGINE_URL: &str = "http://localhost:8000/generate_roadmaps";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:5173";

/// Which Profile Store backend the service runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => bail!("PROFILE_STORE must be 'postgres' or 'memory', got '{other}'"),
        }
    }
}

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    /// Only present (and required) for the Postgres backend.
    pub database_url: Option<String>,
    pub engine_url: String,
    pub engine_timeout_secs: u64,
    pub frontend_url: String,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let store_backend: StoreBackend = optional_env("PROFILE_STORE")
            .unwrap_or_else(|| "postgres".to_string())
            .parse()?;

        let database_url = match store_backend {
            StoreBackend::Postgres => Some(require_env("DATABASE_URL")?),
            StoreBackend::Memory => optional_env("DATABASE_URL"),
        };

        let engine_timeout_secs = parse_timeout(
            &optional_env("ENGINE_TIMEOUT_SECS").unwrap_or_else(|| "60".to_string()),
        )?;

        Ok(Config {
            store_backend,
            database_url,
            engine_url: optional_env("ENGINE_URL")
                .unwrap_or_else(|| DEFAULT_ENGINE_URL.to_string()),
            engine_timeout_secs,
            frontend_url: optional_env("FRONTEND_URL")
                .unwrap_or_else(|| DEFAULT_FRONTEND_URL.to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_timeout(raw: &str) -> Result<u64> {
    let secs = raw
        .trim()
        .parse::<u64>()
        .context("ENGINE_TIMEOUT_SECS must be a whole number of seconds")?;
    if secs == 0 {
        bail!("ENGINE_TIMEOUT_SECS must be greater than zero");
    }
    Ok(secs)
}
