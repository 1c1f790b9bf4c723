use std::env;
use std::time::Duration;
use anyhow::{Context, Result};

use crate::error::ConfigurationGap;

pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub environment: Environment,
    pub backend: StoreBackend,
    pub database: Option<DatabaseConfig>,
    pub connection_env: ConnectionEnv,
    pub gaps: Vec<ConfigurationGap>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub name: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
}

/// Which connection variables were present at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionEnv {
    pub database_url: bool,
    pub database_name: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Local,
    Production,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any variable source.
    ///
    /// Missing connection variables are recorded as gaps instead of failing;
    /// malformed values still fail.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            None => DEFAULT_PORT,
        };
        if port == 0 {
            anyhow::bail!("PORT must be greater than 0");
        }

        let environment = match lookup("ENV").as_deref().unwrap_or("local") {
            "production" | "prod" => Environment::Production,
            _ => Environment::Local,
        };

        let backend = match lookup("STORE_BACKEND").as_deref().unwrap_or("postgres") {
            "postgres" | "postgresql" => StoreBackend::Postgres,
            "memory" => StoreBackend::Memory,
            other => anyhow::bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{}'", other),
        };

        if backend == StoreBackend::Memory && environment.is_production() {
            anyhow::bail!("STORE_BACKEND=memory is not allowed in production");
        }

        let url = non_empty(lookup("DATABASE_URL"));
        let name = non_empty(lookup("DATABASE_NAME"));

        let connection_env = ConnectionEnv {
            database_url: url.is_some(),
            database_name: name.is_some(),
        };

        let mut gaps = Vec::new();
        if url.is_none() {
            gaps.push(ConfigurationGap { variable: "DATABASE_URL" });
        }
        if name.is_none() {
            gaps.push(ConfigurationGap { variable: "DATABASE_NAME" });
        }

        let database = match url {
            Some(url) => {
                let database = DatabaseConfig::from_lookup(url, name, &lookup)?;
                database.validate()?;
                Some(database)
            }
            None => None,
        };

        Ok(Config {
            port,
            environment,
            backend,
            database,
            connection_env,
            gaps,
        })
    }
}

impl DatabaseConfig {
    fn from_lookup<F>(url: String, name: Option<String>, lookup: &F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let ssl_mode = lookup("DATABASE_SSL_MODE").unwrap_or_else(|| "prefer".to_string());

        let max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse::<u32>()
            .context("DATABASE_MAX_CONNECTIONS must be a valid number")?;

        let connection_timeout_secs = lookup("DATABASE_CONNECTION_TIMEOUT")
            .unwrap_or_else(|| "30".to_string())
            .parse::<u64>()
            .context("DATABASE_CONNECTION_TIMEOUT must be a valid number of seconds")?;

        Ok(DatabaseConfig {
            url,
            name,
            ssl_mode,
            max_connections,
            connection_timeout: Duration::from_secs(connection_timeout_secs),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.url.starts_with("postgresql://") && !self.url.starts_with("postgres://") {
            anyhow::bail!("DATABASE_URL must start with 'postgresql://' or 'postgres://'");
        }

        match self.ssl_mode.as_str() {
            "disable" | "prefer" | "require" => {}
            _ => anyhow::bail!("Invalid SSL mode. Must be one of: disable, prefer, require"),
        }

        if self.max_connections == 0 {
            anyhow::bail!("Max connections must be greater than 0");
        }

        if self.connection_timeout.as_secs() == 0 {
            anyhow::bail!("Connection timeout must be greater than 0");
        }

        Ok(())
    }

    /// Host part of the connection string, for logging without credentials.
    pub fn host(&self) -> String {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "<unknown>".to_string())
    }
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
