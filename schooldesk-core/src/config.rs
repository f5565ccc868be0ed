use anyhow::{anyhow, Context};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// | Env Var                    | Required | Default   |
/// |----------------------------|----------|-----------|
/// | `SERVER_HOST`              | no       | `0.0.0.0` |
/// | `SERVER_PORT`              | no       | `3000`    |
/// | `DATABASE_URL`             | **yes**  |           |
/// | `DATABASE_MAX_CONNECTIONS` | no       | `10`      |
/// | `JWT_SECRET`               | **yes**  |           |
/// | `JWT_EXPIRY_HOURS`         | no       | `24`      |
/// | `CORS_ORIGINS`             | no       | `*`       |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// Allowed CORS origins; `["*"]` allows any origin.
    pub cors_origins: Vec<String>,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow!("{key} must be set"))
        };

        let port = var("SERVER_PORT", "3000")
            .parse::<u16>()
            .context("Invalid SERVER_PORT")?;
        let max_connections = var("DATABASE_MAX_CONNECTIONS", "10")
            .parse::<u32>()
            .context("Invalid DATABASE_MAX_CONNECTIONS")?;
        let expiry_hours = var("JWT_EXPIRY_HOURS", "24")
            .parse::<i64>()
            .context("Invalid JWT_EXPIRY_HOURS")?;
        if expiry_hours <= 0 {
            return Err(anyhow!("JWT_EXPIRY_HOURS must be positive"));
        }

        let cors_origins = var("CORS_ORIGINS", "*")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: var("SERVER_HOST", "0.0.0.0"),
            port,
            database_url: required("DATABASE_URL")?,
            max_connections,
            cors_origins,
            jwt: JwtConfig {
                secret: required("JWT_SECRET")?,
                expiry_hours,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
