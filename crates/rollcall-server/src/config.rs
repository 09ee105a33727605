use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use tracing::info;

use rollcall_pass::render::{DEFAULT_BASE_URL, DEFAULT_SIZE_PX};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
    "secret",
];

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub qr_base_url: String,
    pub qr_size: u32,
    pub admin: Option<AdminBootstrap>,
}

/// Credentials for the account created on first start.
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = var("ROLLCALL_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("ROLLCALL_JWT_SECRET is unset or still a placeholder; set it in your .env file and restart");
        }

        let token_ttl_hours: i64 = parse_or(&var, "ROLLCALL_TOKEN_TTL_HOURS", 72)?;
        if token_ttl_hours <= 0 {
            bail!("ROLLCALL_TOKEN_TTL_HOURS must be positive");
        }

        let admin = match (var("ROLLCALL_ADMIN_EMAIL"), var("ROLLCALL_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password,
                name: var("ROLLCALL_ADMIN_NAME").unwrap_or_else(|| "Administrator".into()),
            }),
            (Some(_), None) | (None, Some(_)) => {
                bail!("ROLLCALL_ADMIN_EMAIL and ROLLCALL_ADMIN_PASSWORD must be set together")
            }
            (None, None) => None,
        };

        Ok(Self {
            host: var("ROLLCALL_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&var, "ROLLCALL_PORT", 3000)?,
            db_path: var("ROLLCALL_DB_PATH")
                .unwrap_or_else(|| "rollcall.db".into())
                .into(),
            jwt_secret,
            token_ttl_hours,
            qr_base_url: var("ROLLCALL_QR_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            qr_size: parse_or(&var, "ROLLCALL_QR_SIZE", DEFAULT_SIZE_PX)?,
            admin,
        })
    }
}

fn parse_or<T, V>(var: &V, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: std::error::Error + Send + Sync + 'static,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid {key} value '{raw}'")),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}
