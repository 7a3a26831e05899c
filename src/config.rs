use std::{fmt::Display, str::FromStr, time::Duration};

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;

use crate::validation::{is_valid_email, is_valid_url};

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub call_timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailConfig {
    pub enabled: bool,
    pub api_key: String,
    pub welcome_template_id: i64,
    pub reset_password_template_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirstSuperuser {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub project_name: String,
    pub client_url: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub cors_origins: Vec<String>,
    pub users_open_registration: bool,
    pub first_superuser: FirstSuperuser,
    pub emails: EmailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup, so tests never touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database = DatabaseConfig {
            url: match env.get("DATABASE_URL") {
                Some(url) => url,
                None => format!(
                    "postgres://{}:{}@{}:{}/{}",
                    env.required("DB_USER")?,
                    env.required("DB_PASSWORD")?,
                    env.required("DB_HOST")?,
                    env.parse_or::<u16>("DB_PORT", 5432)?,
                    env.required("DB_NAME")?,
                ),
            },
            max_connections: env.parse_or("DB_MAX_CONNECTIONS", 10)?,
            call_timeout: Duration::from_secs(env.parse_or("DB_CALL_TIMEOUT_SECONDS", 10)?),
        };

        let jwt = JwtConfig {
            secret: env.required("SECRET_KEY")?,
            issuer: env.get("JWT_ISSUER").unwrap_or_else(|| "socialnet".into()),
            audience: env
                .get("JWT_AUDIENCE")
                .unwrap_or_else(|| "socialnet-users".into()),
            // 60 minutes * 24 hours * 8 days
            ttl_minutes: env.parse_or("ACCESS_TOKEN_EXPIRATION_MINUTES", 60 * 24 * 8)?,
            reset_ttl_minutes: env.parse_or("PASSWORD_RESET_TOKEN_EXPIRATION_MINUTES", 15)?,
        };

        let emails = EmailConfig {
            enabled: env.parse_or("EMAILS_ENABLED", false)?,
            api_key: env.get("EMAILS_API_KEY").unwrap_or_default(),
            welcome_template_id: env.parse_or("EMAILS_WELCOME_TEMPLATE_ID", 5)?,
            reset_password_template_id: env.parse_or("EMAILS_RESET_PASSWORD_TEMPLATE_ID", 6)?,
        };

        let config = Self {
            host: env.get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: env.parse_or("APP_PORT", 8080)?,
            project_name: env.get("PROJECT_NAME").unwrap_or_else(|| "socialnet".into()),
            client_url: env.get("CLIENT_URL"),
            database,
            jwt,
            cors_origins: env
                .get("BACKEND_CORS_ORIGINS")
                .map(|raw| parse_origins(&raw))
                .transpose()?
                .unwrap_or_default(),
            users_open_registration: env.parse_or("USERS_OPEN_REGISTRATION", false)?,
            first_superuser: FirstSuperuser {
                email: env.required("FIRST_SUPERUSER")?.trim().to_lowercase(),
                password: env.required("FIRST_SUPERUSER_PASSWORD")?,
            },
            emails,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.jwt.secret.chars().count() < 8 {
            bail!("SECRET_KEY must be at least 8 characters");
        }
        if self.jwt.ttl_minutes <= 0 {
            bail!("ACCESS_TOKEN_EXPIRATION_MINUTES must be positive");
        }
        if self.jwt.reset_ttl_minutes <= 0 {
            bail!("PASSWORD_RESET_TOKEN_EXPIRATION_MINUTES must be positive");
        }
        if self.database.call_timeout.is_zero() {
            bail!("DB_CALL_TIMEOUT_SECONDS must be positive");
        }
        if let Some(url) = &self.client_url {
            if !is_valid_url(url) {
                bail!("CLIENT_URL is not a valid URL: {url}");
            }
        }
        for origin in &self.cors_origins {
            if origin != "*" && !is_valid_url(origin) {
                bail!("BACKEND_CORS_ORIGINS contains an invalid origin: {origin}");
            }
        }
        if !is_valid_email(&self.first_superuser.email) {
            bail!("FIRST_SUPERUSER must be an email address");
        }
        if self.first_superuser.password.chars().count() < 8 {
            bail!("FIRST_SUPERUSER_PASSWORD must be at least 8 characters");
        }
        if self.emails.enabled && self.emails.api_key.is_empty() {
            bail!("EMAILS_API_KEY is required when EMAILS_ENABLED is true");
        }
        Ok(())
    }
}

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, key: &str) -> anyhow::Result<String> {
        self.get(key).ok_or_else(|| anyhow!("{key} is not set"))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> anyhow::Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.get(key) {
            Some(raw) => raw
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow!("{e}"))
                .with_context(|| format!("invalid value for {key}: {raw:?}")),
            None => Ok(default),
        }
    }
}

/// Accepts either a JSON array (`["https://a", "https://b"]`) or a
/// comma separated list.
fn parse_origins(raw: &str) -> anyhow::Result<Vec<String>> {
    let raw = raw.trim();
    let entries: Vec<String> = if raw.starts_with('[') {
        serde_json::from_str(raw).context("BACKEND_CORS_ORIGINS is not a JSON array")?
    } else {
        raw.split(',').map(str::to_string).collect()
    };
    Ok(entries
        .iter()
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .collect())
}
