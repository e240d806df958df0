use anyhow::Context;
use serde::Deserialize;

/// Longest cookie lifetime accepted; browsers cap `Max-Age` at 400 days anyway.
pub const MAX_SESSION_TTL_SECONDS: i64 = 400 * 24 * 60 * 60;

/// Authorization knobs for routes whose gating differs between deployments.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    pub change_password_requires_session: bool,
    pub user_list_public: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            change_password_requires_session: true,
            user_list_public: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_seconds: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sessionToken".into(),
            ttl_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub secret: String,
    pub session: SessionConfig,
    pub policy: PolicyConfig,
}

impl AppConfig {
    /// Reads the process environment. Missing required values and set-but-malformed
    /// optional values are both errors; only unset optional values get defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;
        let secret =
            std::env::var("AUTH_SECRET").context("AUTH_SECRET environment variable is required")?;
        if secret.is_empty() {
            anyhow::bail!("AUTH_SECRET must not be empty");
        }

        let ttl_seconds = env_parse("SESSION_TTL_SECONDS")?.unwrap_or(600);
        if !(1..=MAX_SESSION_TTL_SECONDS).contains(&ttl_seconds) {
            anyhow::bail!(
                "SESSION_TTL_SECONDS must be between 1 and {}",
                MAX_SESSION_TTL_SECONDS
            );
        }
        let session = SessionConfig {
            ttl_seconds,
            ..SessionConfig::default()
        };
        let policy = PolicyConfig {
            change_password_requires_session: env_parse("CHANGE_PASSWORD_REQUIRES_SESSION")?
                .unwrap_or(true),
            user_list_public: env_parse("USER_LIST_PUBLIC")?.unwrap_or(false),
        };

        Ok(Self {
            database_url,
            db_max_connections: env_parse("DB_MAX_CONNECTIONS")?.unwrap_or(10),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_parse("APP_PORT")?.unwrap_or(3000),
            secret,
            session,
            policy,
        })
    }
}

/// `Ok(None)` when unset, an error when set but unparseable.
fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => v
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("invalid value for {}: {:?}", key, v)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(e).context(key.to_string()),
    }
}
