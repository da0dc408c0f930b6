use std::str::FromStr;

use serde::Deserialize;

/// Controls how much error detail reaches the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => anyhow::bail!("unknown APP_ENV {other:?}"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub cookie_ttl_days: i64,
}

/// Argon2 work factor. Raising these makes every login slower on purpose.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct HashCost {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashCost {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub environment: Environment,
    pub jwt: JwtConfig,
    pub password_hash: HashCost,
    pub smtp: Option<SmtpConfig>,
    pub stripe_secret_key: Option<String>,
    /// `scheme://host` of the deployment, used for links in mails and
    /// checkout redirects. Never taken from request headers.
    pub public_base_url: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let environment = match std::env::var("APP_ENV") {
            Ok(v) => v.parse()?,
            Err(_) => Environment::Development,
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "natours".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "natours-users".into()),
            ttl_minutes: env_or("JWT_TTL_MINUTES", 60 * 24 * 90),
            cookie_ttl_days: env_or("JWT_COOKIE_TTL_DAYS", 90),
        };
        let defaults = HashCost::default();
        let password_hash = HashCost {
            memory_kib: env_or("PASSWORD_HASH_MEMORY_KIB", defaults.memory_kib),
            iterations: env_or("PASSWORD_HASH_ITERATIONS", defaults.iterations),
            parallelism: env_or("PASSWORD_HASH_PARALLELISM", defaults.parallelism),
        };
        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: env_or("SMTP_PORT", 587),
                username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
                password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
                from: std::env::var("EMAIL_FROM")
                    .unwrap_or_else(|_| "Natours <hello@natours.io>".into()),
            }),
            Err(_) => None,
        };

        Ok(Self {
            database_url,
            max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10),
            environment,
            jwt,
            password_hash,
            smtp,
            stripe_secret_key: std::env::var("STRIPE_SECRET_KEY").ok(),
            public_base_url: public_base_url(std::env::var("PUBLIC_BASE_URL").ok()),
        })
    }
}

fn public_base_url(raw: Option<String>) -> String {
    match raw.map(|v| v.trim().trim_end_matches('/').to_string()) {
        Some(url) if !url.is_empty() => url,
        _ => format!("http://localhost:{}", env_or("APP_PORT", 8080u16)),
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_environment_names() {
        assert_eq!("production".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!(" Dev ".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn public_base_url_drops_trailing_slash() {
        assert_eq!(
            public_base_url(Some(" https://natours.dev/ ".into())),
            "https://natours.dev"
        );
        assert!(public_base_url(None).starts_with("http://localhost:"));
    }

    #[test]
    fn default_hash_cost_matches_argon2_defaults() {
        let cost = HashCost::default();
        assert_eq!(cost.memory_kib, argon2::Params::DEFAULT_M_COST);
        assert_eq!(cost.iterations, argon2::Params::DEFAULT_T_COST);
    }
}
