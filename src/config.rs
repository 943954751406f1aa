use anyhow::{Context, Result};

/// Deployment mode. Controls whether internal error details are echoed back
/// to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "development" | "dev" | "local" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!(
                "{other} is not a supported environment. Use either `development` or `production`"
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string, e.g. "sqlite:./snip.db"
    pub database_url: String,

    /// HMAC secret used to sign and verify bearer tokens
    pub jwt_secret: String,

    /// Host to bind the HTTP server to, e.g. "0.0.0.0"
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Public base URL used when building `shortUrl` values.
    /// Never has a trailing slash.
    pub base_url: String,

    /// Origin allowed by the CORS layer (the frontend).
    pub frontend_url: String,

    pub environment: Environment,

    /// How many days an issued token remains valid
    pub token_ttl_days: i64,
}

impl AppConfig {
    /// Load configuration from environment variables (populated by dotenvy before this is called).
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET must be set in the environment or .env file")?;

        if jwt_secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "5000".into())
            .parse::<u16>()
            .context("PORT must be a valid port number (1–65535)")?;

        let token_ttl_days = std::env::var("TOKEN_TTL_DAYS")
            .unwrap_or_else(|_| "7".into())
            .parse::<i64>()
            .context("TOKEN_TTL_DAYS must be a whole number of days")?;

        if token_ttl_days <= 0 {
            anyhow::bail!("TOKEN_TTL_DAYS must be positive");
        }

        let environment = Environment::try_from(
            std::env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
        )
        .map_err(anyhow::Error::msg)
        .context("Failed to parse APP_ENV")?;

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_owned();

        let frontend_url = std::env::var("FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./snip.db".into()),
            jwt_secret,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            base_url,
            frontend_url,
            environment,
            token_ttl_days,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Absolute short URL for a code, e.g. "https://sn.ip/Ab12Cd".
    pub fn short_url(&self, short_code: &str) -> String {
        format!("{}/{}", self.base_url, short_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_parses_known_names() {
        assert_eq!(
            Environment::try_from("Production".to_string()),
            Ok(Environment::Production)
        );
        assert_eq!(
            Environment::try_from(" development ".to_string()),
            Ok(Environment::Development)
        );
        assert!(Environment::try_from("staging".to_string()).is_err());
    }

    #[test]
    fn only_production_is_production() {
        assert!(Environment::Production.is_production());
        assert!(!Environment::Development.is_production());
        assert_eq!(Environment::Production.as_str(), "production");
    }

    #[test]
    fn short_url_joins_base_and_code() {
        let config = crate::test_utils::test_config();
        assert_eq!(config.short_url("Ab12Cd"), "http://localhost:5000/Ab12Cd");
    }
}
