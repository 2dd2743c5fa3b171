use serde::Deserialize;

/// Outbound e-mail relay (HTTP JSON API) settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailRelayConfig {
    pub url: String,
    pub token: String,
    pub from: String,
}

/// Twilio Messages API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Postgres URL; when absent records are kept in memory.
    pub database_url: Option<String>,
    pub email: Option<EmailRelayConfig>,
    pub sms: Option<SmsConfig>,
    pub verification_cache_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            database_url: None,
            email: None,
            sms: None,
            verification_cache_ttl_secs: 300,
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn validate_http_url(name: &str, value: String) -> anyhow::Result<String> {
    let parsed = url::Url::parse(&value)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(value.trim_end_matches('/').to_string())
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = optional_var("DATABASE_URL")
            .or_else(|| optional_var("DB_URL"))
            .map(|url| {
                if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                    anyhow::bail!("DATABASE_URL must start with postgresql:// or postgres://");
                }
                Ok(url)
            })
            .transpose()?;

        let email = match optional_var("EMAIL_RELAY_URL") {
            Some(url) => Some(EmailRelayConfig {
                url: validate_http_url("EMAIL_RELAY_URL", url)?,
                token: optional_var("EMAIL_RELAY_TOKEN").ok_or_else(|| {
                    anyhow::anyhow!("EMAIL_RELAY_TOKEN is required when EMAIL_RELAY_URL is set")
                })?,
                from: optional_var("EMAIL_FROM").ok_or_else(|| {
                    anyhow::anyhow!("EMAIL_FROM is required when EMAIL_RELAY_URL is set")
                })?,
            }),
            None => None,
        };

        let sms = match (
            optional_var("TWILIO_ACCOUNT_SID"),
            optional_var("TWILIO_AUTH_TOKEN"),
            optional_var("TWILIO_PHONE_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(SmsConfig {
                account_sid,
                auth_token,
                from_number,
                base_url: validate_http_url(
                    "TWILIO_BASE_URL",
                    optional_var("TWILIO_BASE_URL")
                        .unwrap_or_else(|| "https://api.twilio.com".to_string()),
                )?,
            }),
            (None, None, None) => None,
            _ => anyhow::bail!(
                "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN and TWILIO_PHONE_NUMBER must be set together"
            ),
        };

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            database_url,
            email,
            sms,
            verification_cache_ttl_secs: std::env::var("VERIFICATION_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("VERIFICATION_CACHE_TTL_SECS must be a whole number of seconds")
                })?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match config.database_url {
            Some(ref url) => tracing::debug!("Database URL: {}...", &url[..20.min(url.len())]),
            None => tracing::warn!("No DATABASE_URL configured, KYC records will be kept in memory"),
        }
        match config.email {
            Some(ref email) => tracing::debug!("Email relay: {}", email.url),
            None => tracing::warn!("Email relay not configured, email notifications disabled"),
        }
        match config.sms {
            Some(ref sms) => tracing::debug!("SMS gateway: {}", sms.base_url),
            None => tracing::info!("Twilio not configured, SMS notifications disabled"),
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_http_url_trims_trailing_slash() {
        let url = validate_http_url("X", "https://relay.example.com/".to_string()).unwrap();
        assert_eq!(url, "https://relay.example.com");
    }

    #[test]
    fn test_validate_http_url_rejects_other_schemes() {
        assert!(validate_http_url("X", "ftp://relay.example.com".to_string()).is_err());
        assert!(validate_http_url("X", "not a url".to_string()).is_err());
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 8000);
        assert!(config.database_url.is_none());
        assert_eq!(config.verification_cache_ttl_secs, 300);
    }
}
