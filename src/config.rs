use std::{net::SocketAddr, str::FromStr, time::Duration};

use tracing::Level;
use url::Url;

use crate::error::ConfigError;
use crate::generation::{OpenAiSettings, DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT};

#[derive(Debug, Clone)]
pub struct Config {
    pub teloxide_token: String,
    pub database_url: String,
    pub log_level: Level,
    pub openai: OpenAiSettings,
    pub webhook: Option<WebhookSettings>,
}

/// Set only when both `NGROK_URL` and `NGROK_ADDR` are present.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub url: Url,
    pub addr: SocketAddr,
}

impl Config {
    /// Reads `.env` (if any) and then the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let required = |key: &'static str| var(key).ok_or(ConfigError::Missing(key));

        let teloxide_token = required("TELOXIDE_TOKEN")?;
        let database_url = required("DATABASE_URL")?;

        let log_level = match var("LOG_LEVEL") {
            Some(level) => parse("LOG_LEVEL", level)?,
            None => Level::INFO,
        };

        let endpoint = match var("OPENAI_ENDPOINT") {
            Some(endpoint) => parse("OPENAI_ENDPOINT", endpoint)?,
            None => parse("OPENAI_ENDPOINT", DEFAULT_ENDPOINT.to_owned())?,
        };
        let timeout = match var("GENERATION_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(parse("GENERATION_TIMEOUT_SECS", secs)?),
            None => DEFAULT_TIMEOUT,
        };
        let openai = OpenAiSettings {
            api_key: var("OPENAI_API_KEY"),
            model: var("OPENAI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
            endpoint,
            timeout,
        };

        let webhook = match (var("NGROK_URL"), var("NGROK_ADDR")) {
            (Some(url), Some(addr)) => Some(WebhookSettings {
                url: parse("NGROK_URL", url)?,
                addr: parse("NGROK_ADDR", addr)?,
            }),
            _ => None,
        };

        Ok(Self {
            teloxide_token,
            database_url,
            log_level,
            openai,
            webhook,
        })
    }
}

fn parse<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key,
        reason: err.to_string(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn minimal_environment_uses_defaults() {
        let config =
            Config::from_lookup(lookup(&[("TELOXIDE_TOKEN", "t"), ("DATABASE_URL", "postgres://db")]))
                .unwrap();

        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.openai.api_key, None);
        assert_eq!(config.openai.model, DEFAULT_MODEL);
        assert_eq!(config.openai.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(config.openai.timeout, DEFAULT_TIMEOUT);
        assert!(config.webhook.is_none());
    }

    #[test]
    fn missing_token_is_reported_by_name() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://db")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("TELOXIDE_TOKEN"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("TELOXIDE_TOKEN", "t"),
            ("DATABASE_URL", "postgres://db"),
            ("GENERATION_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "GENERATION_TIMEOUT_SECS", .. }));
    }

    #[test]
    fn webhook_needs_both_values() {
        let base = [("TELOXIDE_TOKEN", "t"), ("DATABASE_URL", "postgres://db")];

        let only_url = [base.as_slice(), &[("NGROK_URL", "https://example.ngrok.app")]].concat();
        assert!(Config::from_lookup(lookup(&only_url)).unwrap().webhook.is_none());

        let both = [
            base.as_slice(),
            &[
                ("NGROK_URL", "https://example.ngrok.app"),
                ("NGROK_ADDR", "127.0.0.1:8443"),
                ("OPENAI_API_KEY", "sk-test"),
            ],
        ]
        .concat();
        let config = Config::from_lookup(lookup(&both)).unwrap();
        let webhook = config.webhook.unwrap();
        assert_eq!(webhook.addr.port(), 8443);
        assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    }
}
