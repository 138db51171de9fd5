use crate::{
    Config,
    error::FetchError,
    model::{Payload, WeatherRequest},
    provider::gismeteo::GismeteoProvider,
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod gismeteo;

/// A weather service that can answer [`WeatherRequest`]s.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(&self, request: &WeatherRequest) -> Result<Payload, FetchError>;
}

/// Construct the provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<GismeteoProvider> {
    let api_token = config.api_token().ok_or_else(|| {
        anyhow::anyhow!(
            "No API token configured for the weather provider.\n\
                 Hint: run `weather-bot configure` or set the API_KEY environment variable."
        )
    })?;

    let provider = GismeteoProvider::new(api_token, &config.base_url, config.request_timeout())?;
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn provider_from_config_errors_when_missing_api_token() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API token configured"));
        assert!(err.to_string().contains("Hint: run `weather-bot configure`"));
    }

    #[test]
    fn provider_from_config_works_when_token_set() {
        let mut cfg = Config::default();
        cfg.set_api_token("TOKEN".to_string());

        let provider = provider_from_config(&cfg);
        assert!(provider.is_ok());
    }

    #[test]
    fn blank_token_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.set_api_token("   ".to_string());

        assert!(provider_from_config(&cfg).is_err());
    }
}
