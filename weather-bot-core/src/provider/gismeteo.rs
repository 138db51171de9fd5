use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{
    error::FetchError,
    model::{Endpoint, Payload, WeatherRequest},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.gismeteo.net";

const TOKEN_HEADER: &str = "X-Gismeteo-Token";

#[derive(Debug, Clone)]
pub struct GismeteoProvider {
    api_token: String,
    base_url: String,
    http: Client,
}

impl GismeteoProvider {
    pub fn new(api_token: &str, base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                FetchError::ConnectionFailed(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            api_token: api_token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, endpoint: Endpoint) -> String {
        let path = match endpoint {
            Endpoint::Current => "/v2/weather/current/",
            Endpoint::Forecast => "/v2/weather/forecast/",
            Endpoint::ForecastAggregate => "/v2/weather/forecast/aggregate/",
        };
        format!("{}{path}", self.base_url)
    }
}

/// Every reply wraps the useful part in a top-level `response` field.
#[derive(Debug, Deserialize)]
struct GmEnvelope {
    response: Value,
}

#[async_trait]
impl WeatherProvider for GismeteoProvider {
    async fn fetch(&self, request: &WeatherRequest) -> Result<Payload, FetchError> {
        let url = self.url(request.endpoint);

        let mut query = vec![
            ("latitude", request.coordinates.latitude.to_string()),
            ("longitude", request.coordinates.longitude.to_string()),
        ];
        if let Some(days) = request.days {
            query.push(("days", days.to_string()));
        }

        debug!(%url, days = ?request.days, "Requesting weather from Gismeteo");

        let res = self
            .http
            .get(&url)
            .header(TOKEN_HEADER, &self.api_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to connect to Gismeteo: {e}");
                FetchError::ConnectionFailed(e.to_string())
            })?;

        let status = res.status();
        // Anything but 200 is refused, other 2xx codes included.
        if status != StatusCode::OK {
            error!(status = status.as_u16(), "Gismeteo returned an unexpected status code");
            return Err(FetchError::IncorrectStatusCode(status.as_u16()));
        }

        let body = res.text().await.map_err(|e| {
            error!("Failed to read Gismeteo response body: {e}");
            FetchError::ConnectionFailed(e.to_string())
        })?;

        let decode_error = |reason: String| {
            error!(
                status = status.as_u16(),
                body = %truncate_body(&body),
                "Cannot decode Gismeteo response: {reason}"
            );
            FetchError::CannotDecodeResponse {
                status: status.as_u16(),
                reason,
            }
        };

        let parsed: GmEnvelope =
            serde_json::from_str(&body).map_err(|e| decode_error(e.to_string()))?;

        let payload = Payload::from_value(parsed.response).ok_or_else(|| {
            decode_error("`response` is neither an object nor an array".to_string())
        })?;

        if let Payload::Series(slots) = &payload {
            debug!(slots = slots.len(), "Received forecast series");
        } else if request.days.is_some() {
            warn!("Asked for a forecast but received a single snapshot");
        }

        Ok(payload)
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base_url: &str) -> GismeteoProvider {
        GismeteoProvider::new("TOKEN", base_url, Duration::from_secs(1)).expect("client")
    }

    #[test]
    fn endpoints_map_to_provider_paths() {
        let p = provider("https://api.gismeteo.net/");

        assert_eq!(
            p.url(Endpoint::Current),
            "https://api.gismeteo.net/v2/weather/current/"
        );
        assert_eq!(
            p.url(Endpoint::Forecast),
            "https://api.gismeteo.net/v2/weather/forecast/"
        );
        assert_eq!(
            p.url(Endpoint::ForecastAggregate),
            "https://api.gismeteo.net/v2/weather/forecast/aggregate/"
        );
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "ясно".repeat(100);
        let truncated = truncate_body(&body);

        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }
}
