use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, instrument, warn};

use crate::core::currency::{CurrencyCode, NetworkError, RateProvider, RateSnapshot};

// ExchangeRateApiProvider implementation for RateProvider
pub struct ExchangeRateApiProvider {
    base_url: String,
    api_key: String,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        ExchangeRateApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn latest_url(&self, base: &CurrencyCode) -> String {
        format!("{}/{}/latest/{}", self.base_url, self.api_key, base)
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    result: Option<String>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    conversion_rates: Option<HashMap<String, f64>>,
    #[serde(default)]
    flags: HashMap<String, String>,
}

fn collect_rates(base: &CurrencyCode, raw: HashMap<String, f64>) -> BTreeMap<CurrencyCode, f64> {
    raw.into_iter()
        .filter_map(|(code, rate)| {
            let parsed = code.parse::<CurrencyCode>().ok();
            match parsed {
                Some(parsed) if rate.is_finite() && rate > 0.0 => Some((parsed, rate)),
                _ => {
                    warn!(%base, %code, rate, "Dropping unusable rate entry");
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl RateProvider for ExchangeRateApiProvider {
    #[instrument(name = "LatestRatesFetch", skip(self), fields(base = %base))]
    async fn fetch_rates(&self, base: &CurrencyCode) -> Result<RateSnapshot, NetworkError> {
        let url = self.latest_url(base);
        debug!(
            "Requesting latest rates from {}/***/latest/{}",
            self.base_url, base
        );

        // The request URL carries the API key, so it never goes into the error.
        let transport = |source: reqwest::Error| NetworkError::Transport {
            base: base.clone(),
            source: source.without_url(),
        };

        let client = reqwest::Client::builder()
            .user_agent("fxconv/1.0")
            .build()
            .map_err(transport)?;
        let response = client.get(&url).send().await.map_err(transport)?;

        debug!(status = %response.status(), "Received rate service response");
        if !response.status().is_success() {
            return Err(NetworkError::Status {
                base: base.clone(),
                status: response.status(),
            });
        }

        let text = response.text().await.map_err(transport)?;
        let data: LatestRatesResponse =
            serde_json::from_str(&text).map_err(|e| NetworkError::Malformed {
                base: base.clone(),
                reason: e.to_string(),
            })?;

        if data.result.as_deref() == Some("error") {
            return Err(NetworkError::Upstream {
                base: base.clone(),
                kind: data.error_type.unwrap_or_else(|| "unknown".to_string()),
            });
        }

        let raw_rates = data.conversion_rates.ok_or_else(|| NetworkError::Malformed {
            base: base.clone(),
            reason: "missing conversion_rates".to_string(),
        })?;

        let flags = data
            .flags
            .into_iter()
            .filter_map(|(code, flag)| code.parse::<CurrencyCode>().ok().map(|c| (c, flag)))
            .collect();

        Ok(RateSnapshot {
            base: base.clone(),
            rates: collect_rates(base, raw_rates),
            flags,
            fetched_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_KEY: &str = "test-key";

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    pub async fn create_mock_server(base: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/{API_KEY}/latest/{base}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let mock_response = r#"{
            "result": "success",
            "base_code": "USD",
            "conversion_rates": {
                "USD": 1,
                "GHS": 12.5,
                "EUR": 0.9213
            },
            "flags": {
                "GHS": "🇬🇭",
                "USD": "🇺🇸"
            }
        }"#;
        let mock_server = create_mock_server("USD", 200, mock_response).await;

        let provider = ExchangeRateApiProvider::new(&mock_server.uri(), API_KEY);
        let snapshot = provider.fetch_rates(&code("USD")).await.unwrap();

        assert_eq!(snapshot.base, code("USD"));
        assert_eq!(snapshot.rates.len(), 3);
        assert_eq!(snapshot.rate_for(&code("GHS")), Some(12.5));
        assert_eq!(snapshot.rate_for(&code("EUR")), Some(0.9213));
        assert_eq!(snapshot.flags.get(&code("GHS")).map(String::as_str), Some("🇬🇭"));
        assert!(snapshot.flags.get(&code("EUR")).is_none());
    }

    #[tokio::test]
    async fn test_flags_are_optional() {
        let mock_response = r#"{"conversion_rates": {"EUR": 1, "USD": 1.08}}"#;
        let mock_server = create_mock_server("EUR", 200, mock_response).await;

        let provider = ExchangeRateApiProvider::new(&mock_server.uri(), API_KEY);
        let snapshot = provider.fetch_rates(&code("EUR")).await.unwrap();

        assert!(snapshot.flags.is_empty());
        assert_eq!(snapshot.rate_for(&code("USD")), Some(1.08));
    }

    #[tokio::test]
    async fn test_non_positive_rates_are_dropped() {
        let mock_response = r#"{"conversion_rates": {"USD": 1, "XXX": 0, "YYY": -3.5}}"#;
        let mock_server = create_mock_server("USD", 200, mock_response).await;

        let provider = ExchangeRateApiProvider::new(&mock_server.uri(), API_KEY);
        let snapshot = provider.fetch_rates(&code("USD")).await.unwrap();

        assert_eq!(snapshot.rates.len(), 1);
        assert!(snapshot.rates.values().all(|r| *r > 0.0));
    }

    #[tokio::test]
    async fn test_api_error_status() {
        let mock_server = create_mock_server("EUR", 500, "").await;

        let provider = ExchangeRateApiProvider::new(&mock_server.uri(), API_KEY);
        let result = provider.fetch_rates(&code("EUR")).await;

        assert!(matches!(result, Err(NetworkError::Status { .. })));
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for base currency: EUR"
        );
    }

    #[tokio::test]
    async fn test_malformed_response() {
        let mock_server = create_mock_server("USD", 200, "<html>oops</html>").await;

        let provider = ExchangeRateApiProvider::new(&mock_server.uri(), API_KEY);
        let result = provider.fetch_rates(&code("USD")).await;

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse JSON response for USD")
        );
    }

    #[tokio::test]
    async fn test_missing_conversion_rates() {
        let mock_response = r#"{"result": "success", "rates": {"USD": 1}}"#;
        let mock_server = create_mock_server("USD", 200, mock_response).await;

        let provider = ExchangeRateApiProvider::new(&mock_server.uri(), API_KEY);
        let result = provider.fetch_rates(&code("USD")).await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "Failed to parse JSON response for USD: missing conversion_rates"
        );
    }

    #[tokio::test]
    async fn test_upstream_error_body() {
        let mock_response = r#"{"result": "error", "error-type": "invalid-key"}"#;
        let mock_server = create_mock_server("USD", 200, mock_response).await;

        let provider = ExchangeRateApiProvider::new(&mock_server.uri(), API_KEY);
        let result = provider.fetch_rates(&code("USD")).await;

        assert_eq!(
            result.unwrap_err().to_string(),
            "Rate service error: invalid-key for base currency: USD"
        );
    }

    #[tokio::test]
    async fn test_every_call_fetches_again() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/{API_KEY}/latest/USD")))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"conversion_rates": {"USD": 1}}"#),
            )
            .expect(2)
            .mount(&mock_server)
            .await;

        let provider = ExchangeRateApiProvider::new(&mock_server.uri(), API_KEY);
        provider.fetch_rates(&code("USD")).await.unwrap();
        provider.fetch_rates(&code("USD")).await.unwrap();

        mock_server.verify().await;
    }

    #[tokio::test]
    async fn test_unreachable_server() {
        let provider = ExchangeRateApiProvider::new("http://127.0.0.1:9", API_KEY);
        let result = provider.fetch_rates(&code("USD")).await;

        assert!(matches!(result, Err(NetworkError::Transport { .. })));
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        let provider = ExchangeRateApiProvider::new("http://127.0.0.1:9", "SECRET-KEY-123");
        let err = provider.fetch_rates(&code("USD")).await.unwrap_err();

        let text = format!("{err} {err:?}");
        assert!(!text.contains("SECRET-KEY-123"), "key leaked: {text}");
        assert!(text.contains("USD"));
    }
}
