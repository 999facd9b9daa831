use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::{
    Config, FetchError,
    model::{Observation, Query},
};

use super::WeatherProvider;

pub const DEFAULT_BASE_URL: &str = "http://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            http: Client::new(),
        }
    }

    /// Build from config, applying the optional request timeout.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            http,
        })
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    #[instrument(skip(self), fields(url = %self.base_url))]
    async fn current(&self, query: &Query) -> Result<Observation, FetchError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&query.params(&self.api_key))
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        debug!(%status, "OpenWeather responded");

        // Unknown cities come back as 404 with a JSON body lacking `main`.
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            return Err(FetchError::Status {
                status,
                body: truncate_body(&body),
            });
        }

        parse_observation(&body)
    }
}

/// Read the consumed subset out of a response body.
///
/// Only a body that is not JSON at all is an error; absent or mistyped
/// fields become defaults.
pub fn parse_observation(body: &str) -> Result<Observation, FetchError> {
    let json: Value = serde_json::from_str(body)?;

    Ok(Observation {
        name: json["name"].as_str().unwrap_or_default().to_string(),
        temperature: json["main"]["temp"].as_f64(),
        condition: as_code(&json["weather"][0]["id"]),
    })
}

/// Whole-number reading of a JSON number, accepting float spellings like `800.0`.
fn as_code(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_body() {
        let obs =
            parse_observation(r#"{"name":"Paris","main":{"temp":290.0},"weather":[{"id":800}]}"#)
                .unwrap();

        assert_eq!(obs.name, "Paris");
        assert_eq!(obs.temperature, Some(290.0));
        assert_eq!(obs.condition, Some(800));
    }

    #[test]
    fn missing_fields_are_none() {
        let obs = parse_observation(r#"{"cod":"404","message":"city not found"}"#).unwrap();

        assert_eq!(obs, Observation::default());
    }

    #[test]
    fn integer_temperature_is_accepted() {
        let obs = parse_observation(r#"{"name":"Oslo","main":{"temp":271},"weather":[]}"#).unwrap();

        assert_eq!(obs.temperature, Some(271.0));
        assert_eq!(obs.condition, None);
    }

    #[test]
    fn float_condition_code_is_accepted() {
        let obs = parse_observation(r#"{"name":"Paris","main":{"temp":290.0},"weather":[{"id":800.0}]}"#)
            .unwrap();

        assert_eq!(obs.condition, Some(800));
    }

    #[test]
    fn string_condition_code_is_ignored() {
        let obs = parse_observation(r#"{"weather":[{"id":"800"}]}"#).unwrap();
        assert_eq!(obs.condition, None);
    }

    #[test]
    fn non_json_body_is_an_error() {
        let err = parse_observation("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn truncate_keeps_short_bodies() {
        assert_eq!(truncate_body("short"), "short");
        let long = "é".repeat(300);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 203);
    }
}
