//! Opt-in geolocation lookup.
//!
//! Coordinates only ever leave the machine after an explicit opt-in; the
//! lookup asks a public IP-geolocation service where this node appears to
//! be and the result rides along on subsequent heartbeats.

use reqwest::Client;
use serde::Deserialize;

use hypermind_gossip::Location;

const DEFAULT_BASE_URL: &str = "http://ip-api.com";

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    status: String,
    #[serde(default)]
    lat: f64,
    #[serde(default)]
    lon: f64,
    #[serde(default)]
    city: String,
}

/// HTTP client for the geolocation service.
#[derive(Clone)]
pub struct GeoClient {
    client: Client,
    base_url: String,
}

impl GeoClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    /// Resolve this node's coarse location from its public address.
    pub async fn lookup(&self) -> Result<Location, GeoError> {
        let url = format!("{}/json", self.base_url);
        let response: GeoResponse = self.client.get(&url).send().await?.json().await?;

        if response.status != "success" {
            return Err(GeoError::Lookup(format!(
                "service answered with status {}",
                response.status
            )));
        }
        if !response.lat.is_finite() || !response.lon.is_finite() {
            return Err(GeoError::Lookup("non-finite coordinates".to_string()));
        }

        Ok(Location {
            lat: response.lat,
            lon: response.lon,
            city: response.city,
        })
    }
}

impl Default for GeoClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn lookup_parses_a_successful_answer() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "success",
                "lat": 52.52,
                "lon": 13.405,
                "city": "Berlin"
            })))
            .mount(&server)
            .await;

        let client = GeoClient::with_base_url(server.uri());
        let loc = client.lookup().await.unwrap();
        assert_eq!(loc.city, "Berlin");
        assert!((loc.lat - 52.52).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn lookup_propagates_service_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "fail"
            })))
            .mount(&server)
            .await;

        let client = GeoClient::with_base_url(server.uri());
        assert!(matches!(
            client.lookup().await.unwrap_err(),
            GeoError::Lookup(_)
        ));
    }
}
