use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult, FetchError};

pub const NO_BUSINESS: &str = "No restaurant could be found";
pub const NO_RATING: &str = "No rating exists";
pub const NO_LOCATION: &str = "No location exists";

/// Geographic bias applied to every nearby search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchArea {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: u32,
    pub category: String,
}

impl SearchArea {
    fn location_param(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rating {
    Score(f64),
    Missing,
}

impl Rating {
    pub fn from_column(value: Option<f64>) -> Self {
        value.map(Rating::Score).unwrap_or(Rating::Missing)
    }

    pub fn as_column(&self) -> Option<f64> {
        match self {
            Rating::Score(value) => Some(*value),
            Rating::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Rating::Missing)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rating::Score(value) => write!(f, "{value}"),
            Rating::Missing => f.write_str(NO_RATING),
        }
    }
}

impl Serialize for Rating {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Rating::Score(value) => serializer.serialize_f64(*value),
            Rating::Missing => serializer.serialize_str(NO_RATING),
        }
    }
}

/// One result slot, with each field already defaulted to its sentinel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawResult {
    pub name: String,
    pub rating: Rating,
    pub location: String,
}

impl RawResult {
    pub fn is_placeholder(&self) -> bool {
        self.name == NO_BUSINESS
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NearbySearchResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<NearbyResult>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NearbyResult {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub vicinity: Option<String>,
}

impl NearbySearchResponse {
    pub fn parse(body: &str) -> Result<Self, FetchError> {
        let parsed: Self = serde_json::from_str(body)?;
        match parsed.status.as_deref() {
            None | Some("OK") | Some("ZERO_RESULTS") => Ok(parsed),
            Some(status) => Err(FetchError::Api {
                status: status.to_string(),
                message: parsed
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "no error message supplied".into()),
            }),
        }
    }

    /// Extracts exactly `limit` slots. Each field falls back to its sentinel
    /// on its own when the key is absent or the slot index is out of range.
    pub fn top_results(&self, limit: usize) -> Vec<RawResult> {
        let entries = self.results.as_deref().unwrap_or_default();
        (0..limit)
            .map(|index| {
                let entry = entries.get(index);
                RawResult {
                    name: entry
                        .and_then(|e| e.name.clone())
                        .unwrap_or_else(|| NO_BUSINESS.to_string()),
                    rating: Rating::from_column(entry.and_then(|e| e.rating)),
                    location: entry
                        .and_then(|e| e.vicinity.clone())
                        .unwrap_or_else(|| NO_LOCATION.to_string()),
                }
            })
            .collect()
    }
}

#[async_trait]
pub trait NearbySearch: Send + Sync {
    async fn fetch_top_results(
        &self,
        term: &str,
        area: &SearchArea,
        result_limit: usize,
    ) -> Result<Vec<RawResult>, FetchError>;
}

pub struct HttpPlacesClient {
    http: Client,
    endpoint: String,
    api_key: SecretString,
}

impl HttpPlacesClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("places-search/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(FetchError::from)?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let api_key = config
            .places_api_key
            .clone()
            .ok_or_else(|| AppError::Config("PLACES_API_KEY is not set".into()))?;
        Self::new(
            config.places_endpoint.clone(),
            api_key,
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl NearbySearch for HttpPlacesClient {
    async fn fetch_top_results(
        &self,
        term: &str,
        area: &SearchArea,
        result_limit: usize,
    ) -> Result<Vec<RawResult>, FetchError> {
        let radius = area.radius_m.to_string();
        let location = area.location_param();
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("location", location.as_str()),
                ("radius", radius.as_str()),
                ("type", area.category.as_str()),
                ("name", term),
                ("key", self.api_key.expose_secret()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "places_api", %status, term, "nearby search returned error status");
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        let parsed = NearbySearchResponse::parse(&body)?;
        let returned = parsed.results.as_ref().map(Vec::len).unwrap_or(0);
        debug!(
            target: "places_api",
            term,
            returned,
            result_limit,
            "nearby search completed"
        );
        Ok(parsed.top_results(result_limit))
    }
}

/// Shared handle over whichever [`NearbySearch`] backend is configured.
#[derive(Clone)]
pub struct PlacesService {
    inner: Arc<dyn NearbySearch>,
}

impl PlacesService {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let client = HttpPlacesClient::from_config(config)?;
        Ok(Self::from_lookup(Arc::new(client)))
    }

    pub fn from_lookup(lookup: Arc<dyn NearbySearch>) -> Self {
        Self { inner: lookup }
    }

    pub async fn fetch_top_results(
        &self,
        term: &str,
        area: &SearchArea,
        result_limit: usize,
    ) -> Result<Vec<RawResult>, FetchError> {
        self.inner.fetch_top_results(term, area, result_limit).await
    }
}
