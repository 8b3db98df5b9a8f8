//! HTTP lookup client.

use super::{RecordLookup, VehicleRecord};
use crate::{
    config::LookupConfig,
    errors::{Error, Result},
};
use async_trait::async_trait;

/// Fetches records with `GET <endpoint><query>`.
#[derive(Debug, Clone)]
pub struct HttpLookup {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLookup {
    /// Builds a client whose requests time out after `lookup.timeout()`.
    pub fn new(lookup: &LookupConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(lookup.timeout())
            .build()
            .map_err(|e| Error::Config {
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            endpoint: lookup.endpoint.clone(),
        })
    }

    fn url(&self, query: &str) -> String {
        format!("{}{query}", self.endpoint)
    }
}

fn lookup_error(reason: impl Into<String>) -> Error {
    Error::Lookup {
        reason: reason.into(),
    }
}

#[async_trait]
impl RecordLookup for HttpLookup {
    async fn fetch(&self, query: &str) -> Result<VehicleRecord> {
        let url = self.url(query);
        tracing::info!("Fetching vehicle data from: {url}");

        let response = self.client.get(&url).send().await.map_err(|e| {
            tracing::warn!("Network error while fetching vehicle data: {e}");
            if e.is_timeout() {
                lookup_error("Request timed out")
            } else {
                lookup_error(format!("Network error: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(%status, "Lookup API returned an error status");
            return Err(lookup_error(format!("API HTTP {}", status.as_u16())));
        }

        let payload: serde_json::Value = response.json().await.map_err(|e| {
            tracing::warn!("Lookup API sent an unreadable body: {e}");
            lookup_error("Invalid response format from API")
        })?;
        VehicleRecord::from_json(query, payload)
    }
}
