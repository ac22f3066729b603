//! Shared HTTP plumbing for remote model services.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::error::ServiceError;

/// A JSON-over-HTTP model server at a fixed endpoint.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    endpoint: String,
    client: Client,
}

impl ServiceClient {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ServiceError::Connection(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check the server's `/health` route.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/health", self.endpoint);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    pub fn availability_hint(&self) -> String {
        format!("no server responding at {}/health", self.endpoint)
    }

    /// POST a JSON body to `{endpoint}/{route}` and decode the JSON reply.
    pub async fn post_json<B, R>(&self, route: &str, body: &B) -> Result<R, ServiceError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.endpoint, route.trim_start_matches('/'));
        debug!("POST {}", url);

        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ServiceError::Connection(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ServiceError::Api(format!("HTTP {}: {}", status, body)));
        }

        resp.json()
            .await
            .map_err(|e| ServiceError::Parse(e.to_string()))
    }
}
