//! Entity-linking service handle.
//!
//! An entity linker finds mention spans in a text and ranks candidate entity
//! types for each one. Offsets are character (not byte) offsets into the
//! text that was sent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::ServiceError;
use super::http::ServiceClient;

/// One ranked entity-type candidate for a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypePrediction {
    /// Knowledge-base identifier, when the linker provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default)]
    pub score: f32,
}

impl TypePrediction {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            id: None,
            label: label.into(),
            score,
        }
    }
}

/// A linked mention: `ln` characters starting at character `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedSpan {
    pub start: usize,
    #[serde(alias = "length")]
    pub ln: usize,
    /// Candidates, best first.
    #[serde(default)]
    pub predicted_entity_types: Vec<TypePrediction>,
}

impl LinkedSpan {
    pub fn new(start: usize, ln: usize, predicted_entity_types: Vec<TypePrediction>) -> Self {
        Self {
            start,
            ln,
            predicted_entity_types,
        }
    }

    /// Top-ranked type label, if any.
    pub fn top_type(&self) -> Option<&str> {
        self.predicted_entity_types
            .first()
            .map(|p| p.label.as_str())
    }
}

/// Trait for entity-linking backends.
#[async_trait]
pub trait EntityLinker: Send + Sync {
    fn backend_id(&self) -> &str;

    async fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    /// Find linked spans in `text`, ordered by start offset.
    async fn process_text(&self, text: &str) -> Result<Vec<LinkedSpan>, ServiceError>;
}

#[derive(Debug, Serialize)]
struct LinkRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    spans: Vec<LinkedSpan>,
}

/// Entity linker backed by a remote linking server.
///
/// `POST {endpoint}/process_text` with `{"text": ...}` must return
/// `{"spans": [{"start", "ln", "predicted_entity_types": [{"label", "score"}]}]}`.
pub struct HttpEntityLinker {
    client: ServiceClient,
}

impl HttpEntityLinker {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ServiceClient::new(endpoint, timeout_secs)?,
        })
    }
}

#[async_trait]
impl EntityLinker for HttpEntityLinker {
    fn backend_id(&self) -> &str {
        "http"
    }

    async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    fn availability_hint(&self) -> String {
        self.client.availability_hint()
    }

    async fn process_text(&self, text: &str) -> Result<Vec<LinkedSpan>, ServiceError> {
        let resp: LinkResponse = self
            .client
            .post_json("process_text", &LinkRequest { text })
            .await?;
        Ok(resp.spans)
    }
}
