//! Column-type prediction from feature tables.

use async_trait::async_trait;
use serde::Deserialize;

use super::features::{
    FeatureTable, DISTINCT_RATIO, FRAC_EMPTY, FRAC_INTEGER, FRAC_MIXED_ALNUM, FRAC_NUMERIC,
    FRAC_YEAR_RANGE, MEAN_WORD_COUNT,
};
use crate::services::error::ServiceError;
use crate::services::http::ServiceClient;

/// Trait for column-type predictors.
///
/// `predict` returns one semantic type per feature-table row, in row order.
#[async_trait]
pub trait ColumnTypePredictor: Send + Sync {
    fn predictor_id(&self) -> &str;

    async fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    async fn predict(&self, features: &FeatureTable) -> Result<Vec<String>, ServiceError>;
}

/// Rule-of-thumb typing over `StatisticalFeatureExtractor` output.
///
/// Emits a small subset of the Sherlock semantic types: `year`, `rank`,
/// `sales`, `code`, `description`, `category`, `name`, `notes`.
pub struct HeuristicColumnTypePredictor;

impl HeuristicColumnTypePredictor {
    pub fn new() -> Self {
        Self
    }

    fn classify(&self, features: &FeatureTable, row: usize) -> Result<&'static str, ServiceError> {
        let get = |name: &str| {
            features.get(row, name).ok_or_else(|| {
                ServiceError::Parse(format!("feature table is missing {:?}", name))
            })
        };

        if get(FRAC_EMPTY)? >= 1.0 {
            return Ok("notes");
        }

        if get(FRAC_NUMERIC)? >= 0.9 {
            return Ok(if get(FRAC_INTEGER)? >= 0.9 {
                if get(FRAC_YEAR_RANGE)? >= 0.9 {
                    "year"
                } else {
                    "rank"
                }
            } else {
                "sales"
            });
        }

        let words = get(MEAN_WORD_COUNT)?;
        if get(FRAC_MIXED_ALNUM)? >= 0.5 && words <= 2.0 {
            return Ok("code");
        }
        if words >= 8.0 {
            return Ok("description");
        }
        if get(DISTINCT_RATIO)? <= 0.5 && words <= 3.0 {
            return Ok("category");
        }
        if words <= 4.0 {
            return Ok("name");
        }
        Ok("notes")
    }
}

impl Default for HeuristicColumnTypePredictor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ColumnTypePredictor for HeuristicColumnTypePredictor {
    fn predictor_id(&self) -> &str {
        "heuristic"
    }

    async fn predict(&self, features: &FeatureTable) -> Result<Vec<String>, ServiceError> {
        (0..features.len())
            .map(|row| self.classify(features, row).map(String::from))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    labels: Vec<String>,
}

/// Predictor backed by a remote column-typing model.
///
/// `POST {endpoint}/predict` with the feature table must return
/// `{"labels": [...]}`, one label per row.
pub struct HttpColumnTypePredictor {
    client: ServiceClient,
}

impl HttpColumnTypePredictor {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ServiceClient::new(endpoint, timeout_secs)?,
        })
    }
}

#[async_trait]
impl ColumnTypePredictor for HttpColumnTypePredictor {
    fn predictor_id(&self) -> &str {
        "http"
    }

    async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    fn availability_hint(&self) -> String {
        self.client.availability_hint()
    }

    async fn predict(&self, features: &FeatureTable) -> Result<Vec<String>, ServiceError> {
        let resp: PredictResponse = self.client.post_json("predict", features).await?;
        Ok(resp.labels)
    }
}
