//! Column-type inference services.
//!
//! Column typing runs in two steps. A `FeatureExtractor` turns each column
//! sample into a row of numeric features and writes them to an intermediate
//! CSV artifact. A `ColumnTypePredictor` then maps each feature row to a
//! semantic type label.

mod features;
mod predictor;

use serde::{Deserialize, Serialize};

pub use features::{
    FeatureExtractor, FeatureTable, HttpFeatureExtractor, StatisticalFeatureExtractor,
    STATISTICAL_FEATURES,
};
pub use predictor::{ColumnTypePredictor, HeuristicColumnTypePredictor, HttpColumnTypePredictor};

/// Every value observed for one column, in row order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSample {
    pub name: String,
    pub values: Vec<String>,
}
