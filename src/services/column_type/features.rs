//! Column feature extraction.
//!
//! A feature extractor turns column samples into a numeric feature table, one
//! row per column, persisted as CSV so the predictor (local or remote) reads
//! exactly what was extracted.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::ColumnSample;
use crate::services::error::ServiceError;
use crate::services::http::ServiceClient;

pub const N_VALUES: &str = "n_values";
pub const FRAC_EMPTY: &str = "frac_empty";
pub const MEAN_CHAR_LEN: &str = "mean_char_len";
pub const STD_CHAR_LEN: &str = "std_char_len";
pub const MEAN_WORD_COUNT: &str = "mean_word_count";
pub const FRAC_NUMERIC: &str = "frac_numeric";
pub const FRAC_INTEGER: &str = "frac_integer";
pub const MEAN_NUMERIC: &str = "mean_numeric";
pub const STD_NUMERIC: &str = "std_numeric";
pub const FRAC_YEAR_RANGE: &str = "frac_year_range";
pub const FRAC_ALPHA_CHARS: &str = "frac_alpha_chars";
pub const FRAC_DIGIT_CHARS: &str = "frac_digit_chars";
pub const FRAC_UPPER_CHARS: &str = "frac_upper_chars";
pub const FRAC_PUNCT_CHARS: &str = "frac_punct_chars";
pub const FRAC_SPACE_CHARS: &str = "frac_space_chars";
pub const FRAC_MIXED_ALNUM: &str = "frac_mixed_alnum";
pub const DISTINCT_RATIO: &str = "distinct_ratio";
pub const CHAR_ENTROPY: &str = "char_entropy";

/// Feature columns written by `StatisticalFeatureExtractor`, in order.
pub const STATISTICAL_FEATURES: [&str; 18] = [
    N_VALUES,
    FRAC_EMPTY,
    MEAN_CHAR_LEN,
    STD_CHAR_LEN,
    MEAN_WORD_COUNT,
    FRAC_NUMERIC,
    FRAC_INTEGER,
    MEAN_NUMERIC,
    STD_NUMERIC,
    FRAC_YEAR_RANGE,
    FRAC_ALPHA_CHARS,
    FRAC_DIGIT_CHARS,
    FRAC_UPPER_CHARS,
    FRAC_PUNCT_CHARS,
    FRAC_SPACE_CHARS,
    FRAC_MIXED_ALNUM,
    DISTINCT_RATIO,
    CHAR_ENTROPY,
];

/// Numeric features, one row per column sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub feature_names: Vec<String>,
    pub rows: Vec<Vec<f32>>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of a named feature in a row.
    pub fn get(&self, row: usize, feature: &str) -> Option<f32> {
        let col = self.feature_names.iter().position(|n| n == feature)?;
        self.rows.get(row)?.get(col).copied()
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), ServiceError> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(&self.feature_names)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|v| v.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn read_csv(path: &Path) -> Result<Self, ServiceError> {
        let mut reader = csv::Reader::from_path(path)?;
        let feature_names: Vec<String> = reader.headers()?.iter().map(String::from).collect();

        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            let row = record
                .iter()
                .map(|cell| {
                    cell.trim().parse::<f32>().map_err(|_| {
                        ServiceError::Parse(format!(
                            "{}: row {} has non-numeric feature {:?}",
                            path.display(),
                            i + 1,
                            cell
                        ))
                    })
                })
                .collect::<Result<Vec<f32>, _>>()?;
            rows.push(row);
        }

        Ok(Self {
            feature_names,
            rows,
        })
    }
}

/// Trait for feature-extraction backends.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    fn extractor_id(&self) -> &str;

    async fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        String::new()
    }

    /// Extract features for `samples` and write the table to `path`.
    async fn extract(&self, path: &Path, samples: &[ColumnSample]) -> Result<(), ServiceError>;
}

// ============================================================================
// StatisticalFeatureExtractor: built-in
// ============================================================================

/// Character, lexical and numeric statistics per column.
pub struct StatisticalFeatureExtractor;

impl StatisticalFeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn features(&self, samples: &[ColumnSample]) -> FeatureTable {
        FeatureTable {
            feature_names: STATISTICAL_FEATURES.iter().map(|s| s.to_string()).collect(),
            rows: samples.iter().map(column_features).collect(),
        }
    }
}

impl Default for StatisticalFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureExtractor for StatisticalFeatureExtractor {
    fn extractor_id(&self) -> &str {
        "statistical"
    }

    async fn extract(&self, path: &Path, samples: &[ColumnSample]) -> Result<(), ServiceError> {
        self.features(samples).write_csv(path)
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn column_features(sample: &ColumnSample) -> Vec<f32> {
    let total = sample.values.len();
    let present: Vec<&str> = sample
        .values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .collect();

    let char_lens: Vec<f64> = present.iter().map(|v| v.chars().count() as f64).collect();
    let word_counts: Vec<f64> = present
        .iter()
        .map(|v| v.split_whitespace().count() as f64)
        .collect();
    let numbers: Vec<f64> = present
        .iter()
        .filter_map(|v| v.replace(',', "").parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .collect();
    let integers = numbers.iter().filter(|v| v.fract() == 0.0).count();
    let years = numbers
        .iter()
        .filter(|v| v.fract() == 0.0 && (1000.0..=2100.0).contains(*v))
        .count();

    let mut char_counts: HashMap<char, usize> = HashMap::new();
    let (mut alpha, mut digit, mut upper, mut punct, mut space, mut chars) = (0, 0, 0, 0, 0, 0);
    for c in present.iter().flat_map(|v| v.chars()) {
        chars += 1;
        *char_counts.entry(c).or_insert(0) += 1;
        if c.is_alphabetic() {
            alpha += 1;
        }
        if c.is_numeric() {
            digit += 1;
        }
        if c.is_uppercase() {
            upper += 1;
        }
        if c.is_ascii_punctuation() {
            punct += 1;
        }
        if c.is_whitespace() {
            space += 1;
        }
    }

    let entropy = char_counts
        .values()
        .map(|&n| {
            let p = ratio(n, chars);
            -p * p.log2()
        })
        .sum::<f64>();

    let mixed = present
        .iter()
        .filter(|v| v.chars().any(char::is_alphabetic) && v.chars().any(char::is_numeric))
        .count();
    let distinct: HashSet<&str> = present.iter().copied().collect();

    let (mean_len, std_len) = mean_std(&char_lens);
    let (mean_words, _) = mean_std(&word_counts);
    let (mean_num, std_num) = mean_std(&numbers);

    [
        total as f64,
        1.0 - ratio(present.len(), total),
        mean_len,
        std_len,
        mean_words,
        ratio(numbers.len(), present.len()),
        ratio(integers, present.len()),
        mean_num,
        std_num,
        ratio(years, present.len()),
        ratio(alpha, chars),
        ratio(digit, chars),
        ratio(upper, chars),
        ratio(punct, chars),
        ratio(space, chars),
        ratio(mixed, present.len()),
        ratio(distinct.len(), present.len()),
        entropy,
    ]
    .into_iter()
    .map(|v| v as f32)
    .collect()
}

// ============================================================================
// HttpFeatureExtractor: remote
// ============================================================================

#[derive(Debug, Serialize)]
struct FeatureRequest<'a> {
    columns: &'a [ColumnSample],
}

/// Feature extractor backed by a remote column-typing server.
///
/// `POST {endpoint}/features` with `{"columns": [{"name", "values"}]}` must
/// return `{"feature_names": [...], "rows": [[...]]}`.
pub struct HttpFeatureExtractor {
    client: ServiceClient,
}

impl HttpFeatureExtractor {
    pub fn new(endpoint: &str, timeout_secs: u64) -> Result<Self, ServiceError> {
        Ok(Self {
            client: ServiceClient::new(endpoint, timeout_secs)?,
        })
    }
}

#[async_trait]
impl FeatureExtractor for HttpFeatureExtractor {
    fn extractor_id(&self) -> &str {
        "http"
    }

    async fn is_available(&self) -> bool {
        self.client.is_available().await
    }

    fn availability_hint(&self) -> String {
        self.client.availability_hint()
    }

    async fn extract(&self, path: &Path, samples: &[ColumnSample]) -> Result<(), ServiceError> {
        let table: FeatureTable = self
            .client
            .post_json("features", &FeatureRequest { columns: samples })
            .await?;
        if table.rows.len() != samples.len() {
            return Err(ServiceError::Parse(format!(
                "expected {} feature rows, got {}",
                samples.len(),
                table.rows.len()
            )));
        }
        table.write_csv(path)
    }
}
