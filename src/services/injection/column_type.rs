//! Column-type injection.
//!
//! Works on a whole file at a time: the pair file is split back into its
//! left and right tables, a semantic type is predicted for every column of
//! each side, and every cell is re-serialized with its column's type using
//! the selected prompt template.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::injector::{create_output, is_cache_hit, Injector};
use super::prompt::PromptType;
use super::reconstruct::{PairTables, SideTable};
use super::types::{InjectionError, InjectorKind};
use crate::config::TaskConfig;
use crate::services::column_type::{ColumnTypePredictor, FeatureExtractor, FeatureTable};

/// Injects predicted column types into every cell.
pub struct ColumnTypeAnnotator {
    task: Arc<TaskConfig>,
    extractor: Arc<dyn FeatureExtractor>,
    predictor: Arc<dyn ColumnTypePredictor>,
    artifact_dir: PathBuf,
    initialized: bool,
}

impl ColumnTypeAnnotator {
    /// `artifact_dir` receives the intermediate feature tables.
    pub fn new(
        task: Arc<TaskConfig>,
        extractor: Arc<dyn FeatureExtractor>,
        predictor: Arc<dyn ColumnTypePredictor>,
        artifact_dir: PathBuf,
    ) -> Self {
        Self {
            task,
            extractor,
            predictor,
            artifact_dir,
            initialized: false,
        }
    }

    /// Predict one type per column of `table`.
    pub async fn predict_types(
        &self,
        table: &SideTable,
        side: &str,
    ) -> Result<Vec<String>, InjectionError> {
        if table.columns.is_empty() {
            debug!("{} table has no columns, nothing to predict", side);
            return Ok(Vec::new());
        }

        tokio::fs::create_dir_all(&self.artifact_dir)
            .await
            .map_err(InjectionError::io(&self.artifact_dir))?;
        let path = self
            .artifact_dir
            .join(format!("column_features_{}.csv", side));

        let samples = table.column_samples();
        self.extractor.extract(&path, &samples).await?;
        let features = FeatureTable::read_csv(&path)?;
        let labels = self.predictor.predict(&features).await?;

        if labels.len() != table.columns.len() {
            return Err(InjectionError::PredictionCount {
                expected: table.columns.len(),
                got: labels.len(),
            });
        }

        debug!(
            "{} column types: {}",
            side,
            table
                .columns
                .iter()
                .zip(&labels)
                .map(|(c, t)| format!("{}={}", c, t))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(labels)
    }
}

/// Serialize one row of `table` with each column's predicted type.
pub fn format_row(table: &SideTable, labels: &[String], row: usize, prompt: PromptType) -> String {
    table
        .columns
        .iter()
        .zip(labels)
        .zip(&table.rows[row])
        .map(|((column, label), value)| prompt.format_cell(column, label, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render the annotated pair lines, `left\tright\tlabel\n` per row.
pub fn serialize_tables(
    tables: &PairTables,
    left_labels: &[String],
    right_labels: &[String],
    prompt: PromptType,
) -> Result<Vec<String>, InjectionError> {
    if tables.left.len() != tables.right.len() {
        return Err(InjectionError::RowCountMismatch {
            left: tables.left.len(),
            right: tables.right.len(),
        });
    }

    Ok(tables
        .labels
        .iter()
        .take(tables.left.len())
        .enumerate()
        .map(|(row, label)| {
            format!(
                "{}\t{}\t{}\n",
                format_row(&tables.left, left_labels, row, prompt),
                format_row(&tables.right, right_labels, row, prompt),
                label
            )
        })
        .collect())
}

#[async_trait]
impl Injector for ColumnTypeAnnotator {
    fn kind(&self) -> InjectorKind {
        InjectorKind::ColumnType
    }

    fn display_name(&self) -> &str {
        "Column type"
    }

    async fn initialize(&mut self) -> Result<(), InjectionError> {
        if self.initialized {
            return Ok(());
        }
        if !self.extractor.is_available().await {
            return Err(InjectionError::BackendNotAvailable(format!(
                "feature extractor '{}': {}",
                self.extractor.extractor_id(),
                self.extractor.availability_hint()
            )));
        }
        if !self.predictor.is_available().await {
            return Err(InjectionError::BackendNotAvailable(format!(
                "column-type predictor '{}': {}",
                self.predictor.predictor_id(),
                self.predictor.availability_hint()
            )));
        }
        info!(
            "column typing ready for task {} (extractor '{}', predictor '{}')",
            self.task.name,
            self.extractor.extractor_id(),
            self.predictor.predictor_id()
        );
        self.initialized = true;
        Ok(())
    }

    async fn transform_file(
        &self,
        input: &Path,
        output: &Path,
        overwrite: bool,
        prompt_type: PromptType,
    ) -> Result<PathBuf, InjectionError> {
        if is_cache_hit(output, overwrite).await {
            debug!("column-type cache hit: {}", output.display());
            return Ok(output.to_path_buf());
        }
        if !self.initialized {
            return Err(InjectionError::NotInitialized(self.display_name().to_string()));
        }

        let tables = PairTables::read(input).await?;

        let left_labels = self.predict_types(&tables.left, "left").await?;
        let right_labels = self.predict_types(&tables.right, "right").await?;
        let lines = serialize_tables(&tables, &left_labels, &right_labels, prompt_type)?;

        let mut writer = create_output(output).await?;
        for line in &lines {
            writer
                .write_all(line.as_bytes())
                .await
                .map_err(InjectionError::io(output))?;
        }
        writer.flush().await.map_err(InjectionError::io(output))?;

        info!(
            "column types injected into {} rows (prompt type {}): {}",
            lines.len(),
            prompt_type,
            output.display()
        );
        Ok(output.to_path_buf())
    }
}
