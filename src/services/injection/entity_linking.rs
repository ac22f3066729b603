//! Entity-linking span substitution.
//!
//! Each column value is sent to the entity linker. Every linked mention
//! keeps its text and gets its top-ranked type appended, e.g.
//! `lg (organization) dishwasher`.

use std::fs::File;
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::injector::{is_cache_hit, transform_pairs, Injector};
use super::prompt::PromptType;
use super::types::{InjectionError, InjectorKind};
use crate::config::TaskConfig;
use crate::record::{SerializedRecord, COL_MARKER, VAL_MARKER};
use crate::services::entity_linking::{EntityLinker, LinkedSpan};

/// What a span without any predicted type does to a value's edits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroPredictionPolicy {
    /// Discard the edits of every span after it. Spans are processed from
    /// the end of the value, so only spans before the first untyped span
    /// survive.
    #[default]
    Reset,
    /// Leave untyped spans alone and keep all other edits.
    Skip,
}

/// An insertion of `text` at byte offset `at`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    at: usize,
    text: String,
}

/// Annotate `value` with the top type of each span.
///
/// Span offsets are in characters. Spans are visited from the highest
/// offset down; spans that overlap an already accepted span or run past the
/// end of the value are ignored.
pub fn apply_spans(value: &str, spans: &[LinkedSpan], policy: ZeroPredictionPolicy) -> String {
    let bounds: Vec<usize> = value
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(value.len()))
        .collect();

    let mut order: Vec<&LinkedSpan> = spans.iter().collect();
    order.sort_by(|a, b| b.start.cmp(&a.start));

    // Collected from the back of the value towards the front.
    let mut edits: Vec<Edit> = Vec::new();
    let mut floor = usize::MAX;

    for span in order {
        let end = span.start.checked_add(span.ln);
        let (Some(&start_byte), Some(&end_byte)) =
            (bounds.get(span.start), end.and_then(|end| bounds.get(end)))
        else {
            debug!("span {}+{} out of range for {:?}", span.start, span.ln, value);
            continue;
        };

        let Some(label) = span.top_type() else {
            if policy == ZeroPredictionPolicy::Reset {
                edits.clear();
                floor = usize::MAX;
            }
            continue;
        };

        if end_byte > floor {
            debug!("overlapping span {}+{} in {:?} skipped", span.start, span.ln, value);
            continue;
        }
        floor = start_byte;
        edits.push(Edit {
            at: end_byte,
            text: format!(" ({})", label),
        });
    }

    let extra: usize = edits.iter().map(|e| e.text.len()).sum();
    let mut out = String::with_capacity(value.len() + extra);
    let mut cursor = 0;
    for edit in edits.iter().rev() {
        out.push_str(&value[cursor..edit.at]);
        out.push_str(&edit.text);
        cursor = edit.at;
    }
    out.push_str(&value[cursor..]);
    out
}

/// Domain-knowledge injector backed by an entity linker.
///
/// Every transformed entry is also appended to a side log, truncated when
/// the injector is initialized.
pub struct EntityLinkingAnnotator {
    task: Arc<TaskConfig>,
    linker: Arc<dyn EntityLinker>,
    policy: ZeroPredictionPolicy,
    log_path: PathBuf,
    log: Mutex<Option<LineWriter<File>>>,
}

impl EntityLinkingAnnotator {
    pub fn new(
        task: Arc<TaskConfig>,
        linker: Arc<dyn EntityLinker>,
        log_path: PathBuf,
        policy: ZeroPredictionPolicy,
    ) -> Self {
        Self {
            task,
            linker,
            policy,
            log_path,
            log: Mutex::new(None),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    fn is_initialized(&self) -> bool {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).is_some()
    }

    async fn tag_value(&self, value: &str) -> Result<String, InjectionError> {
        if value.trim().is_empty() {
            return Ok(String::new());
        }
        let spans = self.linker.process_text(value).await?;
        Ok(apply_spans(value, &spans, self.policy))
    }

    fn append_log(&self, entry: &str) -> Result<(), InjectionError> {
        let mut guard = self.log.lock().unwrap_or_else(|e| e.into_inner());
        let writer = guard
            .as_mut()
            .ok_or_else(|| InjectionError::NotInitialized(self.display_name().to_string()))?;
        writeln!(writer, "{}", entry).map_err(InjectionError::io(&self.log_path))
    }
}

#[async_trait]
impl Injector for EntityLinkingAnnotator {
    fn kind(&self) -> InjectorKind {
        InjectorKind::EntityLinking
    }

    fn display_name(&self) -> &str {
        "Entity linking"
    }

    async fn initialize(&mut self) -> Result<(), InjectionError> {
        if self.log.get_mut().unwrap_or_else(|e| e.into_inner()).is_some() {
            return Ok(());
        }

        if !self.linker.is_available().await {
            return Err(InjectionError::BackendNotAvailable(format!(
                "entity linker '{}': {}",
                self.linker.backend_id(),
                self.linker.availability_hint()
            )));
        }

        if let Some(parent) = self.log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(InjectionError::io(parent))?;
        }
        let file = File::create(&self.log_path).map_err(InjectionError::io(&self.log_path))?;

        info!(
            "entity linker '{}' ready for task {}, logging to {}",
            self.linker.backend_id(),
            self.task.name,
            self.log_path.display()
        );
        *self.log.get_mut().unwrap_or_else(|e| e.into_inner()) = Some(LineWriter::new(file));
        Ok(())
    }

    async fn transform(&self, entry: &str) -> Result<String, InjectionError> {
        if !self.is_initialized() {
            return Err(InjectionError::NotInitialized(self.display_name().to_string()));
        }
        let record = SerializedRecord::parse(entry)?;

        let mut res = String::new();
        for field in record.fields() {
            let tagged = self.tag_value(&field.value).await?;
            res.push_str(&format!("{COL_MARKER} {} {VAL_MARKER} {} ", field.name, tagged));
        }
        let res = res.trim().to_string();

        self.append_log(&res)?;
        Ok(res)
    }

    async fn transform_file(
        &self,
        input: &Path,
        output: &Path,
        overwrite: bool,
        _prompt_type: PromptType,
    ) -> Result<PathBuf, InjectionError> {
        if is_cache_hit(output, overwrite).await {
            debug!("entity-linking cache hit: {}", output.display());
            return Ok(output.to_path_buf());
        }

        info!("writing entity-linking results to {}", output.display());
        let stats = transform_pairs(self, input, output).await?;
        info!(
            "entity linking: {} lines written, {} dropped",
            stats.written, stats.dropped
        );
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::entity_linking::TypePrediction;
    use crate::services::error::ServiceError;

    fn span(start: usize, ln: usize, label: Option<&str>) -> LinkedSpan {
        LinkedSpan::new(
            start,
            ln,
            label
                .map(|l| vec![TypePrediction::new(l, 0.9)])
                .unwrap_or_default(),
        )
    }

    #[test]
    fn test_spans_applied_back_to_front() {
        let value = "the lg 24 lds4821ww dishwasher";
        let spans = vec![span(4, 2, Some("organization")), span(20, 10, Some("product"))];

        assert_eq!(
            apply_spans(value, &spans, ZeroPredictionPolicy::Reset),
            "the lg (organization) 24 lds4821ww dishwasher (product)"
        );
    }

    #[test]
    fn test_char_offsets_with_multibyte_text() {
        let value = "café münchen gmbh";
        let spans = vec![span(5, 7, Some("city"))];

        assert_eq!(
            apply_spans(value, &spans, ZeroPredictionPolicy::Reset),
            "café münchen (city) gmbh"
        );
    }

    #[test]
    fn test_zero_prediction_reset_discards_later_edits() {
        let value = "alpha beta gamma";
        let spans = vec![
            span(0, 5, Some("a")),
            span(6, 4, None),
            span(11, 5, Some("g")),
        ];

        assert_eq!(
            apply_spans(value, &spans, ZeroPredictionPolicy::Reset),
            "alpha (a) beta gamma"
        );
        assert_eq!(
            apply_spans(value, &spans, ZeroPredictionPolicy::Skip),
            "alpha (a) beta gamma (g)"
        );
    }

    #[test]
    fn test_bad_spans_ignored() {
        let value = "short";
        let spans = vec![span(2, 10, Some("x")), span(0, 3, Some("y")), span(1, 3, Some("z"))];

        // 1+3 overlaps nothing yet and is accepted first; 0+3 overlaps it.
        assert_eq!(
            apply_spans(value, &spans, ZeroPredictionPolicy::Reset),
            "shor (z)t"
        );
    }

    #[test]
    fn test_reset_lifts_overlap_floor() {
        let value = "alpha beta gamma";
        let spans = vec![span(0, 9, Some("a")), span(6, 1, None), span(8, 8, Some("c"))];

        // 8+8 is discarded by the reset, so 0+9 no longer overlaps anything.
        assert_eq!(
            apply_spans(value, &spans, ZeroPredictionPolicy::Reset),
            "alpha bet (a)a gamma"
        );
    }

    #[test]
    fn test_overflowing_span_ignored() {
        let value = "lg dishwasher";
        let spans = vec![span(3, usize::MAX, Some("x")), span(0, 2, Some("company"))];

        assert_eq!(
            apply_spans(value, &spans, ZeroPredictionPolicy::Reset),
            "lg (company) dishwasher"
        );
    }

    struct FixedLinker;

    #[async_trait]
    impl EntityLinker for FixedLinker {
        fn backend_id(&self) -> &str {
            "fixed"
        }

        async fn process_text(&self, text: &str) -> Result<Vec<LinkedSpan>, ServiceError> {
            Ok(match text.find("vldb") {
                Some(i) => vec![span(text[..i].chars().count(), 4, Some("conference"))],
                None => Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_transform_and_side_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("output/refined_outputs.txt");
        let task = Arc::new(TaskConfig::single_file(Path::new("train.txt")));
        let mut annotator = EntityLinkingAnnotator::new(
            task,
            Arc::new(FixedLinker),
            log_path.clone(),
            ZeroPredictionPolicy::default(),
        );
        annotator.initialize().await.unwrap();

        let out = annotator
            .transform("COL venue VAL vldb COL price VAL   COL year VAL 1994")
            .await
            .unwrap();
        assert_eq!(out, "COL venue VAL vldb (conference) COL price VAL  COL year VAL 1994");

        annotator.transform("COL title VAL x").await.unwrap();
        assert_eq!(
            std::fs::read_to_string(&log_path).unwrap(),
            "COL venue VAL vldb (conference) COL price VAL  COL year VAL 1994\nCOL title VAL x\n"
        );
    }

    #[tokio::test]
    async fn test_transform_before_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let annotator = EntityLinkingAnnotator::new(
            Arc::new(TaskConfig::single_file(Path::new("train.txt"))),
            Arc::new(FixedLinker),
            dir.path().join("log.txt"),
            ZeroPredictionPolicy::Skip,
        );

        let err = annotator.transform("COL a VAL b").await.unwrap_err();
        assert!(matches!(err, InjectionError::NotInitialized(_)));
    }
}
