//! NER labelling plus number normalization.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::injector::Injector;
use super::types::{InjectionError, InjectorKind};
use crate::config::TaskConfig;
use crate::services::ner::{NerBackend, NerDoc, Token};

/// Entity labels that get inserted into the text. Everything else the
/// tagger finds (CARDINAL, MONEY, ...) is ignored.
pub const INJECTED_LABELS: [&str; 7] =
    ["PERSON", "ORG", "LOC", "PRODUCT", "DATE", "QUANTITY", "TIME"];

/// Tokens at least this many characters long that contain a digit are
/// marked as identifiers.
const ID_MIN_CHARS: usize = 7;

/// Domain-knowledge injector for publication and product data.
///
/// Inserts the entity label in front of each recognized entity and rewrites
/// numbers into a canonical form.
pub struct GeneralAnnotator {
    task: Arc<TaskConfig>,
    ner: Arc<dyn NerBackend>,
    initialized: bool,
}

impl GeneralAnnotator {
    pub fn new(task: Arc<TaskConfig>, ner: Arc<dyn NerBackend>) -> Self {
        Self {
            task,
            ner,
            initialized: false,
        }
    }
}

#[async_trait]
impl Injector for GeneralAnnotator {
    fn kind(&self) -> InjectorKind {
        InjectorKind::General
    }

    fn display_name(&self) -> &str {
        "General (NER)"
    }

    async fn initialize(&mut self) -> Result<(), InjectionError> {
        if self.initialized {
            return Ok(());
        }
        if !self.ner.is_available().await {
            return Err(InjectionError::BackendNotAvailable(format!(
                "NER backend '{}': {}",
                self.ner.backend_id(),
                self.ner.availability_hint()
            )));
        }
        info!(
            "NER backend '{}' ready for task {}",
            self.ner.backend_id(),
            self.task.name
        );
        self.initialized = true;
        Ok(())
    }

    async fn transform(&self, entry: &str) -> Result<String, InjectionError> {
        if !self.initialized {
            return Err(InjectionError::NotInitialized(self.display_name().to_string()));
        }
        let doc = self.ner.analyze(entry).await?;
        Ok(annotate(&doc))
    }
}

/// Re-walk the tokens of `doc`, inserting labels and normalizing tokens.
pub fn annotate(doc: &NerDoc) -> String {
    let starts: HashMap<usize, &str> = doc
        .entities
        .iter()
        .filter(|e| INJECTED_LABELS.contains(&e.label.as_str()))
        .map(|e| (e.start, e.label.as_str()))
        .collect();

    let mut out: Vec<String> = Vec::with_capacity(doc.tokens.len() + starts.len());
    for (idx, token) in doc.tokens.iter().enumerate() {
        if let Some(label) = starts.get(&idx) {
            out.push((*label).to_string());
        }
        out.push(normalize_token(token));
    }

    out.join(" ").trim().to_string()
}

/// Canonical form of one token.
///
/// Numbers print as integers when whole and with two decimals otherwise.
/// Long tokens with digits are prefixed with `ID`.
pub fn normalize_token(token: &Token) -> String {
    if token.like_num {
        return match token.text.parse::<f64>() {
            Ok(val) if val.is_finite() => format_number(val),
            _ => {
                debug!("number-like token {:?} kept as text", token.text);
                token.text.clone()
            }
        };
    }

    if token.text.chars().count() >= ID_MIN_CHARS && token.text.chars().any(char::is_numeric)
    {
        return format!("ID {}", token.text);
    }

    token.text.clone()
}

fn format_number(val: f64) -> String {
    if val == val.round() {
        // `{:.0}` keeps the sign of -0.0
        let s = format!("{:.0}", val);
        if s == "-0" {
            "0".to_string()
        } else {
            s
        }
    } else {
        format!("{:.2}", val)
    }
}
