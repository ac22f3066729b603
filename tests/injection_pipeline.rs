//! Injection pipeline tests
//!
//! Runs every injector through its file contract with in-process fake
//! services. The fakes count their calls so cached runs can be shown to do
//! no model work.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dkinject::config::TaskConfig;
use dkinject::services::column_type::{
    ColumnSample, ColumnTypePredictor, FeatureExtractor, FeatureTable,
};
use dkinject::services::entity_linking::{EntityLinker, LinkedSpan, TypePrediction};
use dkinject::services::injection::{
    ColumnTypeAnnotator, EntityLinkingAnnotator, GeneralAnnotator, IdentityInjector,
    InjectionManager, Injector, PromptType, ZeroPredictionPolicy,
};
use dkinject::services::ner::{NerBackend, NerDoc, Token};
use dkinject::services::ServiceError;
use tokio::sync::mpsc;

// ============================================================================
// Fake services
// ============================================================================

#[derive(Default)]
struct CountingNer {
    calls: AtomicUsize,
}

#[async_trait]
impl NerBackend for CountingNer {
    fn backend_id(&self) -> &str {
        "counting"
    }

    async fn analyze(&self, text: &str) -> Result<NerDoc, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(NerDoc {
            tokens: text.split_whitespace().map(Token::new).collect(),
            entities: Vec::new(),
        })
    }
}

/// Links "apple" and "pear" wherever they occur.
#[derive(Default)]
struct FruitLinker {
    calls: AtomicUsize,
}

#[async_trait]
impl EntityLinker for FruitLinker {
    fn backend_id(&self) -> &str {
        "fruit"
    }

    async fn process_text(&self, text: &str) -> Result<Vec<LinkedSpan>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut spans = Vec::new();
        for (word, label) in [("apple", "company"), ("pear", "fruit")] {
            if let Some(i) = text.find(word) {
                spans.push(LinkedSpan::new(
                    text[..i].chars().count(),
                    word.len(),
                    vec![TypePrediction::new(label, 0.8)],
                ));
            }
        }
        spans.sort_by_key(|s| s.start);
        Ok(spans)
    }
}

/// Writes one `index` feature per column sample.
#[derive(Default)]
struct IndexExtractor {
    calls: AtomicUsize,
}

#[async_trait]
impl FeatureExtractor for IndexExtractor {
    fn extractor_id(&self) -> &str {
        "index"
    }

    async fn extract(&self, path: &Path, samples: &[ColumnSample]) -> Result<(), ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        FeatureTable {
            feature_names: vec!["index".to_string()],
            rows: (0..samples.len()).map(|i| vec![i as f32]).collect(),
        }
        .write_csv(path)
    }
}

/// Labels each feature row `type<index>`.
#[derive(Default)]
struct IndexPredictor {
    calls: AtomicUsize,
}

#[async_trait]
impl ColumnTypePredictor for IndexPredictor {
    fn predictor_id(&self) -> &str {
        "index"
    }

    async fn predict(&self, features: &FeatureTable) -> Result<Vec<String>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..features.len())
            .map(|row| format!("type{}", features.get(row, "index").unwrap_or(-1.0)))
            .collect())
    }
}

fn task(path: &Path) -> Arc<TaskConfig> {
    Arc::new(TaskConfig::single_file(path))
}

const GOOD_LINES: &str = "\
COL name VAL lds4821ww dishwasher COL price VAL 24.50\tCOL name VAL lg dishwasher COL price VAL 3.0\t1
COL name VAL with apple, pear COL price VAL \tCOL name VAL pear COL price VAL 10\t0
";

const BAD_LINES: &str = "\
just one field
COL a VAL 1\tCOL a VAL 2
a\tb\tc\td
";

// ============================================================================
// File contract
// ============================================================================

#[tokio::test]
async fn test_cached_output_means_zero_model_calls() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("train.txt");
    let output = dir.path().join("train.txt.dk");
    std::fs::write(&input, GOOD_LINES).unwrap();

    let ner = Arc::new(CountingNer::default());
    let mut injector = GeneralAnnotator::new(task(&input), ner.clone());
    injector.initialize().await.unwrap();

    injector
        .transform_file(&input, &output, false, PromptType::default())
        .await
        .unwrap();
    let first = std::fs::read_to_string(&output).unwrap();
    assert_eq!(ner.calls.load(Ordering::SeqCst), 4);

    injector
        .transform_file(&input, &output, false, PromptType::default())
        .await
        .unwrap();
    assert_eq!(ner.calls.load(Ordering::SeqCst), 4);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), first);

    injector
        .transform_file(&input, &output, true, PromptType::default())
        .await
        .unwrap();
    assert_eq!(ner.calls.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn test_general_output_and_field_count_filter() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("valid.txt");
    let output = dir.path().join("valid.txt.dk");
    std::fs::write(&input, format!("{}{}", BAD_LINES, GOOD_LINES)).unwrap();

    let mut injector = GeneralAnnotator::new(task(&input), Arc::new(CountingNer::default()));
    injector.initialize().await.unwrap();
    injector
        .transform_file(&input, &output, false, PromptType::default())
        .await
        .unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "COL name VAL ID lds4821ww dishwasher COL price VAL 24.50\t\
         COL name VAL lg dishwasher COL price VAL 3\t1"
    );
}

#[tokio::test]
async fn test_entity_linking_file_and_side_log() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("test.txt");
    let output = dir.path().join("test.txt.refined.dk");
    let log_path = dir.path().join("output/refined_outputs.txt");
    std::fs::write(&input, format!("{}{}", GOOD_LINES, BAD_LINES)).unwrap();

    let linker = Arc::new(FruitLinker::default());
    let mut injector = EntityLinkingAnnotator::new(
        task(&input),
        linker.clone(),
        log_path.clone(),
        ZeroPredictionPolicy::Reset,
    );
    injector.initialize().await.unwrap();
    injector
        .transform_file(&input, &output, false, PromptType::default())
        .await
        .unwrap();

    let written = std::fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines.len(), 2);
    // Spans at offsets 5 and 12 of "with apple, pear"
    assert_eq!(
        lines[1],
        "COL name VAL with apple (company), pear (fruit) COL price VAL\t\
         COL name VAL pear (fruit) COL price VAL 10\t0"
    );

    // Empty price values are never sent to the linker.
    assert_eq!(linker.calls.load(Ordering::SeqCst), 7);

    let log = std::fs::read_to_string(&log_path).unwrap();
    assert_eq!(log.lines().count(), 4);
    assert_eq!(
        log.lines().nth(2),
        Some("COL name VAL with apple (company), pear (fruit) COL price VAL")
    );
}

// ============================================================================
// Column types
// ============================================================================

const TABLE_LINES: &str = "\
COL title VAL query optimization COL price VAL 10\tCOL title VAL query opt COL price VAL 11\t1
COL title VAL data cleaning COL price VAL 20\tCOL title VAL entity matching COL price VAL 21\t0
";

async fn column_type_output(prompt: PromptType) -> String {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("train.txt");
    let output = dir.path().join(format!("train.txt.prompt_type{}.sherlock.dk", prompt));
    std::fs::write(&input, TABLE_LINES).unwrap();

    let mut injector = ColumnTypeAnnotator::new(
        task(&input),
        Arc::new(IndexExtractor::default()),
        Arc::new(IndexPredictor::default()),
        dir.path().join("output"),
    );
    injector.initialize().await.unwrap();
    injector
        .transform_file(&input, &output, false, prompt)
        .await
        .unwrap();
    std::fs::read_to_string(&output).unwrap()
}

#[tokio::test]
async fn test_column_type_rows_stay_aligned() {
    let written = column_type_output(PromptType::Spaced).await;
    let lines: Vec<&str> = written.lines().collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(
        lines[0],
        "COL title type0 VAL query optimization COL price type1 VAL 10\t\
         COL title type0 VAL query opt COL price type1 VAL 11\t1"
    );
    assert_eq!(
        lines[1],
        "COL title type0 VAL data cleaning COL price type1 VAL 20\t\
         COL title type0 VAL entity matching COL price type1 VAL 21\t0"
    );
}

#[tokio::test]
async fn test_column_type_prompt_templates() {
    let head_tail = column_type_output(PromptType::HeadTail).await;
    let slashed = column_type_output(PromptType::Slashed).await;

    assert!(head_tail.starts_with(
        "COL <head>title</head> <tail>type0</tail> VAL query optimization \
         COL <head>price</head> <tail>type1</tail> VAL 10\t"
    ));
    assert!(slashed.starts_with("COL title /type0 VAL query optimization COL price /type1 VAL 10\t"));
}

#[tokio::test]
async fn test_column_type_cache_skips_models() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("train.txt");
    let output = dir.path().join("train.txt.prompt_type1.sherlock.dk");
    std::fs::write(&input, TABLE_LINES).unwrap();
    std::fs::write(&output, "cached\n").unwrap();

    let extractor = Arc::new(IndexExtractor::default());
    let predictor = Arc::new(IndexPredictor::default());
    let mut injector = ColumnTypeAnnotator::new(
        task(&input),
        extractor.clone(),
        predictor.clone(),
        dir.path().join("output"),
    );
    injector.initialize().await.unwrap();
    injector
        .transform_file(&input, &output, false, PromptType::Spaced)
        .await
        .unwrap();

    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "cached\n");
}

#[tokio::test]
async fn test_column_type_malformed_line_aborts() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("train.txt");
    let output = dir.path().join("train.txt.prompt_type1.sherlock.dk");
    std::fs::write(&input, format!("{}just one field\n", TABLE_LINES)).unwrap();

    let mut injector = ColumnTypeAnnotator::new(
        task(&input),
        Arc::new(IndexExtractor::default()),
        Arc::new(IndexPredictor::default()),
        dir.path().join("output"),
    );
    injector.initialize().await.unwrap();
    let err = injector
        .transform_file(&input, &output, false, PromptType::Spaced)
        .await
        .unwrap_err();

    assert!(err.to_string().starts_with("line 3:"));
    assert!(!output.exists());
}

// ============================================================================
// Task runs
// ============================================================================

#[tokio::test]
async fn test_manager_runs_general_over_splits() {
    let dir = tempfile::tempdir().unwrap();
    for split in ["train", "valid", "test"] {
        std::fs::write(dir.path().join(format!("{}.txt", split)), GOOD_LINES).unwrap();
    }
    let task = Arc::new(TaskConfig {
        name: "Dirty/Walmart-Amazon".to_string(),
        trainset: dir.path().join("train.txt"),
        validset: dir.path().join("valid.txt"),
        testset: dir.path().join("test.txt"),
        extra: Default::default(),
    });

    let ner = Arc::new(CountingNer::default());
    let mut injector = GeneralAnnotator::new(task.clone(), ner.clone());
    injector.initialize().await.unwrap();

    let manager = InjectionManager::new(PromptType::default(), false);
    let (tx, mut rx) = mpsc::channel(32);
    let result = manager.run_splits(&injector, &task, tx).await.unwrap();
    while rx.recv().await.is_some() {}

    assert_eq!(result.written, 3);
    assert_eq!(ner.calls.load(Ordering::SeqCst), 12);
    for split in ["train", "valid", "test"] {
        assert!(dir.path().join(format!("{}.txt.dk", split)).exists());
    }

    let (tx, _rx) = mpsc::channel(32);
    let again = manager.run_splits(&injector, &task, tx).await.unwrap();
    assert_eq!(again.cached, 3);
    assert_eq!(ner.calls.load(Ordering::SeqCst), 12);
}

#[tokio::test]
async fn test_identity_run_does_not_shadow_general_cache() {
    let dir = tempfile::tempdir().unwrap();
    for split in ["train", "valid", "test"] {
        std::fs::write(
            dir.path().join(format!("{}.txt", split)),
            "COL p VAL 3.0\tCOL p VAL lds4821ww\t1\n",
        )
        .unwrap();
    }
    let task = Arc::new(TaskConfig {
        name: "Structured/Beer".to_string(),
        trainset: dir.path().join("train.txt"),
        validset: dir.path().join("valid.txt"),
        testset: dir.path().join("test.txt"),
        extra: Default::default(),
    });
    let manager = InjectionManager::new(PromptType::default(), false);

    let (tx, _rx) = mpsc::channel(32);
    let plain = manager
        .run_splits(&IdentityInjector::new(), &task, tx)
        .await
        .unwrap();
    assert_eq!(plain.written, 3);

    let ner = Arc::new(CountingNer::default());
    let mut injector = GeneralAnnotator::new(task.clone(), ner.clone());
    injector.initialize().await.unwrap();

    let (tx, _rx) = mpsc::channel(32);
    let general = manager.run_splits(&injector, &task, tx).await.unwrap();

    assert_eq!(general.written, 3);
    assert_eq!(general.cached, 0);
    assert_eq!(ner.calls.load(Ordering::SeqCst), 6);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("train.txt.dk")).unwrap(),
        "COL p VAL 3\tCOL p VAL ID lds4821ww\t1\n"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("train.txt.identity.dk")).unwrap(),
        "COL p VAL 3.0\tCOL p VAL lds4821ww\t1\n"
    );
}
