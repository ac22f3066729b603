//! Configuration management for dkinject using the prefer crate.
//!
//! Two kinds of configuration are loaded here:
//! - `Config`: injector and model-service settings (`dkinject.{toml,yaml,json}`)
//! - `TaskConfig`: the task registry (`configs.json`) naming each task's splits

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::services::injection::ZeroPredictionPolicy;

/// Default directory for side logs and intermediate artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// Default task registry file.
pub const DEFAULT_TASK_CONFIGS: &str = "configs.json";

/// Which NER implementation the general annotator uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NerBackendKind {
    /// Built-in rule tagger (no external model).
    #[default]
    Rule,
    /// Remote NER server.
    Http,
}

/// Which column-type pipeline the column-type annotator uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnTypeBackendKind {
    /// Built-in statistical features + heuristic typing.
    #[default]
    Heuristic,
    /// Remote feature-extraction and prediction server.
    Http,
}

/// NER service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NerConfig {
    #[serde(default)]
    pub backend: NerBackendKind,
    /// Server endpoint (used by the http backend)
    #[serde(default = "default_ner_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Entity-linking service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityLinkingConfig {
    #[serde(default = "default_el_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Side-log file name, relative to `output_dir`
    #[serde(default = "default_el_log_file")]
    pub log_file: String,
    /// What a span without predicted types does to earlier edits
    #[serde(default)]
    pub zero_prediction: ZeroPredictionPolicy,
}

/// Column-type service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnTypeConfig {
    #[serde(default)]
    pub backend: ColumnTypeBackendKind,
    /// Server endpoint (used by the http backend)
    #[serde(default = "default_column_type_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_ner_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_el_endpoint() -> String {
    "http://localhost:5555".to_string()
}

fn default_column_type_endpoint() -> String {
    "http://localhost:8501".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_el_log_file() -> String {
    "refined_outputs.txt".to_string()
}

fn default_output_dir() -> String {
    DEFAULT_OUTPUT_DIR.to_string()
}

fn default_task_configs() -> String {
    DEFAULT_TASK_CONFIGS.to_string()
}

impl Default for NerConfig {
    fn default() -> Self {
        Self {
            backend: NerBackendKind::default(),
            endpoint: default_ner_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for EntityLinkingConfig {
    fn default() -> Self {
        Self {
            endpoint: default_el_endpoint(),
            timeout_secs: default_timeout_secs(),
            log_file: default_el_log_file(),
            zero_prediction: ZeroPredictionPolicy::default(),
        }
    }
}

impl Default for ColumnTypeConfig {
    fn default() -> Self {
        Self {
            backend: ColumnTypeBackendKind::default(),
            endpoint: default_column_type_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Injector configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory for side logs and feature tables
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Task registry path
    #[serde(default = "default_task_configs")]
    pub task_configs: String,
    #[serde(default)]
    pub ner: NerConfig,
    #[serde(default)]
    pub entity_linking: EntityLinkingConfig,
    #[serde(default)]
    pub column_type: ColumnTypeConfig,
    /// Path of the file this config was loaded from
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            task_configs: default_task_configs(),
            ner: NerConfig::default(),
            entity_linking: EntityLinkingConfig::default(),
            column_type: ColumnTypeConfig::default(),
            source_path: None,
        }
    }
}

/// Options controlling where configuration is loaded from.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (skips discovery)
    pub config_path: Option<PathBuf>,
    /// Resolve relative paths from CWD instead of the config file location
    pub use_cwd: bool,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers dkinject config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("dkinject").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("{}; using defaults", e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            Err(_) => Self::default_with_env(),
        }
    }

    /// Load with explicit options; an explicit config path must parse.
    pub async fn load_with_options(options: &LoadOptions) -> Result<Self, String> {
        let mut config = match options.config_path {
            Some(ref path) => Self::load_from_path(path).await?,
            None => Self::load().await,
        };
        if options.use_cwd {
            config.source_path = None;
        }
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn default_with_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `DK_OUTPUT_DIR`: side-log and artifact directory
    /// - `DK_TASK_CONFIGS`: task registry path
    /// - `NER_ENDPOINT`: NER server (also selects the http backend)
    /// - `EL_ENDPOINT`: entity-linking server
    /// - `COLUMN_TYPE_ENDPOINT`: column-type server (also selects the http backend)
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(dir) = non_empty_env("DK_OUTPUT_DIR") {
            self.output_dir = dir;
        }
        if let Some(path) = non_empty_env("DK_TASK_CONFIGS") {
            self.task_configs = path;
        }
        if let Some(endpoint) = non_empty_env("NER_ENDPOINT") {
            self.ner.endpoint = endpoint;
            self.ner.backend = NerBackendKind::Http;
        }
        if let Some(endpoint) = non_empty_env("EL_ENDPOINT") {
            self.entity_linking.endpoint = endpoint;
        }
        if let Some(endpoint) = non_empty_env("COLUMN_TYPE_ENDPOINT") {
            self.column_type.endpoint = endpoint;
            self.column_type.backend = ColumnTypeBackendKind::Http;
        }
        self
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> PathBuf {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir().join(path)
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve_path(&self.output_dir)
    }

    pub fn task_configs_path(&self) -> PathBuf {
        self.resolve_path(&self.task_configs)
    }

    /// Entity-linking side-log location.
    pub fn entity_linking_log_path(&self) -> PathBuf {
        self.output_dir().join(&self.entity_linking.log_file)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

/// One entry of the task registry.
///
/// Keys other than the split paths (e.g. `task_type`, `vocab`) are kept in
/// `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub name: String,
    pub trainset: PathBuf,
    pub validset: PathBuf,
    pub testset: PathBuf,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TaskConfig {
    /// A single-file task, used when transforming one file outside a registry.
    pub fn single_file(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            trainset: path.to_path_buf(),
            validset: path.to_path_buf(),
            testset: path.to_path_buf(),
            extra: HashMap::new(),
        }
    }

    /// Resolve split paths relative to `base_dir`.
    pub fn resolve_against(mut self, base_dir: &Path) -> Self {
        for path in [&mut self.trainset, &mut self.validset, &mut self.testset] {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
        self
    }
}

/// Load the task registry, indexed by task name.
pub async fn load_task_configs(path: &Path) -> Result<HashMap<String, TaskConfig>, String> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("Failed to read task configs {}: {}", path.display(), e))?;
    let tasks: Vec<TaskConfig> = serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse task configs {}: {}", path.display(), e))?;

    Ok(tasks.into_iter().map(|t| (t.name.clone(), t)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output_dir, "output");
        assert_eq!(config.ner.backend, NerBackendKind::Rule);
        assert_eq!(config.column_type.backend, ColumnTypeBackendKind::Heuristic);
        assert_eq!(
            config.entity_linking.zero_prediction,
            ZeroPredictionPolicy::Reset
        );
    }

    #[tokio::test]
    async fn test_load_toml_with_partial_sections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dkinject.toml");
        std::fs::write(
            &path,
            r#"
output_dir = "runs"

[entity_linking]
log_file = "el.txt"
zero_prediction = "skip"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.output_dir, "runs");
        assert_eq!(config.entity_linking.log_file, "el.txt");
        assert_eq!(
            config.entity_linking.zero_prediction,
            ZeroPredictionPolicy::Skip
        );
        assert_eq!(config.entity_linking.timeout_secs, 300);
        assert_eq!(config.entity_linking_log_path(), dir.path().join("runs/el.txt"));
    }

    #[tokio::test]
    async fn test_load_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dkinject.yaml");
        std::fs::write(&path, "column_type:\n  backend: http\n  endpoint: http://sherlock:9000\n")
            .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.column_type.backend, ColumnTypeBackendKind::Http);
        assert_eq!(config.column_type.endpoint, "http://sherlock:9000");
    }

    #[tokio::test]
    async fn test_load_invalid_json_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dkinject.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = Config::load_from_path(&path).await.unwrap_err();
        assert!(err.contains("JSON"));
    }

    #[tokio::test]
    async fn test_load_task_configs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("configs.json");
        std::fs::write(
            &path,
            r#"[
  {"name": "Structured/Beer", "task_type": "classification", "vocab": ["0", "1"],
   "trainset": "data/beer/train.txt", "validset": "data/beer/valid.txt", "testset": "data/beer/test.txt"}
]"#,
        )
        .unwrap();

        let tasks = load_task_configs(&path).await.unwrap();
        let task = tasks.get("Structured/Beer").unwrap();
        assert_eq!(task.trainset, PathBuf::from("data/beer/train.txt"));
        assert_eq!(task.extra.get("task_type").unwrap(), "classification");

        let resolved = task.clone().resolve_against(Path::new("/data"));
        assert_eq!(resolved.testset, PathBuf::from("/data/data/beer/test.txt"));
    }

    #[test]
    fn test_single_file_task() {
        let task = TaskConfig::single_file(Path::new("/tmp/pairs.txt"));
        assert_eq!(task.name, "pairs.txt");
        assert_eq!(task.trainset, PathBuf::from("/tmp/pairs.txt"));
    }
}
