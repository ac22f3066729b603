//! Injection manager: runs one injector over the splits of a task.

use std::path::Path;

use tokio::sync::mpsc;
use tracing::warn;

use super::injector::{is_cache_hit, Injector};
use super::prompt::PromptType;
use super::types::{InjectionError, InjectionEvent, InjectionRunResult, Split};
use crate::config::TaskConfig;

/// Drives an initialized injector over the train, valid and test splits.
///
/// Outputs go next to each input, named by the injector kind's suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct InjectionManager {
    prompt_type: PromptType,
    overwrite: bool,
}

impl InjectionManager {
    pub fn new(prompt_type: PromptType, overwrite: bool) -> Self {
        Self {
            prompt_type,
            overwrite,
        }
    }

    pub fn prompt_type(&self) -> PromptType {
        self.prompt_type
    }

    /// Input file of `split`.
    pub fn split_input(task: &TaskConfig, split: Split) -> &Path {
        match split {
            Split::Train => &task.trainset,
            Split::Valid => &task.validset,
            Split::Test => &task.testset,
        }
    }

    /// Transform every split in order, emitting progress events.
    ///
    /// The caller owns the receiver and decides how to present progress.
    /// The first failing split aborts the run.
    pub async fn run_splits(
        &self,
        injector: &dyn Injector,
        task: &TaskConfig,
        event_tx: mpsc::Sender<InjectionEvent>,
    ) -> Result<InjectionRunResult, InjectionError> {
        let _ = event_tx
            .send(InjectionEvent::Started {
                task: task.name.clone(),
                injector: injector.kind(),
                total_splits: Split::ALL.len(),
            })
            .await;

        let mut result = InjectionRunResult::default();

        for split in Split::ALL {
            let input = Self::split_input(task, split);
            let output = injector.kind().output_path(input, self.prompt_type);

            if is_cache_hit(&output, self.overwrite).await {
                let _ = event_tx
                    .send(InjectionEvent::SplitCached {
                        split,
                        output: output.clone(),
                    })
                    .await;
                result.cached += 1;
                result.outputs.push((split, output));
                continue;
            }

            let _ = event_tx
                .send(InjectionEvent::SplitStarted {
                    split,
                    input: input.to_path_buf(),
                    output: output.clone(),
                })
                .await;

            match injector
                .transform_file(input, &output, self.overwrite, self.prompt_type)
                .await
            {
                Ok(path) => {
                    let bytes = tokio::fs::metadata(&path)
                        .await
                        .map(|m| m.len())
                        .unwrap_or(0);
                    let _ = event_tx
                        .send(InjectionEvent::SplitCompleted {
                            split,
                            output: path.clone(),
                            bytes,
                        })
                        .await;
                    result.written += 1;
                    result.outputs.push((split, path));
                }
                Err(e) => {
                    warn!("{} split of {} failed: {}", split, task.name, e);
                    let _ = event_tx
                        .send(InjectionEvent::SplitFailed {
                            split,
                            error: e.to_string(),
                        })
                        .await;
                    return Err(e);
                }
            }
        }

        let _ = event_tx
            .send(InjectionEvent::Complete {
                written: result.written,
                cached: result.cached,
            })
            .await;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::injection::identity::IdentityInjector;
    use crate::services::injection::InjectorKind;
    use std::collections::HashMap;

    fn task(dir: &Path) -> TaskConfig {
        for split in ["train", "valid", "test"] {
            std::fs::write(
                dir.join(format!("{}.txt", split)),
                format!("COL split VAL {}\tCOL split VAL {}\t1\n", split, split),
            )
            .unwrap();
        }
        TaskConfig {
            name: "Structured/Beer".to_string(),
            trainset: dir.join("train.txt"),
            validset: dir.join("valid.txt"),
            testset: dir.join("test.txt"),
            extra: HashMap::new(),
        }
    }

    async fn drain(mut rx: mpsc::Receiver<InjectionEvent>) -> Vec<InjectionEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_run_splits_then_cached() {
        let dir = tempfile::tempdir().unwrap();
        let task = task(dir.path());
        let manager = InjectionManager::new(PromptType::default(), false);
        let injector = IdentityInjector::new();

        let (tx, rx) = mpsc::channel(32);
        let result = manager.run_splits(&injector, &task, tx).await.unwrap();
        let events = drain(rx).await;

        assert_eq!(result.written, 3);
        assert_eq!(result.cached, 0);
        assert_eq!(
            result.output(Split::Valid).unwrap(),
            dir.path().join("valid.txt.identity.dk")
        );
        assert!(matches!(
            events.first(),
            Some(InjectionEvent::Started {
                injector: InjectorKind::Identity,
                total_splits: 3,
                ..
            })
        ));
        assert!(matches!(
            events.last(),
            Some(InjectionEvent::Complete {
                written: 3,
                cached: 0
            })
        ));

        let (tx, rx) = mpsc::channel(32);
        let again = manager.run_splits(&injector, &task, tx).await.unwrap();
        let events = drain(rx).await;

        assert_eq!(again.cached, 3);
        assert_eq!(
            events
                .iter()
                .filter(|e| matches!(e, InjectionEvent::SplitCached { .. }))
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_run_splits_stops_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = task(dir.path());
        task.validset = dir.path().join("missing.txt");
        let manager = InjectionManager::new(PromptType::default(), false);

        let (tx, rx) = mpsc::channel(32);
        let err = manager
            .run_splits(&IdentityInjector::new(), &task, tx)
            .await
            .unwrap_err();
        let events = drain(rx).await;

        assert!(matches!(err, InjectionError::Io { .. }));
        assert!(matches!(
            events.last(),
            Some(InjectionEvent::SplitFailed {
                split: Split::Valid,
                ..
            })
        ));
        assert!(!dir.path().join("test.txt.identity.dk").exists());
    }
}
