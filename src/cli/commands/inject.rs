//! Task-level injection command.

use std::path::PathBuf;
use std::sync::Arc;

use console::style;
use dkinject::config::{load_task_configs, Config};
use dkinject::services::{
    build_injector, InjectionEvent, InjectionManager, InjectorKind, PromptType,
};
use tokio::sync::mpsc;

use crate::cli::progress::spawn_event_renderer;

/// Run an injector over the train, valid and test splits of a task.
pub async fn cmd_inject(
    config: &Config,
    task_name: &str,
    kind: InjectorKind,
    prompt: PromptType,
    overwrite: bool,
    configs: Option<PathBuf>,
) -> anyhow::Result<()> {
    let registry_path = configs.unwrap_or_else(|| config.task_configs_path());
    let tasks = load_task_configs(&registry_path)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    let Some(task) = tasks.get(task_name) else {
        let mut names: Vec<&str> = tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        anyhow::bail!(
            "Unknown task '{}' in {} (available: {})",
            task_name,
            registry_path.display(),
            names.join(", ")
        );
    };

    let base_dir = registry_path
        .parent()
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    let task = Arc::new(task.clone().resolve_against(&base_dir));

    let mut injector = build_injector(kind, task.clone(), config)?;
    injector.initialize().await?;
    println!(
        "{} {} injector ready",
        style("✓").green(),
        injector.display_name()
    );

    let manager = InjectionManager::new(prompt, overwrite);
    let (event_tx, event_rx) = mpsc::channel::<InjectionEvent>(32);
    let renderer = spawn_event_renderer(event_rx)?;

    let result = manager.run_splits(injector.as_ref(), &task, event_tx).await;
    let _ = renderer.await;

    result?;
    Ok(())
}
