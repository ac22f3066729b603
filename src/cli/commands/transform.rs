//! Single-file injection command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;
use dkinject::config::{Config, TaskConfig};
use dkinject::services::injection::is_cache_hit;
use dkinject::services::{build_injector, InjectorKind, PromptType};

/// Inject domain knowledge into one record pair file.
pub async fn cmd_transform_file(
    config: &Config,
    input: &Path,
    output: Option<PathBuf>,
    kind: InjectorKind,
    prompt: PromptType,
    overwrite: bool,
) -> anyhow::Result<()> {
    let output = output.unwrap_or_else(|| kind.output_path(input, prompt));

    // Skip model start-up entirely when the output is already cached.
    if is_cache_hit(&output, overwrite).await {
        println!(
            "{} {} {}",
            style("○").dim(),
            output.display(),
            style("(cached)").dim()
        );
        return Ok(());
    }

    let task = Arc::new(TaskConfig::single_file(input));
    let mut injector = build_injector(kind, task, config)?;
    injector.initialize().await?;

    let path = injector
        .transform_file(input, &output, overwrite, prompt)
        .await?;
    println!(
        "{} {} → {}",
        style("✓").green(),
        injector.display_name(),
        path.display()
    );
    Ok(())
}
