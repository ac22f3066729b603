//! Progress display for injection runs.
//!
//! Consumes `InjectionEvent`s from the manager and renders them with a
//! spinner and one status line per split.

use std::time::Duration;

use console::style;
use dkinject::services::InjectionEvent;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Spawn a task that renders events until the sender side is dropped.
pub fn spawn_event_renderer(
    mut event_rx: mpsc::Receiver<InjectionEvent>,
) -> anyhow::Result<JoinHandle<()>> {
    let spinner_style =
        ProgressStyle::default_spinner().template("{spinner:.green} {wide_msg}")?;

    Ok(tokio::spawn(async move {
        let mut spinner: Option<ProgressBar> = None;

        while let Some(event) = event_rx.recv().await {
            match event {
                InjectionEvent::Started {
                    task,
                    injector,
                    total_splits,
                } => {
                    println!(
                        "{} Injecting {} knowledge into {} ({} splits)",
                        style("→").cyan(),
                        injector,
                        task,
                        total_splits
                    );
                }
                InjectionEvent::SplitStarted { split, input, .. } => {
                    let bar = ProgressBar::new_spinner();
                    bar.set_style(spinner_style.clone());
                    bar.enable_steady_tick(Duration::from_millis(120));
                    bar.set_message(format!("{}: {}", split, input.display()));
                    spinner = Some(bar);
                }
                InjectionEvent::SplitCached { split, output } => {
                    println!(
                        "  {} {:<6} {} {}",
                        style("○").dim(),
                        split,
                        output.display(),
                        style("(cached)").dim()
                    );
                }
                InjectionEvent::SplitCompleted {
                    split,
                    output,
                    bytes,
                } => {
                    if let Some(bar) = spinner.take() {
                        bar.finish_and_clear();
                    }
                    println!(
                        "  {} {:<6} {} {}",
                        style("✓").green(),
                        split,
                        output.display(),
                        style(format!("({} bytes)", bytes)).dim()
                    );
                }
                InjectionEvent::SplitFailed { split, error } => {
                    if let Some(bar) = spinner.take() {
                        bar.finish_and_clear();
                    }
                    println!("  {} {:<6} {}", style("✗").red(), split, error);
                }
                InjectionEvent::Complete { written, cached } => {
                    println!(
                        "{} Done: {} written, {} cached",
                        style("✓").green(),
                        written,
                        cached
                    );
                }
            }
        }

        if let Some(bar) = spinner.take() {
            bar.finish_and_clear();
        }
    }))
}
