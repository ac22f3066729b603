//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod inject;
mod transform;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dkinject::config::{Config, LoadOptions};
use dkinject::services::{InjectorKind, PromptType};

#[derive(Parser)]
#[command(name = "dkinject")]
#[command(about = "Domain-knowledge injection for entity-matching datasets")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Inject domain knowledge into the train, valid and test splits of a task
    Inject {
        /// Task name in the task registry (e.g. Structured/Beer)
        #[arg(short, long)]
        task: String,
        /// Injector to run
        #[arg(long, value_enum, default_value = "identity")]
        dk: InjectorKind,
        /// Prompt template for column-type injection (0, 1 or 2)
        #[arg(long, default_value = "1", value_parser = parse_prompt_type)]
        prompt: PromptType,
        /// Recompute outputs even when a cached file exists
        #[arg(long)]
        overwrite: bool,
        /// Task registry path (overrides config)
        #[arg(long)]
        configs: Option<PathBuf>,
    },

    /// Inject domain knowledge into a single record pair file
    TransformFile {
        /// Input record pair file
        input: PathBuf,
        /// Output path (defaults to the input path plus the injector's suffix)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Injector to run
        #[arg(long, value_enum, default_value = "identity")]
        dk: InjectorKind,
        /// Prompt template for column-type injection (0, 1 or 2)
        #[arg(long, default_value = "1", value_parser = parse_prompt_type)]
        prompt: PromptType,
        /// Recompute the output even when a cached file exists
        #[arg(long)]
        overwrite: bool,
    },

    /// Check availability of the configured model services
    Check {
        /// Only check the services used by this injector
        #[arg(long, value_enum)]
        dk: Option<InjectorKind>,
    },
}

fn parse_prompt_type(s: &str) -> Result<PromptType, String> {
    let code: i64 = s
        .parse()
        .map_err(|_| format!("'{}' is not an integer", s))?;
    PromptType::from_code(code).map_err(|e| e.to_string())
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let config = Config::load_with_options(&options)
        .await
        .map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Inject {
            task,
            dk,
            prompt,
            overwrite,
            configs,
        } => inject::cmd_inject(&config, &task, dk, prompt, overwrite, configs).await,
        Commands::TransformFile {
            input,
            output,
            dk,
            prompt,
            overwrite,
        } => {
            transform::cmd_transform_file(&config, &input, output, dk, prompt, overwrite).await
        }
        Commands::Check { dk } => check::cmd_check(&config, dk).await,
    }
}
