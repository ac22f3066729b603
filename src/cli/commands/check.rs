//! Model service availability check command.

use console::style;
use dkinject::config::Config;
use dkinject::services::injection::{
    build_column_type_services, build_entity_linker, build_ner_backend,
};
use dkinject::services::InjectorKind;

fn print_status(name: &str, backend: &str, available: bool, hint: &str) {
    let status = if available {
        style("✓ available").green()
    } else {
        style("✗ not available").red()
    };
    println!("  {:<22} {:<12} {}", name, backend, status);
    if !available && !hint.is_empty() {
        println!("  {:<35} {}", "", style(hint).dim());
    }
}

/// Check that the services behind each injector respond.
pub async fn cmd_check(config: &Config, only: Option<InjectorKind>) -> anyhow::Result<()> {
    let wants = |kind: InjectorKind| only.is_none_or(|k| k == kind);
    let mut all_ok = true;

    println!("\n{}", style("Model Service Status").bold());
    println!("{}", "-".repeat(50));

    if wants(InjectorKind::General) {
        let ner = build_ner_backend(&config.ner)?;
        let ok = ner.is_available().await;
        all_ok &= ok;
        print_status("NER", ner.backend_id(), ok, &ner.availability_hint());
    }

    if wants(InjectorKind::EntityLinking) {
        let linker = build_entity_linker(&config.entity_linking)?;
        let ok = linker.is_available().await;
        all_ok &= ok;
        print_status(
            "Entity linking",
            linker.backend_id(),
            ok,
            &linker.availability_hint(),
        );
    }

    if wants(InjectorKind::ColumnType) {
        let (extractor, predictor) = build_column_type_services(&config.column_type)?;
        let ok = extractor.is_available().await;
        all_ok &= ok;
        print_status(
            "Column features",
            extractor.extractor_id(),
            ok,
            &extractor.availability_hint(),
        );
        let ok = predictor.is_available().await;
        all_ok &= ok;
        print_status(
            "Column types",
            predictor.predictor_id(),
            ok,
            &predictor.availability_hint(),
        );
    }

    if only == Some(InjectorKind::Identity) {
        println!("  identity injector needs no services");
    }

    println!();
    println!(
        "  {:<22} {}",
        "Output directory",
        config.output_dir().display()
    );
    println!(
        "  {:<22} {}",
        "Task registry",
        config.task_configs_path().display()
    );

    if !all_ok {
        println!(
            "\n{} Some services are unreachable; injectors that need them will fail to initialize.",
            style("!").yellow()
        );
    }

    Ok(())
}
