//! Build injectors and their service handles from configuration.

use std::sync::Arc;

use super::column_type::ColumnTypeAnnotator;
use super::entity_linking::EntityLinkingAnnotator;
use super::general::GeneralAnnotator;
use super::identity::IdentityInjector;
use super::injector::Injector;
use super::types::{InjectionError, InjectorKind};
use crate::config::{
    ColumnTypeBackendKind, ColumnTypeConfig, Config, EntityLinkingConfig, NerBackendKind,
    NerConfig, TaskConfig,
};
use crate::services::column_type::{
    ColumnTypePredictor, FeatureExtractor, HeuristicColumnTypePredictor, HttpColumnTypePredictor,
    HttpFeatureExtractor, StatisticalFeatureExtractor,
};
use crate::services::entity_linking::{EntityLinker, HttpEntityLinker};
use crate::services::ner::{HttpNerBackend, NerBackend, RuleNerBackend};

pub fn build_ner_backend(config: &NerConfig) -> Result<Arc<dyn NerBackend>, InjectionError> {
    Ok(match config.backend {
        NerBackendKind::Rule => Arc::new(RuleNerBackend::new()),
        NerBackendKind::Http => Arc::new(HttpNerBackend::new(
            &config.endpoint,
            config.timeout_secs,
        )?),
    })
}

pub fn build_entity_linker(
    config: &EntityLinkingConfig,
) -> Result<Arc<dyn EntityLinker>, InjectionError> {
    Ok(Arc::new(HttpEntityLinker::new(
        &config.endpoint,
        config.timeout_secs,
    )?))
}

/// Feature extractor and predictor for the configured column-type backend.
pub fn build_column_type_services(
    config: &ColumnTypeConfig,
) -> Result<(Arc<dyn FeatureExtractor>, Arc<dyn ColumnTypePredictor>), InjectionError> {
    Ok(match config.backend {
        ColumnTypeBackendKind::Heuristic => (
            Arc::new(StatisticalFeatureExtractor::new()),
            Arc::new(HeuristicColumnTypePredictor::new()),
        ),
        ColumnTypeBackendKind::Http => (
            Arc::new(HttpFeatureExtractor::new(
                &config.endpoint,
                config.timeout_secs,
            )?),
            Arc::new(HttpColumnTypePredictor::new(
                &config.endpoint,
                config.timeout_secs,
            )?),
        ),
    })
}

/// Wire the configured services into the injector for `kind`.
///
/// The returned injector still needs `initialize`.
pub fn build_injector(
    kind: InjectorKind,
    task: Arc<TaskConfig>,
    config: &Config,
) -> Result<Box<dyn Injector>, InjectionError> {
    let injector: Box<dyn Injector> = match kind {
        InjectorKind::Identity => Box::new(IdentityInjector::new()),
        InjectorKind::General => {
            Box::new(GeneralAnnotator::new(task, build_ner_backend(&config.ner)?))
        }
        InjectorKind::EntityLinking => Box::new(EntityLinkingAnnotator::new(
            task,
            build_entity_linker(&config.entity_linking)?,
            config.entity_linking_log_path(),
            config.entity_linking.zero_prediction,
        )),
        InjectorKind::ColumnType => {
            let (extractor, predictor) = build_column_type_services(&config.column_type)?;
            Box::new(ColumnTypeAnnotator::new(
                task,
                extractor,
                predictor,
                config.output_dir(),
            ))
        }
    };
    Ok(injector)
}
