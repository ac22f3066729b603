//! Service layer for dkinject.
//!
//! Model-service handles (NER, entity linking, column typing) and the
//! injectors built on top of them. Services can be used by the CLI or
//! embedded directly.

pub mod column_type;
pub mod entity_linking;
pub mod error;
pub mod http;
pub mod injection;
pub mod ner;

#[allow(unused_imports)]
pub use column_type::{
    ColumnSample, ColumnTypePredictor, FeatureExtractor, FeatureTable,
    HeuristicColumnTypePredictor, HttpColumnTypePredictor, HttpFeatureExtractor,
    StatisticalFeatureExtractor,
};
#[allow(unused_imports)]
pub use entity_linking::{EntityLinker, HttpEntityLinker, LinkedSpan, TypePrediction};
pub use error::ServiceError;
#[allow(unused_imports)]
pub use injection::{
    build_injector, InjectionError, InjectionEvent, InjectionManager, Injector, InjectorKind,
    PromptType,
};
#[allow(unused_imports)]
pub use ner::{EntitySpan, HttpNerBackend, NerBackend, NerDoc, RuleNerBackend, Token};
