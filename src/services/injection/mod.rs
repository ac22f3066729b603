//! Domain-knowledge injection.
//!
//! An `Injector` rewrites serialized record pairs, adding annotations from
//! NER, entity linking or column typing. The `InjectionManager` runs one
//! injector over the splits of a task and reports progress as
//! `InjectionEvent`s.

mod column_type;
mod entity_linking;
mod factory;
mod general;
mod identity;
mod injector;
mod manager;
mod prompt;
mod reconstruct;
mod types;

pub use column_type::{format_row, serialize_tables, ColumnTypeAnnotator};
pub use entity_linking::{apply_spans, EntityLinkingAnnotator, ZeroPredictionPolicy};
pub use factory::{
    build_column_type_services, build_entity_linker, build_injector, build_ner_backend,
};
pub use general::{annotate, normalize_token, GeneralAnnotator, INJECTED_LABELS};
pub use identity::IdentityInjector;
pub use injector::{is_cache_hit, transform_pairs, Injector};
pub use manager::InjectionManager;
pub use prompt::PromptType;
pub use reconstruct::{PairTables, SideTable};
pub use types::{
    InjectionError, InjectionEvent, InjectionRunResult, InjectorKind, Split, TransformStats,
};
