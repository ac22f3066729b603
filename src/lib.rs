//! dkinject - domain-knowledge injection for entity-matching datasets.
//!
//! Rewrites serialized record pairs (`COL name VAL value ...`) with
//! annotations from NER, entity linking or column-type inference before they
//! are fed to a matching model.

pub mod config;
pub mod record;
pub mod services;
