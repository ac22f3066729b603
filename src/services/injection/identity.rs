//! Pass-through injector, used when no domain knowledge is requested.

use async_trait::async_trait;

use super::injector::Injector;
use super::types::InjectorKind;

/// Copies well-formed pair lines unchanged.
#[derive(Debug, Default)]
pub struct IdentityInjector;

impl IdentityInjector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Injector for IdentityInjector {
    fn kind(&self) -> InjectorKind {
        InjectorKind::Identity
    }

    fn display_name(&self) -> &str {
        "Identity"
    }
}
