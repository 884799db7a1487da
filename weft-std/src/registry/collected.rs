//! Behaviors registered at link time through `inventory`.
//!
//! Each `#[weft::behavior]` function submits a [`BehaviorRegistration`];
//! [`BehaviorRegistry::global`] gathers all of them into one process-wide
//! registry the first time it is called.

use super::{BehaviorRegistry, BehaviorRegistryBuilder};
use std::sync::{Arc, OnceLock};
use weft_core::{BoxError, Capability, Conf, Value};

/// Signature of a link-time registered behavior.
pub type BehaviorFn = fn(&Conf, Option<Value>) -> Result<Capability, BoxError>;

/// Registration entry for a behavior in the global registry.
///
/// This struct is submitted to `inventory` for automatic collection.
pub struct BehaviorRegistration {
    /// Namespace part of the qualified name.
    pub namespace: &'static str,
    /// Symbol part of the qualified name.
    pub symbol: &'static str,
    /// The behavior factory.
    pub factory: BehaviorFn,
}

impl BehaviorRegistration {
    /// Create a registration entry.
    pub const fn new(namespace: &'static str, symbol: &'static str, factory: BehaviorFn) -> Self {
        Self {
            namespace,
            symbol,
            factory,
        }
    }
}

inventory::collect!(BehaviorRegistration);

impl BehaviorRegistryBuilder {
    /// Add every behavior registered through `inventory`.
    pub fn collected(mut self) -> Self {
        for registration in inventory::iter::<BehaviorRegistration>() {
            self.define_behavior_mut(
                registration.namespace,
                registration.symbol,
                registration.factory,
            );
        }
        self
    }
}

static GLOBAL: OnceLock<Arc<BehaviorRegistry>> = OnceLock::new();

impl BehaviorRegistry {
    /// The process-wide registry of `inventory`-registered behaviors.
    pub fn global() -> Arc<BehaviorRegistry> {
        GLOBAL
            .get_or_init(|| {
                let registry = BehaviorRegistryBuilder::new().collected().build();

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    behaviors = inventory::iter::<BehaviorRegistration>().count(),
                    "built global behavior registry"
                );

                Arc::new(registry)
            })
            .clone()
    }
}
