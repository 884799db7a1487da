//! # Behavior Registry
//!
//! Resolves behavior references stored in the configuration into live
//! [`Capability`] handles.
//!
//! The registry is organised in namespaces, each mapping symbols to
//! [`Behavior`] factories. A namespace is either defined eagerly or declared
//! with a loader that runs at most once, the first time a resolution touches
//! it. Loading is memoized per namespace, so several task attempts resolving
//! concurrently in one process never load a namespace twice.
//!
//! # Resolution
//!
//! 1. read `<component>.<id>.var` (missing → [`ConfigError::Missing`]);
//! 2. strip the `#'` marker and split at the first `/`;
//! 3. load the namespace and look up the symbol;
//! 4. read the optional `<component>.<id>.options` value;
//! 5. invoke the behavior with the configuration, plus the options when
//!    present;
//! 6. check that the capability is of the requested kind.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = BehaviorRegistryBuilder::new()
//!     .define("myns", "handler", |conf: &Conf, options: Option<Value>| {
//!         Ok(Capability::task(Handler::new(conf, options)))
//!     })
//!     .build();
//!
//! let body: Box<dyn TaskBody> = registry.resolve(&conf, &Slot::with_id("mapper", 3))?;
//! ```
//!
//! [`ConfigError::Missing`]: weft_core::ConfigError::Missing

#[cfg(feature = "inventory")]
pub mod collected;

#[cfg(feature = "inventory")]
pub use collected::{BehaviorFn, BehaviorRegistration};

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};
use weft_core::{
    BehaviorReference, BoxError, Capability, Conf, FromCapability, QualifiedName, ResolutionError,
    Result, Slot, Value,
};

/// A factory producing a capability from the job configuration.
///
/// Invoked with `None` when the slot carries no options, and with the
/// decoded options value otherwise.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Behavior`",
    label = "missing `Behavior` implementation",
    note = "Behaviors are `Fn(&Conf, Option<Value>) -> Result<Capability, BoxError>`."
)]
pub trait Behavior: Send + Sync + 'static {
    /// Build the capability.
    fn invoke(&self, conf: &Conf, options: Option<Value>) -> Result<Capability, BoxError>;
}

impl<F> Behavior for F
where
    F: Fn(&Conf, Option<Value>) -> Result<Capability, BoxError> + Send + Sync + 'static,
{
    fn invoke(&self, conf: &Conf, options: Option<Value>) -> Result<Capability, BoxError> {
        self(conf, options)
    }
}

// ============================================================================
// Namespace
// ============================================================================

/// A set of behaviors addressable by symbol.
#[derive(Clone, Default)]
pub struct Namespace {
    symbols: HashMap<String, Arc<dyn Behavior>>,
}

impl Namespace {
    /// Create an empty namespace.
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a symbol from a closure or function.
    ///
    /// A later definition of the same symbol replaces the earlier one.
    pub fn define<F>(&mut self, symbol: impl Into<String>, behavior: F) -> &mut Self
    where
        F: Fn(&Conf, Option<Value>) -> Result<Capability, BoxError> + Send + Sync + 'static,
    {
        self.define_behavior(symbol, behavior)
    }

    /// Define a symbol from any [`Behavior`].
    pub fn define_behavior(
        &mut self,
        symbol: impl Into<String>,
        behavior: impl Behavior,
    ) -> &mut Self {
        self.symbols.insert(symbol.into(), Arc::new(behavior));
        self
    }

    /// Look up a symbol.
    pub fn get(&self, symbol: &str) -> Option<&Arc<dyn Behavior>> {
        self.symbols.get(symbol)
    }

    /// Number of defined symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Check if the namespace defines nothing.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut symbols: Vec<_> = self.symbols.keys().collect();
        symbols.sort();
        f.debug_struct("Namespace").field("symbols", &symbols).finish()
    }
}

type Loader = Box<dyn Fn(&mut Namespace) -> Result<(), BoxError> + Send + Sync>;

struct NamespaceEntry {
    defined: Namespace,
    loader: Option<Loader>,
    loaded: OnceLock<Result<Namespace, String>>,
}

impl NamespaceEntry {
    fn new() -> Self {
        Self {
            defined: Namespace::new(),
            loader: None,
            loaded: OnceLock::new(),
        }
    }

    /// The namespace content, running the loader on first use.
    fn load(&self, name: &str) -> Result<&Namespace> {
        let Some(loader) = &self.loader else {
            return Ok(&self.defined);
        };

        let loaded = self.loaded.get_or_init(|| {
            #[cfg(feature = "tracing")]
            tracing::debug!(namespace = %name, "loading namespace");

            let mut namespace = self.defined.clone();
            loader(&mut namespace)
                .map(|()| namespace)
                .map_err(|e| e.to_string())
        });

        loaded.as_ref().map_err(|reason| {
            ResolutionError::LoadFailed {
                namespace: name.to_string(),
                reason: reason.clone(),
            }
            .into()
        })
    }
}

// ============================================================================
// BehaviorRegistryBuilder
// ============================================================================

/// Builder for constructing a [`BehaviorRegistry`].
#[derive(Default)]
pub struct BehaviorRegistryBuilder {
    namespaces: HashMap<String, NamespaceEntry>,
}

impl BehaviorRegistryBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, namespace: impl Into<String>) -> &mut NamespaceEntry {
        self.namespaces
            .entry(namespace.into())
            .or_insert_with(NamespaceEntry::new)
    }

    /// Define `namespace/symbol` from a closure or function.
    pub fn define<F>(
        mut self,
        namespace: impl Into<String>,
        symbol: impl Into<String>,
        behavior: F,
    ) -> Self
    where
        F: Fn(&Conf, Option<Value>) -> Result<Capability, BoxError> + Send + Sync + 'static,
    {
        self.entry(namespace).defined.define(symbol, behavior);
        self
    }

    /// Define `namespace/symbol` from any [`Behavior`].
    pub fn define_behavior(
        mut self,
        namespace: impl Into<String>,
        symbol: impl Into<String>,
        behavior: impl Behavior,
    ) -> Self {
        self.define_behavior_mut(namespace, symbol, behavior);
        self
    }

    /// Define `namespace/symbol` from any [`Behavior`] (mutable version).
    pub fn define_behavior_mut(
        &mut self,
        namespace: impl Into<String>,
        symbol: impl Into<String>,
        behavior: impl Behavior,
    ) {
        self.entry(namespace)
            .defined
            .define_behavior(symbol, behavior);
    }

    /// Declare a namespace whose symbols are defined by `loader`.
    ///
    /// The loader runs at most once per registry, on the first resolution
    /// that reaches the namespace. Its failure is remembered and reported by
    /// every later resolution.
    pub fn namespace<L>(mut self, namespace: impl Into<String>, loader: L) -> Self
    where
        L: Fn(&mut Namespace) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.entry(namespace).loader = Some(Box::new(loader));
        self
    }

    /// Number of declared namespaces.
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    /// Check if nothing was declared.
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    /// Build the immutable registry.
    pub fn build(self) -> BehaviorRegistry {
        BehaviorRegistry {
            namespaces: self.namespaces,
        }
    }
}

// ============================================================================
// BehaviorRegistry
// ============================================================================

/// An immutable, thread-safe registry of behaviors.
///
/// Created by calling [`BehaviorRegistryBuilder::build`]. Share it through
/// an `Arc`; resolution only needs `&self`.
pub struct BehaviorRegistry {
    namespaces: HashMap<String, NamespaceEntry>,
}

impl BehaviorRegistry {
    /// Start building a registry.
    pub fn builder() -> BehaviorRegistryBuilder {
        BehaviorRegistryBuilder::new()
    }

    /// Find the behavior a qualified name points to, loading its namespace.
    pub fn lookup(&self, name: QualifiedName<'_>) -> Result<Arc<dyn Behavior>> {
        let entry = self.namespaces.get(name.namespace).ok_or_else(|| {
            ResolutionError::UnknownNamespace {
                namespace: name.namespace.to_string(),
                qualified: name.to_string(),
            }
        })?;

        entry
            .load(name.namespace)?
            .get(name.symbol)
            .cloned()
            .ok_or_else(|| {
                ResolutionError::UnknownSymbol {
                    namespace: name.namespace.to_string(),
                    symbol: name.symbol.to_string(),
                }
                .into()
            })
    }

    /// Check whether a qualified name resolves to a behavior.
    pub fn contains(&self, qualified: &str) -> bool {
        QualifiedName::parse(qualified)
            .and_then(|name| self.lookup(name))
            .is_ok()
    }

    /// Resolve the behavior stored in `slot` into a typed handle.
    pub fn resolve<T: FromCapability>(&self, conf: &Conf, slot: &Slot) -> Result<T> {
        self.resolve_capability(conf, slot, None)
            .and_then(|(qualified, capability)| extract(qualified, capability))
    }

    /// Resolve with explicit options supplied by the caller.
    ///
    /// Explicit options take precedence over the slot's options key.
    pub fn resolve_with<T: FromCapability>(
        &self,
        conf: &Conf,
        slot: &Slot,
        options: Value,
    ) -> Result<T> {
        self.resolve_capability(conf, slot, Some(options))
            .and_then(|(qualified, capability)| extract(qualified, capability))
    }

    /// Resolve a reference that is not stored in the configuration.
    pub fn resolve_reference<T: FromCapability>(
        &self,
        conf: &Conf,
        reference: &BehaviorReference,
    ) -> Result<T> {
        let capability = self.invoke(
            conf,
            reference.qualified_name(),
            reference.options().cloned(),
        )?;
        extract(reference.qualified_name().to_string(), capability)
    }

    /// Resolve the behavior stored in `slot` into an untyped capability.
    ///
    /// Returns the qualified name alongside the capability for diagnostics.
    ///
    /// Options come from `explicit` when given, otherwise from the slot's
    /// `<component>.<id>.options` key. A positional `<component>.<id>.args`
    /// key is never read: the behavior is invoked with `None` options as if
    /// the key were absent. With the `tracing` feature enabled this is
    /// reported as a warning; without it nothing signals the ignored key.
    pub fn resolve_capability(
        &self,
        conf: &Conf,
        slot: &Slot,
        explicit: Option<Value>,
    ) -> Result<(String, Capability)> {
        let qualified = conf.require(&slot.var_key())?;

        let options = match explicit {
            Some(options) => Some(options),
            None => match slot.options_key() {
                Some(key) => conf.get_value(&key)?,
                None => None,
            },
        };

        #[cfg(feature = "tracing")]
        if options.is_none() {
            if let Some(args_key) = slot.legacy_args_key().filter(|k| conf.contains(k)) {
                tracing::warn!(
                    %slot,
                    key = %args_key,
                    "ignoring positional arguments key; behaviors take a single options value"
                );
            }
        }

        let capability = self.invoke(conf, qualified, options)?;
        Ok((qualified.to_string(), capability))
    }

    fn invoke(&self, conf: &Conf, qualified: &str, options: Option<Value>) -> Result<Capability> {
        let name = QualifiedName::parse(qualified)?;
        let behavior = self.lookup(name)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(behavior = %name, with_options = options.is_some(), "resolving behavior");

        behavior.invoke(conf, options).map_err(|source| {
            ResolutionError::Behavior {
                qualified: qualified.to_string(),
                source,
            }
            .into()
        })
    }

    /// Number of declared namespaces.
    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

impl fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.namespaces.keys().collect();
        names.sort();
        f.debug_struct("BehaviorRegistry")
            .field("namespaces", &names)
            .finish()
    }
}

fn extract<T: FromCapability>(qualified: String, capability: Capability) -> Result<T> {
    T::from_capability(capability).map_err(|other| {
        ResolutionError::WrongCapability {
            qualified,
            expected: T::KIND,
            found: other.kind(),
        }
        .into()
    })
}
