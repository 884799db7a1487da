use crate::registry::BehaviorRegistry;
use std::sync::Arc;
use weft_core::{Conf, ConfigError, FromCapability, Result, Slot, Value};

/// At-most-once resolution of a capability handle.
///
/// Shared by every proxy adapter. The handle is resolved either eagerly, at
/// construction, or on the first configuration injection; once bound it is
/// never replaced by a later injection.
pub struct LazyBinding<T> {
    registry: Arc<BehaviorRegistry>,
    slot: Slot,
    conf: Option<Conf>,
    handle: Option<T>,
}

impl<T: FromCapability> LazyBinding<T> {
    /// An unbound binding awaiting a configuration.
    pub fn unbound(registry: Arc<BehaviorRegistry>, slot: Slot) -> Self {
        Self {
            registry,
            slot,
            conf: None,
            handle: None,
        }
    }

    /// Resolve immediately, with explicit options when supplied.
    pub fn bind(
        registry: Arc<BehaviorRegistry>,
        conf: Conf,
        slot: Slot,
        options: Option<Value>,
    ) -> Result<Self> {
        let handle = match options {
            Some(options) => registry.resolve_with(&conf, &slot, options)?,
            None => registry.resolve(&conf, &slot)?,
        };
        Ok(Self {
            registry,
            slot,
            conf: Some(conf),
            handle: Some(handle),
        })
    }

    /// A binding around an already constructed handle.
    pub fn from_handle(registry: Arc<BehaviorRegistry>, conf: Conf, slot: Slot, handle: T) -> Self {
        Self {
            registry,
            slot,
            conf: Some(conf),
            handle: Some(handle),
        }
    }

    /// Store `conf` and resolve if nothing is bound yet.
    pub fn set_conf(&mut self, conf: Conf) -> Result<()> {
        if self.handle.is_none() {
            self.handle = Some(self.registry.resolve(&conf, &self.slot)?);
        }
        self.conf = Some(conf);
        Ok(())
    }

    /// The stored configuration.
    pub fn conf(&self) -> Option<&Conf> {
        self.conf.as_ref()
    }

    /// The slot this binding resolves from.
    pub fn slot(&self) -> &Slot {
        &self.slot
    }

    /// The registry this binding resolves through.
    pub fn registry(&self) -> &Arc<BehaviorRegistry> {
        &self.registry
    }

    /// Whether a handle is bound.
    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    /// The bound handle, or `ConfigError::Unbound` naming `adapter`.
    pub fn get(&self, adapter: &'static str) -> Result<&T> {
        self.handle
            .as_ref()
            .ok_or_else(|| self.unbound_error(adapter))
    }

    /// Mutable access to the bound handle.
    pub fn get_mut(&mut self, adapter: &'static str) -> Result<&mut T> {
        match self.handle {
            Some(ref mut handle) => Ok(handle),
            None => Err(ConfigError::Unbound {
                adapter,
                slot: self.slot.clone(),
            }
            .into()),
        }
    }

    /// The bound handle, if any.
    pub fn handle(&self) -> Option<&T> {
        self.handle.as_ref()
    }

    /// Replace the handle's state, as deserialization does.
    pub(crate) fn replace(&mut self, handle: T) {
        self.handle = Some(handle);
    }

    fn unbound_error(&self, adapter: &'static str) -> weft_core::WeftError {
        ConfigError::Unbound {
            adapter,
            slot: self.slot.clone(),
        }
        .into()
    }
}
