use super::LazyBinding;
use crate::registry::BehaviorRegistry;
use bytes::{Bytes, BytesMut};
use std::{any::Any, fmt, sync::Arc};
use weft_core::{Conf, Configurable, Result, Slot, Split, Value, Writable};

const ADAPTER: &str = "ProxySplit";

/// Host-facing split carrying a resolved [`Split`].
///
/// Driver side, it is built eagerly around a split planned by a format.
/// Worker side, the host creates it empty, injects the configuration (which
/// resolves an empty prototype), then calls [`Writable::read_fields`], which
/// replaces the carried split with the prototype's decode.
pub struct ProxySplit {
    binding: LazyBinding<Box<dyn Split>>,
}

impl ProxySplit {
    /// An unbound split, resolved on [`Configurable::set_conf`].
    pub fn new(registry: Arc<BehaviorRegistry>, slot: Slot) -> Self {
        Self {
            binding: LazyBinding::unbound(registry, slot),
        }
    }

    /// Resolve immediately; `options` typically describe the split itself.
    pub fn bind(
        registry: Arc<BehaviorRegistry>,
        conf: Conf,
        slot: Slot,
        options: Option<Value>,
    ) -> Result<Self> {
        Ok(Self {
            binding: LazyBinding::bind(registry, conf, slot, options)?,
        })
    }

    /// Wrap a split that was already produced, e.g. by a format's planning.
    pub fn wrap(registry: Arc<BehaviorRegistry>, conf: Conf, slot: Slot, split: Box<dyn Split>) -> Self {
        Self {
            binding: LazyBinding::from_handle(registry, conf, slot, split),
        }
    }

    /// The carried split.
    pub fn inner(&self) -> Result<&dyn Split> {
        self.binding.get(ADAPTER).map(|split| split.as_ref())
    }
}

impl fmt::Debug for ProxySplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySplit")
            .field("slot", self.binding.slot())
            .field("split", &self.binding.handle())
            .finish()
    }
}

/// Length and locations read `0` and empty while unbound.
impl Split for ProxySplit {
    fn byte_length(&self) -> u64 {
        self.binding.handle().map_or(0, |split| split.byte_length())
    }

    fn location_hints(&self) -> Vec<String> {
        self.binding
            .handle()
            .map(|split| split.location_hints())
            .unwrap_or_default()
    }

    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        self.inner()?.encode(out)
    }

    fn decode(&self, input: &mut Bytes) -> Result<Box<dyn Split>> {
        let split = self.inner()?.decode(input)?;
        Ok(Box::new(Self {
            binding: LazyBinding::from_handle(
                self.binding.registry().clone(),
                self.binding.conf().cloned().unwrap_or_default(),
                self.binding.slot().clone(),
                split,
            ),
        }))
    }

    fn value(&self) -> Value {
        self.binding
            .handle()
            .map(|split| split.value())
            .unwrap_or(Value::Null)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Writable for ProxySplit {
    fn write(&self, out: &mut BytesMut) -> Result<()> {
        self.encode(out)
    }

    fn read_fields(&mut self, input: &mut Bytes) -> Result<()> {
        let split = self.inner()?.decode(input)?;
        self.binding.replace(split);
        Ok(())
    }
}

impl Configurable for ProxySplit {
    fn set_conf(&mut self, conf: Conf) -> Result<()> {
        self.binding.set_conf(conf)
    }

    fn conf(&self) -> Option<&Conf> {
        self.binding.conf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{registry::BehaviorRegistryBuilder, testing::CountingBehavior};
    use serde_json::json;
    use weft_core::{BoxError, Capability, ConfBuilder, StructuredSplit};

    fn structured(conf: &Conf, options: Option<Value>) -> Result<Capability, BoxError> {
        Ok(Capability::split(StructuredSplit::with_conf(
            conf.clone(),
            options.unwrap_or(Value::Null),
        )))
    }

    fn setup() -> (CountingBehavior, Arc<BehaviorRegistry>, Conf) {
        let counter = CountingBehavior::new(structured);
        let registry = BehaviorRegistryBuilder::new()
            .define_behavior("splits", "structured", counter.clone())
            .build();
        let conf = ConfBuilder::new()
            .set("input-split.0.var", "splits/structured")
            .build();
        (counter, Arc::new(registry), conf)
    }

    #[test]
    fn test_host_round_trip() {
        let (counter, registry, conf) = setup();
        let slot = Slot::with_id("input-split", 0);

        let planned = ProxySplit::bind(
            registry.clone(),
            conf.clone(),
            slot.clone(),
            Some(json!({"length": 64, "path": "/in/part-0"})),
        )
        .unwrap();
        let mut out = BytesMut::new();
        planned.write(&mut out).unwrap();

        let mut received = ProxySplit::new(registry, slot);
        received.set_conf(conf).unwrap();
        received.read_fields(&mut out.freeze()).unwrap();

        assert_eq!(received.byte_length(), 64);
        assert_eq!(received.value(), json!({"length": 64, "path": "/in/part-0"}));
        assert_eq!(counter.options(), vec![Some(json!({"length": 64, "path": "/in/part-0"})), None]);
    }

    #[test]
    fn test_read_fields_requires_conf() {
        let (_counter, registry, _conf) = setup();
        let mut received = ProxySplit::new(registry, Slot::with_id("input-split", 0));
        assert!(received.read_fields(&mut Bytes::new()).is_err());
        assert_eq!(received.byte_length(), 0);
        assert!(received.location_hints().is_empty());
    }

    #[test]
    fn test_decode_keeps_proxy_type() {
        let (_counter, registry, conf) = setup();
        let slot = Slot::with_id("input-split", 0);
        let split = ProxySplit::bind(registry, conf, slot, Some(json!({"length": 5}))).unwrap();

        let mut out = BytesMut::new();
        split.encode(&mut out).unwrap();
        let decoded = split.decode(&mut out.freeze()).unwrap();

        assert!(decoded.as_any().downcast_ref::<ProxySplit>().is_some());
        assert_eq!(decoded.byte_length(), 5);
    }
}
