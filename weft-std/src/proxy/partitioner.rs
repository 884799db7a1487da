use super::LazyBinding;
use crate::registry::BehaviorRegistry;
use std::sync::Arc;
use weft_core::{
    Conf, Configurable, Datum, DispatchError, KeyPartitioner, Result, Slot, Value, component,
};

const ADAPTER: &str = "ProxyPartitioner";

/// Host-facing partitioner forwarding to a resolved [`KeyPartitioner`].
///
/// Unlike the capability it wraps, it checks the returned partition against
/// the requested count.
pub struct ProxyPartitioner {
    binding: LazyBinding<Arc<dyn KeyPartitioner>>,
}

impl ProxyPartitioner {
    /// An unbound adapter, resolved on [`Configurable::set_conf`].
    pub fn new(registry: Arc<BehaviorRegistry>, slot: Slot) -> Self {
        Self {
            binding: LazyBinding::unbound(registry, slot),
        }
    }

    /// An unbound adapter reading the single `partitioner` key.
    pub fn single(registry: Arc<BehaviorRegistry>) -> Self {
        Self::new(registry, Slot::single(component::PARTITIONER))
    }

    /// Resolve immediately.
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

    /// Assign a record to one of `partitions` partitions.
    pub fn partition(&self, key: &Datum, value: &Datum, partitions: u32) -> Result<u32> {
        if partitions == 0 {
            return Err(DispatchError::NoPartitions.into());
        }

        let partition = self.binding.get(ADAPTER)?.partition(key, value, partitions);
        if partition >= partitions {
            #[cfg(feature = "tracing")]
            tracing::error!(partition, partitions, "partitioner returned an out-of-range partition");

            return Err(DispatchError::PartitionOutOfRange {
                partition,
                partitions,
            }
            .into());
        }
        Ok(partition)
    }
}

impl Configurable for ProxyPartitioner {
    fn set_conf(&mut self, conf: Conf) -> Result<()> {
        self.binding.set_conf(conf)
    }

    fn conf(&self) -> Option<&Conf> {
        self.binding.conf()
    }
}
