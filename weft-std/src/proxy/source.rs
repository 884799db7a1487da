use super::LazyBinding;
use crate::registry::BehaviorRegistry;
use bytes::Bytes;
use std::sync::Arc;
use weft_core::{
    Conf, Configurable, JobContext, RecordReader, Result, Slot, SourceFormat, Split, TaskContext,
    Value,
};

const ADAPTER: &str = "ProxySourceFormat";

/// Host-facing source format forwarding to a resolved [`SourceFormat`].
pub struct ProxySourceFormat {
    binding: LazyBinding<Arc<dyn SourceFormat>>,
}

impl ProxySourceFormat {
    /// An unbound adapter, resolved on [`Configurable::set_conf`].
    pub fn new(registry: Arc<BehaviorRegistry>, slot: Slot) -> Self {
        Self {
            binding: LazyBinding::unbound(registry, slot),
        }
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

    /// The resolved format.
    pub fn format(&self) -> Result<&Arc<dyn SourceFormat>> {
        self.binding.get(ADAPTER)
    }
}

impl SourceFormat for ProxySourceFormat {
    fn splits(&self, job: &JobContext) -> Result<Vec<Box<dyn Split>>> {
        self.format()?.splits(job)
    }

    fn open_reader(&self, split: &dyn Split, task: &TaskContext) -> Result<Box<dyn RecordReader>> {
        self.format()?.open_reader(split, task)
    }

    fn decode_split(&self, input: &mut Bytes, conf: &Conf) -> Result<Box<dyn Split>> {
        self.format()?.decode_split(input, conf)
    }
}

impl Configurable for ProxySourceFormat {
    fn set_conf(&mut self, conf: Conf) -> Result<()> {
        self.binding.set_conf(conf)
    }

    fn conf(&self) -> Option<&Conf> {
        self.binding.conf()
    }
}
