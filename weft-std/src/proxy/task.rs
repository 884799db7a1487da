use super::LazyBinding;
use crate::registry::BehaviorRegistry;
use std::sync::Arc;
use weft_core::{
    BehaviorId, Conf, Configurable, RecordReader, RecordWriter, Result, Slot, TaskBody,
    TaskContext, Value, component,
};

const ADAPTER: &str = "ProxyTask";

/// Host-facing mapper, combiner or reducer running a resolved [`TaskBody`].
///
/// When the host never injected a configuration, [`ProxyTask::run`] resolves
/// from the task's own configuration.
pub struct ProxyTask {
    binding: LazyBinding<Box<dyn TaskBody>>,
}

impl ProxyTask {
    /// An unbound task body for `slot`.
    pub fn new(registry: Arc<BehaviorRegistry>, slot: Slot) -> Self {
        Self {
            binding: LazyBinding::unbound(registry, slot),
        }
    }

    /// The mapper numbered `id`.
    pub fn mapper(registry: Arc<BehaviorRegistry>, id: impl Into<BehaviorId>) -> Self {
        Self::new(registry, Slot::with_id(component::MAPPER, id))
    }

    /// The combiner numbered `id`.
    pub fn combiner(registry: Arc<BehaviorRegistry>, id: impl Into<BehaviorId>) -> Self {
        Self::new(registry, Slot::with_id(component::COMBINER, id))
    }

    /// The reducer numbered `id`.
    pub fn reducer(registry: Arc<BehaviorRegistry>, id: impl Into<BehaviorId>) -> Self {
        Self::new(registry, Slot::with_id(component::REDUCER, id))
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

    /// Run the task body over the attempt's input and output.
    pub fn run(
        &mut self,
        task: &TaskContext,
        input: &mut dyn RecordReader,
        output: &mut dyn RecordWriter,
    ) -> Result<()> {
        if !self.binding.is_bound() {
            self.binding.set_conf(task.conf().clone())?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(slot = %self.binding.slot(), attempt = %task.attempt(), "running task body");

        self.binding.get_mut(ADAPTER)?.run(task, input, output)
    }
}

impl Configurable for ProxyTask {
    fn set_conf(&mut self, conf: Conf) -> Result<()> {
        self.binding.set_conf(conf)
    }

    fn conf(&self) -> Option<&Conf> {
        self.binding.conf()
    }
}
