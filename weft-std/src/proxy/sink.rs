use super::LazyBinding;
use crate::registry::BehaviorRegistry;
use std::sync::Arc;
use weft_core::{
    Conf, Configurable, Datum, JobCommitter, JobContext, JobState, RecordWriter, Result,
    SinkFormat, Slot, TaskContext, Value, WeftError,
};

const ADAPTER: &str = "ProxySinkFormat";

// ============================================================================
// ProxySinkFormat
// ============================================================================

/// Host-facing sink format forwarding to a resolved [`SinkFormat`].
///
/// Writers and committers it hands out are wrapped in [`ProxyRecordWriter`]
/// and [`ProxyCommitter`].
pub struct ProxySinkFormat {
    binding: LazyBinding<Arc<dyn SinkFormat>>,
}

impl ProxySinkFormat {
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
    pub fn format(&self) -> Result<&Arc<dyn SinkFormat>> {
        self.binding.get(ADAPTER)
    }
}

impl SinkFormat for ProxySinkFormat {
    fn open_writer(&self, task: &TaskContext) -> Result<Box<dyn RecordWriter>> {
        let writer = self.format()?.open_writer(task)?;
        Ok(Box::new(ProxyRecordWriter::new(writer)))
    }

    fn validate(&self, job: &JobContext) -> Result<()> {
        self.format()?.validate(job)
    }

    fn committer(&self, task: &TaskContext) -> Result<Box<dyn JobCommitter>> {
        let committer = self.format()?.committer(task)?;
        Ok(Box::new(ProxyCommitter::new(committer)))
    }
}

impl Configurable for ProxySinkFormat {
    fn set_conf(&mut self, conf: Conf) -> Result<()> {
        self.binding.set_conf(conf)
    }

    fn conf(&self) -> Option<&Conf> {
        self.binding.conf()
    }
}

// ============================================================================
// ProxyRecordWriter
// ============================================================================

/// Record writer wrapper that closes its inner writer at most once.
pub struct ProxyRecordWriter {
    inner: Box<dyn RecordWriter>,
    written: u64,
    closed: bool,
}

impl ProxyRecordWriter {
    /// Wrap a writer.
    pub fn new(inner: Box<dyn RecordWriter>) -> Self {
        Self {
            inner,
            written: 0,
            closed: false,
        }
    }

    /// Records written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl RecordWriter for ProxyRecordWriter {
    fn write(&mut self, key: Datum, value: Datum) -> Result<()> {
        if self.closed {
            return Err(WeftError::custom("record writer used after close"));
        }
        self.inner.write(key, value)?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self, task: &TaskContext) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        #[cfg(feature = "tracing")]
        tracing::debug!(attempt = %task.attempt(), records = self.written, "closing record writer");

        self.inner.close(task)
    }
}

// ============================================================================
// ProxyCommitter
// ============================================================================

/// Committer wrapper forwarding the two-phase commit protocol.
pub struct ProxyCommitter {
    inner: Box<dyn JobCommitter>,
}

impl ProxyCommitter {
    /// Wrap a committer.
    pub fn new(inner: Box<dyn JobCommitter>) -> Self {
        Self { inner }
    }

    /// Superseded name for [`JobCommitter::commit_job`].
    #[deprecated(note = "use `commit_job`")]
    pub fn cleanup_job(&mut self, job: &JobContext) -> Result<()> {
        self.commit_job(job)
    }
}

impl JobCommitter for ProxyCommitter {
    fn setup_job(&mut self, job: &JobContext) -> Result<()> {
        self.inner.setup_job(job)
    }

    fn commit_job(&mut self, job: &JobContext) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::debug!(job = job.job_id(), "committing job");

        self.inner.commit_job(job)
    }

    fn abort_job(&mut self, job: &JobContext, state: JobState) -> Result<()> {
        #[cfg(feature = "tracing")]
        tracing::debug!(job = job.job_id(), ?state, "aborting job");

        self.inner.abort_job(job, state)
    }

    fn setup_task(&mut self, task: &TaskContext) -> Result<()> {
        self.inner.setup_task(task)
    }

    fn needs_task_commit(&mut self, task: &TaskContext) -> Result<bool> {
        self.inner.needs_task_commit(task)
    }

    fn commit_task(&mut self, task: &TaskContext) -> Result<()> {
        self.inner.commit_task(task)
    }

    fn abort_task(&mut self, task: &TaskContext) -> Result<()> {
        self.inner.abort_task(task)
    }
}
