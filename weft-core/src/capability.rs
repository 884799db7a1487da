//! # Capability Interfaces
//!
//! Host-framework-agnostic contracts implemented by externally supplied
//! behavior. This layer never implements them itself beyond composites; it
//! only resolves, adapts and multiplexes them.
//!
//! | Capability        | Role                                             |
//! |-------------------|--------------------------------------------------|
//! | [`SourceFormat`]  | plans splits and opens readers over them         |
//! | [`Split`]         | one unit of input work, serializable             |
//! | [`RecordReader`]  | iterates the records of one split                |
//! | [`SinkFormat`]    | opens writers, validates output, hands committers|
//! | [`RecordWriter`]  | accepts key/value records for one task           |
//! | [`JobCommitter`]  | two-phase commit of task and job output          |
//! | [`KeyPartitioner`]| assigns records to reduce partitions             |
//! | [`TaskBody`]      | mapper / combiner / reducer logic                |
//!
//! # Closed Capability Set
//!
//! A resolved behavior returns a [`Capability`], a closed enum over these
//! kinds. Callers extract the kind they need through [`FromCapability`],
//! which reports a mismatch instead of failing at an arbitrary later call.

use crate::{
    conf::Conf,
    context::{JobContext, JobState, TaskContext},
    error::Result,
    split::StructuredSplit,
};
use bytes::{Bytes, BytesMut};
use serde_json::Value;
use std::{any::Any, fmt, sync::Arc};

/// Record keys and values.
///
/// Structured values let heterogeneous sub-sources and sub-sinks share one
/// multiplexed surface.
pub type Datum = Value;

// ============================================================================
// Input side
// ============================================================================

/// Plans the input of a job and opens readers over the planned splits.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `SourceFormat`",
    label = "missing `SourceFormat` implementation",
    note = "Source formats must implement `splits` and `open_reader`."
)]
pub trait SourceFormat: Send + Sync + 'static {
    /// Compute the splits of the job's input.
    fn splits(&self, job: &JobContext) -> Result<Vec<Box<dyn Split>>>;

    /// Open a reader over one of this format's splits.
    fn open_reader(&self, split: &dyn Split, task: &TaskContext) -> Result<Box<dyn RecordReader>>;

    /// Decode a split this format produced and a worker received on the wire.
    ///
    /// The default decodes a [`StructuredSplit`].
    fn decode_split(&self, input: &mut Bytes, conf: &Conf) -> Result<Box<dyn Split>> {
        Ok(Box::new(StructuredSplit::read_from(input, conf)?))
    }
}

/// One unit of input work handed from planning to execution.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Split`",
    label = "missing `Split` implementation",
    note = "Splits must report length and locations and round-trip through `encode`/`decode`."
)]
pub trait Split: Send + Sync + fmt::Debug + 'static {
    /// Size of the split in bytes, used by the host for scheduling.
    fn byte_length(&self) -> u64;

    /// Hosts on which the split's data is local.
    fn location_hints(&self) -> Vec<String>;

    /// Serialize the split.
    fn encode(&self, out: &mut BytesMut) -> Result<()>;

    /// Decode a split of the same type, using `self` as prototype.
    fn decode(&self, input: &mut Bytes) -> Result<Box<dyn Split>>;

    /// The carried value, for inspection.
    fn value(&self) -> Value;

    /// Upcast for downcasting to a concrete split type.
    fn as_any(&self) -> &dyn Any;
}

/// Iterates the key/value records of one split.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `RecordReader`",
    label = "missing `RecordReader` implementation"
)]
pub trait RecordReader: Send {
    /// Move to the next record; `false` once exhausted.
    fn advance(&mut self) -> Result<bool>;

    /// Key of the current record, `None` before the first `advance`.
    fn current_key(&self) -> Option<&Datum>;

    /// Value of the current record, `None` before the first `advance`.
    fn current_value(&self) -> Option<&Datum>;

    /// Fraction of the split consumed, in `[0, 1]`.
    fn progress(&self) -> f32;

    /// Release the reader's resources.
    fn close(&mut self) -> Result<()>;

    /// Upcast for readers that expose more than their records.
    fn as_any(&self) -> Option<&dyn Any> {
        None
    }
}

impl<R: RecordReader + ?Sized> RecordReader for Box<R> {
    fn advance(&mut self) -> Result<bool> {
        (**self).advance()
    }

    fn current_key(&self) -> Option<&Datum> {
        (**self).current_key()
    }

    fn current_value(&self) -> Option<&Datum> {
        (**self).current_value()
    }

    fn progress(&self) -> f32 {
        (**self).progress()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn as_any(&self) -> Option<&dyn Any> {
        (**self).as_any()
    }
}

// ============================================================================
// Output side
// ============================================================================

/// Opens writers for task output and manages its commit protocol.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `SinkFormat`",
    label = "missing `SinkFormat` implementation",
    note = "Sink formats must implement `open_writer`, `validate` and `committer`."
)]
pub trait SinkFormat: Send + Sync + 'static {
    /// Open a writer for one task attempt.
    fn open_writer(&self, task: &TaskContext) -> Result<Box<dyn RecordWriter>>;

    /// Fail fast, before any task runs, if the destination is invalid.
    fn validate(&self, job: &JobContext) -> Result<()>;

    /// The committer responsible for this format's output.
    fn committer(&self, task: &TaskContext) -> Result<Box<dyn JobCommitter>>;
}

/// Accepts the key/value output of one task attempt.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `RecordWriter`",
    label = "missing `RecordWriter` implementation"
)]
pub trait RecordWriter: Send {
    /// Write one record.
    fn write(&mut self, key: Datum, value: Datum) -> Result<()>;

    /// Flush and release the writer.
    fn close(&mut self, task: &TaskContext) -> Result<()>;
}

impl<W: RecordWriter + ?Sized> RecordWriter for Box<W> {
    fn write(&mut self, key: Datum, value: Datum) -> Result<()> {
        (**self).write(key, value)
    }

    fn close(&mut self, task: &TaskContext) -> Result<()> {
        (**self).close(task)
    }
}

/// Two-phase commit of task-local output.
///
/// Output written by a task attempt becomes visible only through
/// `commit_task` followed by `commit_job`; failed attempts are discarded with
/// `abort_task` / `abort_job`.
pub trait JobCommitter: Send {
    /// Prepare the job's output location.
    fn setup_job(&mut self, job: &JobContext) -> Result<()>;

    /// Make all committed task output visible.
    fn commit_job(&mut self, job: &JobContext) -> Result<()>;

    /// Discard the job's output.
    fn abort_job(&mut self, job: &JobContext, state: JobState) -> Result<()>;

    /// Prepare a task attempt's tentative output location.
    fn setup_task(&mut self, task: &TaskContext) -> Result<()>;

    /// Whether the attempt produced output that needs committing.
    fn needs_task_commit(&mut self, task: &TaskContext) -> Result<bool>;

    /// Promote the attempt's tentative output.
    fn commit_task(&mut self, task: &TaskContext) -> Result<()>;

    /// Discard the attempt's tentative output.
    fn abort_task(&mut self, task: &TaskContext) -> Result<()>;
}

impl<C: JobCommitter + ?Sized> JobCommitter for Box<C> {
    fn setup_job(&mut self, job: &JobContext) -> Result<()> {
        (**self).setup_job(job)
    }

    fn commit_job(&mut self, job: &JobContext) -> Result<()> {
        (**self).commit_job(job)
    }

    fn abort_job(&mut self, job: &JobContext, state: JobState) -> Result<()> {
        (**self).abort_job(job, state)
    }

    fn setup_task(&mut self, task: &TaskContext) -> Result<()> {
        (**self).setup_task(task)
    }

    fn needs_task_commit(&mut self, task: &TaskContext) -> Result<bool> {
        (**self).needs_task_commit(task)
    }

    fn commit_task(&mut self, task: &TaskContext) -> Result<()> {
        (**self).commit_task(task)
    }

    fn abort_task(&mut self, task: &TaskContext) -> Result<()> {
        (**self).abort_task(task)
    }
}

// ============================================================================
// Task logic
// ============================================================================

/// Assigns a record to one of `partitions` reduce partitions.
///
/// Must be a pure function of its inputs: downstream grouping relies on
/// equal keys always landing in the same partition.
pub trait KeyPartitioner: Send + Sync + 'static {
    /// A partition in `[0, partitions)`.
    fn partition(&self, key: &Datum, value: &Datum, partitions: u32) -> u32;
}

/// Mapper, combiner or reducer logic run once per task attempt.
pub trait TaskBody: Send {
    /// Consume the task's input and produce its output.
    fn run(
        &mut self,
        task: &TaskContext,
        input: &mut dyn RecordReader,
        output: &mut dyn RecordWriter,
    ) -> Result<()>;
}

// ============================================================================
// Capability - the closed set of resolvable behaviors
// ============================================================================

/// A live behavior object produced by a resolved behavior reference.
pub enum Capability {
    /// A source format.
    Source(Arc<dyn SourceFormat>),
    /// A split prototype.
    Split(Box<dyn Split>),
    /// A sink format.
    Sink(Arc<dyn SinkFormat>),
    /// An output committer.
    Committer(Box<dyn JobCommitter>),
    /// A key partitioner.
    Partitioner(Arc<dyn KeyPartitioner>),
    /// A task body.
    Task(Box<dyn TaskBody>),
}

impl Capability {
    /// Wrap a source format.
    pub fn source(format: impl SourceFormat) -> Self {
        Capability::Source(Arc::new(format))
    }

    /// Wrap a split prototype.
    pub fn split(split: impl Split) -> Self {
        Capability::Split(Box::new(split))
    }

    /// Wrap a sink format.
    pub fn sink(format: impl SinkFormat) -> Self {
        Capability::Sink(Arc::new(format))
    }

    /// Wrap an output committer.
    pub fn committer(committer: impl JobCommitter + 'static) -> Self {
        Capability::Committer(Box::new(committer))
    }

    /// Wrap a key partitioner.
    pub fn partitioner(partitioner: impl KeyPartitioner) -> Self {
        Capability::Partitioner(Arc::new(partitioner))
    }

    /// Wrap a task body.
    pub fn task(body: impl TaskBody + 'static) -> Self {
        Capability::Task(Box::new(body))
    }

    /// The kind of this capability.
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::Source(_) => CapabilityKind::Source,
            Capability::Split(_) => CapabilityKind::Split,
            Capability::Sink(_) => CapabilityKind::Sink,
            Capability::Committer(_) => CapabilityKind::Committer,
            Capability::Partitioner(_) => CapabilityKind::Partitioner,
            Capability::Task(_) => CapabilityKind::Task,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Capability").field(&self.kind()).finish()
    }
}

/// Discriminant of a [`Capability`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    /// [`SourceFormat`]
    Source,
    /// [`Split`]
    Split,
    /// [`SinkFormat`]
    Sink,
    /// [`JobCommitter`]
    Committer,
    /// [`KeyPartitioner`]
    Partitioner,
    /// [`TaskBody`]
    Task,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityKind::Source => "source format",
            CapabilityKind::Split => "split",
            CapabilityKind::Sink => "sink format",
            CapabilityKind::Committer => "committer",
            CapabilityKind::Partitioner => "partitioner",
            CapabilityKind::Task => "task body",
        };
        f.write_str(name)
    }
}

/// Typed extraction of a handle from a [`Capability`].
pub trait FromCapability: Sized {
    /// The kind this handle type accepts.
    const KIND: CapabilityKind;

    /// Take the handle out, or give the capability back on a kind mismatch.
    fn from_capability(capability: Capability) -> std::result::Result<Self, Capability>;
}

macro_rules! from_capability {
    ($($handle:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromCapability for $handle {
                const KIND: CapabilityKind = CapabilityKind::$variant;

                fn from_capability(
                    capability: Capability,
                ) -> std::result::Result<Self, Capability> {
                    match capability {
                        Capability::$variant(handle) => Ok(handle),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

from_capability! {
    Arc<dyn SourceFormat> => Source,
    Box<dyn Split> => Split,
    Arc<dyn SinkFormat> => Sink,
    Box<dyn JobCommitter> => Committer,
    Arc<dyn KeyPartitioner> => Partitioner,
    Box<dyn TaskBody> => Task,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Modulo;

    impl KeyPartitioner for Modulo {
        fn partition(&self, key: &Datum, _value: &Datum, partitions: u32) -> u32 {
            key.as_u64().unwrap_or(0) as u32 % partitions
        }
    }

    #[test]
    fn test_capability_kind() {
        let cap = Capability::partitioner(Modulo);
        assert_eq!(cap.kind(), CapabilityKind::Partitioner);
        assert_eq!(format!("{cap:?}"), "Capability(Partitioner)");
    }

    #[test]
    fn test_from_capability_matching_kind() {
        let handle = <Arc<dyn KeyPartitioner>>::from_capability(Capability::partitioner(Modulo))
            .expect("kind matches");
        assert_eq!(handle.partition(&json!(7), &Value::Null, 4), 3);
    }

    #[test]
    fn test_from_capability_mismatch_returns_capability() {
        let split = Capability::split(StructuredSplit::new(json!({"length": 1})));
        let Err(back) = <Arc<dyn SourceFormat>>::from_capability(split) else {
            panic!("a split is not a source format");
        };
        assert_eq!(back.kind(), CapabilityKind::Split);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CapabilityKind::Sink.to_string(), "sink format");
        assert_eq!(<Box<dyn TaskBody>>::KIND, CapabilityKind::Task);
    }
}
