//! Testing utilities for Weft.
//!
//! Capability doubles that record how they are driven, so tests can assert
//! on dispatch without real storage.
//!
//! # Features
//!
//! - [`RecordingSource`]: a source over fixed split values that records which
//!   splits were opened
//! - [`VecReader`]: a record reader over fixed key/value pairs
//! - [`RecordingSink`]: a sink recording writes, closes and validations,
//!   with switchable failures
//! - [`RecordingCommitter`]: a committer logging every protocol call
//! - [`CountingBehavior`]: a behavior wrapper counting invocations

use crate::{memory::RECORDS_KEY, registry::Behavior};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use weft_core::{
    BoxError, Capability, Conf, Datum, JobCommitter, JobContext, JobState, RecordReader,
    RecordWriter, Result, SinkFormat, SourceFormat, Split, StructuredSplit, TaskContext, Value,
    WeftError,
};

// ============================================================================
// Recording Source
// ============================================================================

/// A source whose splits carry fixed values.
///
/// Readers yield the split's `records` array as keys with `null` values, or
/// the split value itself as one key when it has no `records`.
///
/// # Example
///
/// ```rust,ignore
/// let source = RecordingSource::new(vec![json!({"records": [1, 2]})]);
/// let reader = source.open_reader(split.as_ref(), &task)?;
/// assert_eq!(source.opened(), vec![json!({"records": [1, 2]})]);
/// ```
#[derive(Clone)]
pub struct RecordingSource {
    splits: Arc<Vec<Value>>,
    opened: Arc<Mutex<Vec<Value>>>,
}

impl RecordingSource {
    /// Create a source planning one split per value.
    pub fn new(splits: Vec<Value>) -> Self {
        Self {
            splits: Arc::new(splits),
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Values of the splits readers were opened on.
    pub fn opened(&self) -> Vec<Value> {
        self.opened.lock().unwrap().clone()
    }
}

impl SourceFormat for RecordingSource {
    fn splits(&self, job: &JobContext) -> Result<Vec<Box<dyn Split>>> {
        Ok(self
            .splits
            .iter()
            .map(|value| {
                Box::new(StructuredSplit::with_conf(job.conf().clone(), value.clone()))
                    as Box<dyn Split>
            })
            .collect())
    }

    fn open_reader(&self, split: &dyn Split, _task: &TaskContext) -> Result<Box<dyn RecordReader>> {
        let value = split.value();
        self.opened.lock().unwrap().push(value.clone());

        let keys = match value.get(RECORDS_KEY) {
            Some(Value::Array(records)) => records.clone(),
            _ => vec![value],
        };
        Ok(Box::new(VecReader::new(
            keys.into_iter().map(|key| (key, Value::Null)).collect(),
        )))
    }
}

// ============================================================================
// Vec Reader
// ============================================================================

/// A record reader over fixed key/value pairs.
pub struct VecReader {
    records: Vec<(Datum, Datum)>,
    position: usize,
    closed: bool,
}

impl VecReader {
    /// Create a reader over `records`.
    pub fn new(records: Vec<(Datum, Datum)>) -> Self {
        Self {
            records,
            position: 0,
            closed: false,
        }
    }

    /// Whether `close` was called.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn current(&self) -> Option<&(Datum, Datum)> {
        self.position
            .checked_sub(1)
            .and_then(|index| self.records.get(index))
    }
}

impl RecordReader for VecReader {
    fn advance(&mut self) -> Result<bool> {
        if self.position < self.records.len() {
            self.position += 1;
            Ok(true)
        } else {
            self.position = self.records.len() + 1;
            Ok(false)
        }
    }

    fn current_key(&self) -> Option<&Datum> {
        self.current().map(|(key, _)| key)
    }

    fn current_value(&self) -> Option<&Datum> {
        self.current().map(|(_, value)| value)
    }

    fn progress(&self) -> f32 {
        if self.records.is_empty() {
            return 1.0;
        }
        (self.position.min(self.records.len()) as f32) / self.records.len() as f32
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

// ============================================================================
// Recording Sink
// ============================================================================

#[derive(Default)]
struct SinkLog {
    records: Vec<(Datum, Datum)>,
    opened: usize,
    closes: usize,
    validations: usize,
}

/// A sink recording everything written through it.
///
/// Clones share the same log, so a test can keep one clone and hand another
/// to the code under test.
#[derive(Clone)]
pub struct RecordingSink {
    name: Arc<str>,
    log: Arc<Mutex<SinkLog>>,
    committer: RecordingCommitter,
    failing_close: bool,
    failing_validate: bool,
}

impl RecordingSink {
    /// Create a sink; `name` prefixes its committer events.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            log: Arc::new(Mutex::new(SinkLog::default())),
            committer: RecordingCommitter::new(name),
            failing_close: false,
            failing_validate: false,
        }
    }

    /// Set what the sink's committer answers to `needs_task_commit`.
    pub fn needs_commit(mut self, needs: bool) -> Self {
        self.committer = self.committer.needs_commit(needs);
        self
    }

    /// Make every writer fail on close (after counting the close).
    pub fn failing_close(mut self) -> Self {
        self.failing_close = true;
        self
    }

    /// Make `validate` fail.
    pub fn failing_validate(mut self) -> Self {
        self.failing_validate = true;
        self
    }

    /// The sink name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All records written, in order.
    pub fn records(&self) -> Vec<(Datum, Datum)> {
        self.log.lock().unwrap().records.clone()
    }

    /// Number of writers opened.
    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().opened
    }

    /// Number of writer closes.
    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }

    /// Number of `validate` calls.
    pub fn validations(&self) -> usize {
        self.log.lock().unwrap().validations
    }

    /// Events logged by the committers this sink handed out.
    pub fn committer_events(&self) -> Vec<String> {
        self.committer.events()
    }
}

impl SinkFormat for RecordingSink {
    fn open_writer(&self, _task: &TaskContext) -> Result<Box<dyn RecordWriter>> {
        self.log.lock().unwrap().opened += 1;
        Ok(Box::new(RecordingWriter {
            name: self.name.clone(),
            log: self.log.clone(),
            failing_close: self.failing_close,
        }))
    }

    fn validate(&self, _job: &JobContext) -> Result<()> {
        self.log.lock().unwrap().validations += 1;
        if self.failing_validate {
            return Err(WeftError::custom(format!(
                "output `{}` is not writable",
                self.name
            )));
        }
        Ok(())
    }

    fn committer(&self, _task: &TaskContext) -> Result<Box<dyn JobCommitter>> {
        Ok(Box::new(self.committer.clone()))
    }
}

struct RecordingWriter {
    name: Arc<str>,
    log: Arc<Mutex<SinkLog>>,
    failing_close: bool,
}

impl RecordWriter for RecordingWriter {
    fn write(&mut self, key: Datum, value: Datum) -> Result<()> {
        self.log.lock().unwrap().records.push((key, value));
        Ok(())
    }

    fn close(&mut self, _task: &TaskContext) -> Result<()> {
        self.log.lock().unwrap().closes += 1;
        if self.failing_close {
            return Err(WeftError::custom(format!("close failed for `{}`", self.name)));
        }
        Ok(())
    }
}

// ============================================================================
// Recording Committer
// ============================================================================

/// A committer logging every call as `"<name>:<operation>"`.
#[derive(Clone)]
pub struct RecordingCommitter {
    name: Arc<str>,
    events: Arc<Mutex<Vec<String>>>,
    needs_commit: bool,
}

impl RecordingCommitter {
    /// Create a committer answering `false` to `needs_task_commit`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            events: Arc::new(Mutex::new(Vec::new())),
            needs_commit: false,
        }
    }

    /// Set the answer to `needs_task_commit`.
    pub fn needs_commit(mut self, needs: bool) -> Self {
        self.needs_commit = needs;
        self
    }

    /// The logged events.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn log(&self, operation: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{}:{operation}", self.name));
    }
}

impl JobCommitter for RecordingCommitter {
    fn setup_job(&mut self, _job: &JobContext) -> Result<()> {
        self.log("setup_job");
        Ok(())
    }

    fn commit_job(&mut self, _job: &JobContext) -> Result<()> {
        self.log("commit_job");
        Ok(())
    }

    fn abort_job(&mut self, _job: &JobContext, state: JobState) -> Result<()> {
        self.log(&format!("abort_job({state:?})"));
        Ok(())
    }

    fn setup_task(&mut self, _task: &TaskContext) -> Result<()> {
        self.log("setup_task");
        Ok(())
    }

    fn needs_task_commit(&mut self, _task: &TaskContext) -> Result<bool> {
        self.log("needs_task_commit");
        Ok(self.needs_commit)
    }

    fn commit_task(&mut self, _task: &TaskContext) -> Result<()> {
        self.log("commit_task");
        Ok(())
    }

    fn abort_task(&mut self, _task: &TaskContext) -> Result<()> {
        self.log("abort_task");
        Ok(())
    }
}

// ============================================================================
// Counting Behavior
// ============================================================================

type Factory = dyn Fn(&Conf, Option<Value>) -> Result<Capability, BoxError> + Send + Sync;

/// A behavior that counts invocations and records the options it received.
///
/// # Example
///
/// ```rust,ignore
/// let counter = CountingBehavior::new(my_behavior);
/// let registry = BehaviorRegistryBuilder::new()
///     .define_behavior("myns", "handler", counter.clone())
///     .build();
///
/// // resolve...
/// assert_eq!(counter.calls(), 1);
/// ```
#[derive(Clone)]
pub struct CountingBehavior {
    inner: Arc<Factory>,
    calls: Arc<AtomicUsize>,
    options: Arc<Mutex<Vec<Option<Value>>>>,
}

impl CountingBehavior {
    /// Wrap a behavior function.
    pub fn new<F>(inner: F) -> Self
    where
        F: Fn(&Conf, Option<Value>) -> Result<Capability, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            inner: Arc::new(inner),
            calls: Arc::new(AtomicUsize::new(0)),
            options: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of invocations.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Options of every invocation, in order.
    pub fn options(&self) -> Vec<Option<Value>> {
        self.options.lock().unwrap().clone()
    }
}

impl Behavior for CountingBehavior {
    fn invoke(
        &self,
        conf: &Conf,
        options: Option<Value>,
    ) -> Result<Capability, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.options.lock().unwrap().push(options.clone());
        (self.inner)(conf, options)
    }
}
