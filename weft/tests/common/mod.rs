#![allow(dead_code)]

use std::sync::Arc;
use weft::{
    BehaviorRegistry, BoxError, Capability, Conf, Datum, JobContext, RecordReader, RecordWriter,
    Result, SinkFormat, SourceFormat, TaskAttemptId, TaskBody, TaskContext, Value,
    memory::MemorySource,
    testing::{CountingBehavior, RecordingSink, RecordingSource},
};

// ============================================================================
// Contexts
// ============================================================================

pub fn job(conf: Conf) -> JobContext {
    JobContext::new("job_0001", conf)
}

pub fn task(conf: Conf, task: u32, attempt: u32) -> TaskContext {
    TaskContext::new(job(conf), TaskAttemptId { task, attempt })
}

/// A task of its own job; multiplexed sink usage is tracked per job.
pub fn task_in(job_id: &str, conf: Conf, task: u32, attempt: u32) -> TaskContext {
    TaskContext::new(JobContext::new(job_id, conf), TaskAttemptId { task, attempt })
}

// ============================================================================
// Task Bodies
// ============================================================================

/// Emits `(key, value * factor)`, reading `factor` from the options.
pub struct Scale {
    pub factor: i64,
}

impl TaskBody for Scale {
    fn run(
        &mut self,
        _task: &TaskContext,
        input: &mut dyn RecordReader,
        output: &mut dyn RecordWriter,
    ) -> Result<()> {
        while input.advance()? {
            let key = input.current_key().cloned().unwrap_or(Value::Null);
            let value = input.current_value().and_then(Value::as_i64).unwrap_or(1);
            output.write(key, (value * self.factor).into())?;
        }
        Ok(())
    }
}

pub fn scale(_conf: &Conf, options: Option<Value>) -> std::result::Result<Capability, BoxError> {
    let factor = options
        .as_ref()
        .and_then(|o| o.get("factor"))
        .and_then(Value::as_i64)
        .unwrap_or(1);
    Ok(Capability::task(Scale { factor }))
}

/// Routes every record to the sub-sink named after its key's type.
pub struct RouteByType;

impl TaskBody for RouteByType {
    fn run(
        &mut self,
        _task: &TaskContext,
        input: &mut dyn RecordReader,
        output: &mut dyn RecordWriter,
    ) -> Result<()> {
        while input.advance()? {
            let key = input.current_key().cloned().unwrap_or(Value::Null);
            let route = if key.is_number() { "numbers" } else { "other" };
            output.write(Value::Array(vec![route.into(), key]), Value::Null)?;
        }
        Ok(())
    }
}

// ============================================================================
// Registries
// ============================================================================

/// Counting wrappers around the behaviors of [`registry`].
pub struct Counters {
    pub scale: CountingBehavior,
    pub numbers: CountingBehavior,
}

/// A registry with task bodies, a memory source and two recording sinks.
pub fn registry(
    source: RecordingSource,
    sinks: [RecordingSink; 2],
) -> (Arc<BehaviorRegistry>, Counters) {
    let counters = Counters {
        scale: CountingBehavior::new(scale),
        numbers: CountingBehavior::new(move |_conf: &Conf, _options: Option<Value>| {
            Ok(Capability::source(source.clone()))
        }),
    };
    let [first, second] = sinks;

    let registry = BehaviorRegistry::builder()
        .define_behavior("jobs", "scale", counters.scale.clone())
        .define("jobs", "route-by-type", |_conf: &Conf, _options: Option<Value>| {
            Ok(Capability::task(RouteByType))
        })
        .define("io", "memory", MemorySource::behavior)
        .define_behavior("io", "numbers", counters.numbers.clone())
        .define("io", "first", move |_conf: &Conf, _options: Option<Value>| {
            Ok(Capability::sink(first.clone()))
        })
        .define("io", "second", move |_conf: &Conf, _options: Option<Value>| {
            Ok(Capability::sink(second.clone()))
        })
        .build();

    (Arc::new(registry), counters)
}

// ============================================================================
// Helpers
// ============================================================================

pub fn read_all(reader: &mut dyn RecordReader) -> Vec<(Datum, Datum)> {
    let mut records = Vec::new();
    while reader.advance().unwrap() {
        records.push((
            reader.current_key().cloned().unwrap(),
            reader.current_value().cloned().unwrap(),
        ));
    }
    records
}

pub fn source(format: impl SourceFormat) -> Arc<dyn SourceFormat> {
    Arc::new(format)
}

pub fn sink(format: impl SinkFormat) -> Arc<dyn SinkFormat> {
    Arc::new(format)
}
