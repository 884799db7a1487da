use super::{Tag, read_entries};
use crate::registry::BehaviorRegistry;
use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, OnceLock, PoisonError},
};
use weft_core::{
    Conf, Datum, DispatchError, JobCommitter, JobContext, JobState, RecordWriter, Result,
    SinkFormat, TaskAttemptId, TaskContext, Value, WeftError,
};

/// One configured sub-sink.
#[derive(Clone)]
pub struct SubSink {
    /// Display name, usable as the tag of a pair-keyed write.
    pub name: String,
    /// The sub-sink's format.
    pub format: Arc<dyn SinkFormat>,
}

fn tag_of(entries: &[SubSink], name: &str) -> Result<Tag> {
    entries
        .iter()
        .position(|entry| entry.name == name)
        .map(|index| Tag(index as u32))
        .ok_or_else(|| {
            DispatchError::UnknownName {
                name: name.to_string(),
            }
            .into()
        })
}

/// One task attempt's writes to one multiplexed layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct UsageKey {
    job: String,
    layout: Arc<str>,
    attempt: TaskAttemptId,
}

impl UsageKey {
    fn new(layout: &Arc<str>, task: &TaskContext) -> Self {
        Self {
            job: task.job().job_id().to_string(),
            layout: layout.clone(),
            attempt: task.attempt(),
        }
    }
}

/// Sub-sinks each task attempt opened a writer for.
///
/// Process-wide: a host usually obtains the writer and the committer of an
/// attempt from separately resolved sink instances.
#[derive(Default)]
struct UsageLedger(Mutex<HashMap<UsageKey, BTreeSet<usize>>>);

fn ledger() -> &'static UsageLedger {
    static LEDGER: OnceLock<UsageLedger> = OnceLock::new();
    LEDGER.get_or_init(UsageLedger::default)
}

impl UsageLedger {
    fn record(&self, key: UsageKey, index: usize) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .insert(index);
    }

    fn used(&self, key: &UsageKey) -> Vec<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|used| used.iter().copied().collect())
            .unwrap_or_default()
    }

    fn forget(&self, key: &UsageKey) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    /// Drop every attempt of `job` still tracked for `layout`.
    fn forget_job(&self, job: &str, layout: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|key, _| key.job != job || &*key.layout != layout);
    }

    #[cfg(test)]
    fn tracked(&self, job: &str, layout: &str) -> usize {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|key| key.job == job && &*key.layout == layout)
            .count()
    }
}

/// Keeps the first failure of a multi-resource cleanup.
#[derive(Default)]
struct FirstError(Option<WeftError>);

impl FirstError {
    fn record(&mut self, tag: Tag, result: Result<()>) {
        let Err(err) = result else {
            return;
        };
        if self.0.is_none() {
            self.0 = Some(err);
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(%tag, error = %err, "suppressed secondary failure during cleanup");
        #[cfg(not(feature = "tracing"))]
        let _ = (tag, err);
    }

    fn finish(self) -> Result<()> {
        self.0.map_or(Ok(()), Err)
    }
}

// ============================================================================
// MultiplexSink
// ============================================================================

/// N independently configured sink formats written as one.
///
/// Which sub-sinks an attempt wrote to is tracked per process, keyed by job
/// id, task attempt and the ordered sub-sink names. Any two instances with
/// the same names therefore agree on an attempt's usage.
#[derive(Clone)]
pub struct MultiplexSink {
    entries: Arc<[SubSink]>,
    layout: Arc<str>,
}

impl MultiplexSink {
    /// Compose `(name, format)` pairs, tagged in order.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Arc<dyn SinkFormat>)>,
        S: Into<String>,
    {
        let entries: Arc<[SubSink]> = entries
            .into_iter()
            .map(|(name, format)| SubSink {
                name: name.into(),
                format,
            })
            .collect();
        let layout = entries
            .iter()
            .map(|entry| entry.name.as_str())
            .collect::<Vec<_>>()
            .join("\u{1f}");
        Self {
            entries,
            layout: layout.into(),
        }
    }

    /// Reconstruct the sub-sinks recorded under `component`.
    pub fn from_conf(registry: &BehaviorRegistry, conf: &Conf, component: &str) -> Result<Self> {
        let entries = read_entries(registry, conf, component)?;
        Ok(Self::new(entries))
    }

    /// Number of sub-sinks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is composed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sub-sink names in tag order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// The tag of the sub-sink named `name`.
    pub fn tag_of(&self, name: &str) -> Result<Tag> {
        tag_of(&self.entries, name)
    }

    /// A typed writer for one task attempt; nothing is opened yet.
    pub fn writer(&self, task: &TaskContext) -> MultiplexWriter {
        MultiplexWriter {
            entries: self.entries.clone(),
            usage: UsageKey::new(&self.layout, task),
            task: task.clone(),
            writers: self.entries.iter().map(|_| None).collect(),
        }
    }

    /// A typed committer for one task attempt.
    pub fn multiplex_committer(&self, task: &TaskContext) -> MultiplexCommitter {
        MultiplexCommitter {
            entries: self.entries.clone(),
            layout: self.layout.clone(),
            task: task.clone(),
            committers: self.entries.iter().map(|_| None).collect(),
        }
    }
}

impl SinkFormat for MultiplexSink {
    fn open_writer(&self, task: &TaskContext) -> Result<Box<dyn RecordWriter>> {
        Ok(Box::new(self.writer(task)))
    }

    fn validate(&self, job: &JobContext) -> Result<()> {
        self.entries
            .iter()
            .try_for_each(|entry| entry.format.validate(job))
    }

    fn committer(&self, task: &TaskContext) -> Result<Box<dyn JobCommitter>> {
        Ok(Box::new(self.multiplex_committer(task)))
    }
}

// ============================================================================
// MultiplexWriter
// ============================================================================

/// Routes records to sub-writers, opening each on its first record.
///
/// As a plain [`RecordWriter`] it expects `[tag, key]` pair keys, where the
/// tag is a sub-sink ordinal or name.
pub struct MultiplexWriter {
    entries: Arc<[SubSink]>,
    usage: UsageKey,
    task: TaskContext,
    writers: Vec<Option<Box<dyn RecordWriter>>>,
}

impl MultiplexWriter {
    /// Write a record to sub-sink `tag`.
    ///
    /// An out-of-range tag fails before any sub-writer is opened.
    pub fn write_tagged(&mut self, tag: Tag, key: Datum, value: Datum) -> Result<()> {
        let index = tag.check(self.entries.len())?;
        let writer = match &mut self.writers[index] {
            Some(writer) => writer,
            empty => {
                let opened = self.entries[index].format.open_writer(&self.task)?;
                ledger().record(self.usage.clone(), index);

                #[cfg(feature = "tracing")]
                tracing::debug!(%tag, name = %self.entries[index].name, attempt = %self.task.attempt(), "opened sub-writer");

                empty.insert(opened)
            }
        };
        writer.write(key, value)
    }

    /// Write a record to the sub-sink named `name`.
    pub fn write_named(&mut self, name: &str, key: Datum, value: Datum) -> Result<()> {
        let tag = tag_of(&self.entries, name)?;
        self.write_tagged(tag, key, value)
    }

    /// Tags of the sub-writers opened so far.
    pub fn opened(&self) -> Vec<Tag> {
        self.writers
            .iter()
            .enumerate()
            .filter(|(_, writer)| writer.is_some())
            .map(|(index, _)| Tag(index as u32))
            .collect()
    }

    fn untag(&self, key: Datum) -> Result<(Tag, Datum)> {
        let [tag, key]: [Datum; 2] = match key {
            Value::Array(pair) => pair
                .try_into()
                .map_err(|pair| malformed(&Value::Array(pair)))?,
            other => return Err(malformed(&other)),
        };
        let tag = match &tag {
            Value::String(name) => tag_of(&self.entries, name)?,
            other => other
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Tag)
                .ok_or_else(|| malformed(&Value::Array(vec![other.clone(), key.clone()])))?,
        };
        Ok((tag, key))
    }
}

fn malformed(key: &Datum) -> WeftError {
    DispatchError::MalformedTaggedKey {
        found: key.to_string(),
    }
    .into()
}

impl RecordWriter for MultiplexWriter {
    fn write(&mut self, key: Datum, value: Datum) -> Result<()> {
        let (tag, key) = self.untag(key)?;
        self.write_tagged(tag, key, value)
    }

    /// Closes every opened sub-writer, even after a failure; returns the
    /// first failure. Closing again is a no-op.
    fn close(&mut self, task: &TaskContext) -> Result<()> {
        let mut first = FirstError::default();
        for (index, slot) in self.writers.iter_mut().enumerate() {
            if let Some(mut writer) = slot.take() {
                first.record(Tag(index as u32), writer.close(task));
            }
        }
        first.finish()
    }
}

// ============================================================================
// MultiplexCommitter
// ============================================================================

/// Fans the commit protocol out to the sub-sinks' committers.
///
/// Job-level operations and `setup_task` reach every sub-committer. Task
/// commit and abort only reach the sub-sinks the attempt wrote to, so unused
/// destinations see no task-level side effects.
///
/// An attempt's usage is released once its outcome is settled: after
/// `commit_task`, after `abort_task`, or when `needs_task_commit` reports
/// nothing to commit. Job-level commit and abort release whatever the job
/// still holds.
pub struct MultiplexCommitter {
    entries: Arc<[SubSink]>,
    layout: Arc<str>,
    task: TaskContext,
    committers: Vec<Option<Box<dyn JobCommitter>>>,
}

impl MultiplexCommitter {
    fn committer(&mut self, index: usize) -> Result<&mut Box<dyn JobCommitter>> {
        match &mut self.committers[index] {
            Some(committer) => Ok(committer),
            empty => {
                let opened = self.entries[index].format.committer(&self.task)?;
                Ok(empty.insert(opened))
            }
        }
    }

    fn all(&self) -> std::ops::Range<usize> {
        0..self.entries.len()
    }
}

impl JobCommitter for MultiplexCommitter {
    fn setup_job(&mut self, job: &JobContext) -> Result<()> {
        for index in self.all() {
            self.committer(index)?.setup_job(job)?;
        }
        Ok(())
    }

    fn commit_job(&mut self, job: &JobContext) -> Result<()> {
        for index in self.all() {
            self.committer(index)?.commit_job(job)?;
        }
        ledger().forget_job(job.job_id(), &self.layout);
        Ok(())
    }

    fn abort_job(&mut self, job: &JobContext, state: JobState) -> Result<()> {
        let mut first = FirstError::default();
        for index in self.all() {
            let result = self
                .committer(index)
                .and_then(|committer| committer.abort_job(job, state));
            first.record(Tag(index as u32), result);
        }
        ledger().forget_job(job.job_id(), &self.layout);
        first.finish()
    }

    fn setup_task(&mut self, task: &TaskContext) -> Result<()> {
        for index in self.all() {
            self.committer(index)?.setup_task(task)?;
        }
        Ok(())
    }

    fn needs_task_commit(&mut self, task: &TaskContext) -> Result<bool> {
        let key = UsageKey::new(&self.layout, task);
        let mut needs = false;
        for index in ledger().used(&key) {
            needs |= self.committer(index)?.needs_task_commit(task)?;
        }
        if !needs {
            ledger().forget(&key);
        }
        Ok(needs)
    }

    fn commit_task(&mut self, task: &TaskContext) -> Result<()> {
        let key = UsageKey::new(&self.layout, task);
        for index in ledger().used(&key) {
            self.committer(index)?.commit_task(task)?;
        }
        ledger().forget(&key);
        Ok(())
    }

    fn abort_task(&mut self, task: &TaskContext) -> Result<()> {
        let key = UsageKey::new(&self.layout, task);
        let mut first = FirstError::default();
        for index in ledger().used(&key) {
            let result = self
                .committer(index)
                .and_then(|committer| committer.abort_task(task));
            first.record(Tag(index as u32), result);
        }
        ledger().forget(&key);
        first.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingSink;
    use serde_json::json;

    // Usage is tracked per process; every test runs under its own job id.
    fn ctx(job: &str, attempt: u32) -> TaskContext {
        TaskContext::new(
            JobContext::new(job, Conf::empty()),
            TaskAttemptId { task: 1, attempt },
        )
    }

    fn sinks() -> [RecordingSink; 3] {
        [
            RecordingSink::new("a").needs_commit(true),
            RecordingSink::new("b").needs_commit(false),
            RecordingSink::new("c").needs_commit(true),
        ]
    }

    fn multiplex(sinks: &[RecordingSink; 3]) -> MultiplexSink {
        MultiplexSink::new(
            sinks
                .iter()
                .map(|s| (s.name().to_string(), Arc::new(s.clone()) as Arc<dyn SinkFormat>)),
        )
    }

    #[test]
    fn test_writes_open_only_used_sub_writers() {
        let subs = sinks();
        let sink = multiplex(&subs);
        let task = ctx("open-used", 0);
        let mut writer = sink.writer(&task);

        writer.write_tagged(Tag(0), json!("k1"), json!(1)).unwrap();
        writer.write_tagged(Tag(1), json!("k2"), json!(2)).unwrap();
        writer.write_tagged(Tag(0), json!("k3"), json!(3)).unwrap();

        assert_eq!(writer.opened(), vec![Tag(0), Tag(1)]);
        assert_eq!(subs[0].opened(), 1);
        assert_eq!(subs[1].opened(), 1);
        assert_eq!(subs[2].opened(), 0);
        assert_eq!(
            subs[0].records(),
            vec![(json!("k1"), json!(1)), (json!("k3"), json!(3))]
        );
    }

    #[test]
    fn test_out_of_range_tag_has_no_side_effects() {
        let subs = sinks();
        let sink = multiplex(&subs);
        let task = ctx("out-of-range", 0);
        let mut writer = sink.writer(&task);

        let err = writer.write_tagged(Tag(5), json!("k"), json!(0)).unwrap_err();
        assert!(matches!(
            err,
            WeftError::Dispatch(DispatchError::TagOutOfRange { tag: 5, len: 3 })
        ));
        assert!(writer.opened().is_empty());
        assert!(subs.iter().all(|s| s.opened() == 0));
        assert_eq!(ledger().tracked("out-of-range", &sink.layout), 0);
    }

    #[test]
    fn test_pair_keys_route_by_index_and_name() {
        let subs = sinks();
        let sink = multiplex(&subs);
        let mut writer = sink.open_writer(&ctx("pair-keys", 0)).unwrap();

        writer.write(json!([2, "by-index"]), json!(1)).unwrap();
        writer.write(json!(["a", "by-name"]), json!(2)).unwrap();

        assert_eq!(subs[2].records(), vec![(json!("by-index"), json!(1))]);
        assert_eq!(subs[0].records(), vec![(json!("by-name"), json!(2))]);

        let err = writer.write(json!("plain"), json!(3)).unwrap_err();
        assert!(matches!(
            err,
            WeftError::Dispatch(DispatchError::MalformedTaggedKey { .. })
        ));
        let err = writer.write(json!(["zzz", 1]), json!(3)).unwrap_err();
        assert!(matches!(
            err,
            WeftError::Dispatch(DispatchError::UnknownName { .. })
        ));
        let err = writer.write(json!([1, 2, 3]), json!(3)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "dispatch error: multiplexed write key must be a `[tag, key]` pair, got [1,2,3]"
        );
    }

    #[test]
    fn test_close_keeps_first_error_and_closes_all() {
        let subs = [
            RecordingSink::new("a").failing_close(),
            RecordingSink::new("b").failing_close(),
            RecordingSink::new("c"),
        ];
        let sink = multiplex(&subs);
        let task = ctx("close-errors", 0);
        let mut writer = sink.writer(&task);
        for tag in 0..3 {
            writer.write_tagged(Tag(tag), json!(tag), json!(null)).unwrap();
        }

        let err = writer.close(&task).unwrap_err();
        assert_eq!(err.to_string(), "close failed for `a`");
        assert!(subs.iter().all(|s| s.closes() == 1));

        writer.close(&task).unwrap();
        assert!(subs.iter().all(|s| s.closes() == 1));
    }

    #[test]
    fn test_task_commit_reaches_only_used_committers() {
        let subs = sinks();
        let sink = multiplex(&subs);
        let task = ctx("commit-used", 0);

        let mut committer = sink.multiplex_committer(&task);
        committer.setup_task(&task).unwrap();

        let mut writer = sink.writer(&task);
        writer.write_tagged(Tag(1), json!("k"), json!(1)).unwrap();
        writer.write_tagged(Tag(0), json!("k"), json!(2)).unwrap();
        writer.close(&task).unwrap();

        assert!(committer.needs_task_commit(&task).unwrap());
        committer.commit_task(&task).unwrap();

        assert_eq!(
            subs[0].committer_events(),
            vec!["a:setup_task", "a:needs_task_commit", "a:commit_task"]
        );
        assert_eq!(
            subs[1].committer_events(),
            vec!["b:setup_task", "b:needs_task_commit", "b:commit_task"]
        );
        assert_eq!(subs[2].committer_events(), vec!["c:setup_task"]);
        assert_eq!(ledger().tracked("commit-used", &sink.layout), 0);
    }

    #[test]
    fn test_writer_and_committer_from_separate_instances() {
        let subs = sinks();
        let writing = multiplex(&subs);
        let committing = multiplex(&subs);
        let task = ctx("separate-instances", 0);

        let mut writer = writing.open_writer(&task).unwrap();
        writer.write(json!(["c", "k"]), json!(1)).unwrap();
        writer.close(&task).unwrap();

        let mut committer = committing.committer(&task).unwrap();
        assert!(committer.needs_task_commit(&task).unwrap());
        committer.commit_task(&task).unwrap();
        assert_eq!(
            subs[2].committer_events(),
            vec!["c:needs_task_commit", "c:commit_task"]
        );
    }

    #[test]
    fn test_usage_is_released_when_nothing_needs_commit() {
        let subs = sinks();
        let sink = multiplex(&subs);
        let task = ctx("nothing-to-commit", 0);

        let mut writer = sink.writer(&task);
        writer.write_tagged(Tag(1), json!("k"), json!(1)).unwrap();
        writer.close(&task).unwrap();
        assert_eq!(ledger().tracked("nothing-to-commit", &sink.layout), 1);

        let mut committer = sink.multiplex_committer(&task);
        assert!(!committer.needs_task_commit(&task).unwrap());
        assert_eq!(ledger().tracked("nothing-to-commit", &sink.layout), 0);
        assert_eq!(subs[1].committer_events(), vec!["b:needs_task_commit"]);
    }

    #[test]
    fn test_job_commit_releases_unsettled_attempts() {
        let subs = sinks();
        let sink = multiplex(&subs);
        for attempt in 0..3 {
            sink.writer(&ctx("unsettled", attempt))
                .write_tagged(Tag(0), json!("k"), json!(attempt))
                .unwrap();
        }
        assert_eq!(ledger().tracked("unsettled", &sink.layout), 3);

        let task = ctx("unsettled", 0);
        sink.multiplex_committer(&task)
            .commit_job(task.job())
            .unwrap();
        assert_eq!(ledger().tracked("unsettled", &sink.layout), 0);
    }

    #[test]
    fn test_usage_is_tracked_per_attempt() {
        let subs = sinks();
        let sink = multiplex(&subs);
        let (first, retry) = (ctx("per-attempt", 0), ctx("per-attempt", 1));

        sink.writer(&first)
            .write_tagged(Tag(2), json!("k"), json!(1))
            .unwrap();

        let mut committer = sink.multiplex_committer(&retry);
        assert!(!committer.needs_task_commit(&retry).unwrap());
        committer.abort_task(&retry).unwrap();
        assert!(subs[2].committer_events().is_empty());

        let mut committer = sink.multiplex_committer(&first);
        committer.abort_task(&first).unwrap();
        assert_eq!(subs[2].committer_events(), vec!["c:abort_task"]);
        assert_eq!(ledger().tracked("per-attempt", &sink.layout), 0);
    }

    #[test]
    fn test_job_operations_reach_every_committer() {
        let subs = sinks();
        let sink = multiplex(&subs);
        let task = ctx("job-operations", 0);
        let mut committer = sink.committer(&task).unwrap();

        committer.setup_job(task.job()).unwrap();
        committer.commit_job(task.job()).unwrap();
        committer.abort_job(task.job(), JobState::Failed).unwrap();

        for s in &subs {
            let name = s.name();
            assert_eq!(
                s.committer_events(),
                vec![
                    format!("{name}:setup_job"),
                    format!("{name}:commit_job"),
                    format!("{name}:abort_job(Failed)"),
                ]
            );
        }
    }

    #[test]
    fn test_validate_stops_at_first_failure() {
        let subs = [
            RecordingSink::new("a"),
            RecordingSink::new("b").failing_validate(),
            RecordingSink::new("c"),
        ];
        let sink = multiplex(&subs);
        let err = sink.validate(&JobContext::new("validate", Conf::empty())).unwrap_err();
        assert_eq!(err.to_string(), "output `b` is not writable");
        assert_eq!(subs[0].validations(), 1);
        assert_eq!(subs[2].validations(), 0);
    }
}
