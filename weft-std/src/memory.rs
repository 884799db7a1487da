//! # In-Memory Source
//!
//! A [`SourceFormat`] over a sequence of records held by the driver. The
//! records travel inside the splits themselves, so no storage is involved;
//! it is meant for small lookup inputs and for tests.
//!
//! Each split is a [`StructuredSplit`] over `{"length": n, "records": [...]}`.
//! Readers yield every record as a key with a `null` value.

use bytes::Bytes;
use serde_json::json;
use weft_core::{
    BoxError, Capability, Conf, Datum, DecodeError, JobContext, RecordReader, Result,
    SourceFormat, Split, StructuredSplit, TaskContext, Value,
};

/// Payload key holding a split's records.
pub const RECORDS_KEY: &str = "records";

/// Option key selecting the number of splits.
pub const SPLITS_KEY: &str = "splits";

/// Source format splitting an in-memory sequence of records.
#[derive(Debug, Clone)]
pub struct MemorySource {
    records: Vec<Datum>,
    num_splits: usize,
}

impl MemorySource {
    /// Spread `records` over `num_splits` splits (at least one).
    pub fn new(records: Vec<Datum>, num_splits: usize) -> Self {
        Self {
            records,
            num_splits: num_splits.max(1),
        }
    }

    /// Behavior building a source from `{"records": [...], "splits": n}`.
    ///
    /// Register it like any other behavior:
    ///
    /// ```rust,ignore
    /// BehaviorRegistryBuilder::new().define("weft.memory", "source", MemorySource::behavior)
    /// ```
    pub fn behavior(_conf: &Conf, options: Option<Value>) -> Result<Capability, BoxError> {
        let options = options.unwrap_or(Value::Null);
        let records = match options.get(RECORDS_KEY) {
            Some(Value::Array(records)) => records.clone(),
            Some(_) => return Err("`records` option must be an array".into()),
            None => Vec::new(),
        };
        let num_splits = match options.get(SPLITS_KEY) {
            Some(n) => n
                .as_u64()
                .ok_or("`splits` option must be a non-negative integer")?
                as usize,
            None => 1,
        };
        Ok(Capability::source(Self::new(records, num_splits)))
    }

    /// The records read back from a split of this format.
    fn split_records(split: &dyn Split) -> Result<Vec<Datum>> {
        match split.value().get(RECORDS_KEY) {
            Some(Value::Array(records)) => Ok(records.clone()),
            _ => Err(DecodeError::Shape(format!(
                "in-memory split without a `{RECORDS_KEY}` array: {}",
                split.value()
            ))
            .into()),
        }
    }
}

impl SourceFormat for MemorySource {
    fn splits(&self, job: &JobContext) -> Result<Vec<Box<dyn Split>>> {
        let chunk = self.records.len().div_ceil(self.num_splits).max(1);
        let mut splits: Vec<Box<dyn Split>> = self
            .records
            .chunks(chunk)
            .map(|records| {
                Box::new(StructuredSplit::with_conf(
                    job.conf().clone(),
                    json!({"length": records.len(), RECORDS_KEY: records}),
                )) as Box<dyn Split>
            })
            .collect();

        if splits.is_empty() {
            splits.push(Box::new(StructuredSplit::with_conf(
                job.conf().clone(),
                json!({"length": 0, RECORDS_KEY: []}),
            )));
        }
        Ok(splits)
    }

    fn open_reader(&self, split: &dyn Split, _task: &TaskContext) -> Result<Box<dyn RecordReader>> {
        Ok(Box::new(SeqRecordReader::new(Self::split_records(split)?)))
    }

    fn decode_split(&self, input: &mut Bytes, conf: &Conf) -> Result<Box<dyn Split>> {
        Ok(Box::new(StructuredSplit::read_from(input, conf)?))
    }
}

// ============================================================================
// SeqRecordReader
// ============================================================================

/// Reader over a sequence: each element is a key, every value is `null`.
#[derive(Debug)]
pub struct SeqRecordReader {
    records: std::vec::IntoIter<Datum>,
    total: usize,
    consumed: usize,
    current: Option<Datum>,
}

const NULL: Datum = Value::Null;

impl SeqRecordReader {
    /// Read `records` in order.
    pub fn new(records: Vec<Datum>) -> Self {
        Self {
            total: records.len(),
            records: records.into_iter(),
            consumed: 0,
            current: None,
        }
    }
}

impl RecordReader for SeqRecordReader {
    fn advance(&mut self) -> Result<bool> {
        self.current = self.records.next();
        if self.current.is_some() {
            self.consumed += 1;
        }
        Ok(self.current.is_some())
    }

    fn current_key(&self) -> Option<&Datum> {
        self.current.as_ref()
    }

    fn current_value(&self) -> Option<&Datum> {
        self.current.as_ref().map(|_| &NULL)
    }

    fn progress(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        (self.consumed as f32 / self.total as f32).min(1.0)
    }

    fn close(&mut self) -> Result<()> {
        self.current = None;
        Ok(())
    }
}
