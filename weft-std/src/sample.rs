//! # Sampled Input
//!
//! [`SampleSource`] reads a bounded, reproducible sample of another source
//! format: a seeded random choice of at most `splits` of its splits, and at
//! most `records` records from each chosen split. Drivers use it to look at
//! the shape of an input, for example to pick partition boundaries, without
//! reading all of it.
//!
//! # Configuration Layout
//!
//! A sample recorded under `component` uses:
//!
//! | Key                       | Content                                  |
//! |---------------------------|------------------------------------------|
//! | `<component>.0.var`       | behavior of the sampled source format    |
//! | `<component>.0.options`   | its options                              |
//! | `<component>.splits`      | splits to keep, default [`DEFAULT_SPLITS`] |
//! | `<component>.records`     | records per split, default [`DEFAULT_RECORDS`] |
//! | `<component>.seed`        | seed of the split choice, default 0      |

use crate::registry::BehaviorRegistry;
use bytes::Bytes;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use std::{any::Any, sync::Arc};
use weft_core::{
    BehaviorReference, Conf, ConfBuilder, Datum, JobContext, RecordReader, Result, Slot,
    SourceFormat, Split, TaskContext,
};

/// Splits kept when no count is configured.
pub const DEFAULT_SPLITS: usize = 5;

/// Records read per split when no limit is configured.
pub const DEFAULT_RECORDS: usize = 1024;

/// How much of the sampled input is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    /// Maximum number of splits kept.
    pub splits: usize,
    /// Maximum number of records read from each kept split.
    pub records: usize,
    /// Seed of the split choice.
    pub seed: u64,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            splits: DEFAULT_SPLITS,
            records: DEFAULT_RECORDS,
            seed: 0,
        }
    }
}

/// A source format reading a sample of another one.
#[derive(Clone)]
pub struct SampleSource {
    inner: Arc<dyn SourceFormat>,
    sampling: Sampling,
}

impl SampleSource {
    /// Sample `inner`.
    pub fn new(inner: Arc<dyn SourceFormat>, sampling: Sampling) -> Self {
        Self { inner, sampling }
    }

    /// The sampling parameters.
    pub fn sampling(&self) -> Sampling {
        self.sampling
    }

    /// Record a sample of `inner` under `component`.
    pub fn write_conf(
        builder: &mut ConfBuilder,
        component: &str,
        inner: &BehaviorReference,
        sampling: Sampling,
    ) {
        builder.behavior_mut(&Slot::with_id(component.to_string(), 0), inner);
        builder.set_mut(format!("{component}.splits"), sampling.splits.to_string());
        builder.set_mut(format!("{component}.records"), sampling.records.to_string());
        builder.set_mut(format!("{component}.seed"), sampling.seed.to_string());
    }

    /// Rebuild the sample recorded under `component`.
    pub fn from_conf(registry: &BehaviorRegistry, conf: &Conf, component: &str) -> Result<Self> {
        let inner: Arc<dyn SourceFormat> =
            registry.resolve(conf, &Slot::with_id(component.to_string(), 0))?;
        let defaults = Sampling::default();
        let sampling = Sampling {
            splits: conf
                .get_u64(&format!("{component}.splits"))?
                .map_or(defaults.splits, |n| n as usize),
            records: conf
                .get_u64(&format!("{component}.records"))?
                .map_or(defaults.records, |n| n as usize),
            seed: conf
                .get_u64(&format!("{component}.seed"))?
                .unwrap_or(defaults.seed),
        };
        Ok(Self::new(inner, sampling))
    }
}

impl SourceFormat for SampleSource {
    /// The chosen splits keep the order the sampled format planned them in.
    fn splits(&self, job: &JobContext) -> Result<Vec<Box<dyn Split>>> {
        let splits = self.inner.splits(job)?;
        if splits.len() <= self.sampling.splits {
            return Ok(splits);
        }

        let mut order: Vec<usize> = (0..splits.len()).collect();
        order.shuffle(&mut StdRng::seed_from_u64(self.sampling.seed));
        let mut keep = vec![false; splits.len()];
        for &index in &order[..self.sampling.splits] {
            keep[index] = true;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            planned = splits.len(),
            kept = self.sampling.splits,
            seed = self.sampling.seed,
            "sampled input splits"
        );

        Ok(splits
            .into_iter()
            .zip(keep)
            .filter_map(|(split, keep)| keep.then_some(split))
            .collect())
    }

    fn open_reader(&self, split: &dyn Split, task: &TaskContext) -> Result<Box<dyn RecordReader>> {
        let inner = self.inner.open_reader(split, task)?;
        Ok(Box::new(LimitReader::new(inner, self.sampling.records)))
    }

    fn decode_split(&self, input: &mut Bytes, conf: &Conf) -> Result<Box<dyn Split>> {
        self.inner.decode_split(input, conf)
    }
}

/// Reader stopping after a fixed number of records.
pub struct LimitReader {
    inner: Box<dyn RecordReader>,
    limit: usize,
    read: usize,
    exhausted: bool,
}

impl LimitReader {
    /// Read at most `limit` records of `inner`.
    pub fn new(inner: Box<dyn RecordReader>, limit: usize) -> Self {
        Self {
            inner,
            limit,
            read: 0,
            exhausted: false,
        }
    }
}

impl RecordReader for LimitReader {
    fn advance(&mut self) -> Result<bool> {
        if self.exhausted || self.read >= self.limit {
            self.exhausted = true;
            return Ok(false);
        }
        if self.inner.advance()? {
            self.read += 1;
            Ok(true)
        } else {
            self.exhausted = true;
            Ok(false)
        }
    }

    fn current_key(&self) -> Option<&Datum> {
        if self.exhausted {
            return None;
        }
        self.inner.current_key()
    }

    fn current_value(&self) -> Option<&Datum> {
        if self.exhausted {
            return None;
        }
        self.inner.current_value()
    }

    fn progress(&self) -> f32 {
        if self.exhausted || self.limit == 0 {
            return 1.0;
        }
        let sampled = self.read as f32 / self.limit as f32;
        sampled.max(self.inner.progress()).min(1.0)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    // Keeps a tagged sub-source reader visible to `MultiplexMapper`.
    fn as_any(&self) -> Option<&dyn Any> {
        self.inner.as_any()
    }
}
