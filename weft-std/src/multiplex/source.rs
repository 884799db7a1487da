use super::{Tag, TaggedReader, TaggedSplit, read_entries};
use crate::{proxy::ProxySplit, registry::BehaviorRegistry};
use bytes::Bytes;
use std::sync::Arc;
use weft_core::{
    Conf, DispatchError, JobContext, RecordReader, Result, SourceFormat, Split, TaskContext, wire,
};

/// One configured sub-source.
#[derive(Clone)]
pub struct SubSource {
    /// Display name, also usable to look the tag up.
    pub name: String,
    /// The sub-source's format.
    pub format: Arc<dyn SourceFormat>,
}

/// N independently configured source formats read as one.
///
/// Every split is tagged with the ordinal of the sub-format that planned it;
/// readers are opened by that sub-format only.
#[derive(Clone)]
pub struct MultiplexSource {
    entries: Arc<[SubSource]>,
}

impl MultiplexSource {
    /// Compose `(name, format)` pairs, tagged in order.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Arc<dyn SourceFormat>)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, format)| SubSource {
                    name: name.into(),
                    format,
                })
                .collect(),
        }
    }

    /// Reconstruct the sub-formats recorded under `component`.
    ///
    /// Reads `<component>.count`, then for every `i` the optional name
    /// `<component>.<i>.name` and the behavior in slot `<component>.<i>`.
    pub fn from_conf(registry: &BehaviorRegistry, conf: &Conf, component: &str) -> Result<Self> {
        let entries = read_entries(registry, conf, component)?;
        Ok(Self::new(entries))
    }

    /// Number of sub-formats.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is composed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sub-format names in tag order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// The tag of the sub-format named `name`.
    pub fn tag_of(&self, name: &str) -> Result<Tag> {
        self.entries
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

    fn entry(&self, tag: Tag) -> Result<&SubSource> {
        Ok(&self.entries[tag.check(self.entries.len())?])
    }
}

/// Find the tagged split, looking through a host-level [`ProxySplit`].
fn as_tagged(split: &dyn Split) -> Result<&TaggedSplit> {
    let any = split.as_any();
    if let Some(tagged) = any.downcast_ref::<TaggedSplit>() {
        return Ok(tagged);
    }
    if let Some(proxy) = any.downcast_ref::<ProxySplit>() {
        return as_tagged(proxy.inner()?);
    }
    Err(DispatchError::Untagged.into())
}

impl SourceFormat for MultiplexSource {
    fn splits(&self, job: &JobContext) -> Result<Vec<Box<dyn Split>>> {
        let mut all: Vec<Box<dyn Split>> = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let tag = Tag(index as u32);
            let splits = entry.format.splits(job)?;

            #[cfg(feature = "tracing")]
            tracing::debug!(%tag, name = %entry.name, splits = splits.len(), "planned sub-source");

            all.extend(
                splits
                    .into_iter()
                    .map(|inner| Box::new(TaggedSplit::new(tag, inner)) as Box<dyn Split>),
            );
        }
        Ok(all)
    }

    fn open_reader(&self, split: &dyn Split, task: &TaskContext) -> Result<Box<dyn RecordReader>> {
        let tagged = as_tagged(split)?;
        let entry = self.entry(tagged.tag())?;
        let inner = entry.format.open_reader(tagged.inner(), task)?;
        Ok(Box::new(TaggedReader::new(tagged.tag(), inner)))
    }

    fn decode_split(&self, input: &mut Bytes, conf: &Conf) -> Result<Box<dyn Split>> {
        let tag = Tag(wire::get_u32(input)?);
        let inner = self.entry(tag)?.format.decode_split(input, conf)?;
        Ok(Box::new(TaggedSplit::new(tag, inner)))
    }
}
