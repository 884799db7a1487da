use bytes::{BufMut, Bytes, BytesMut};
use serde_json::json;
use std::{any::Any, fmt};
use weft_core::{Datum, DispatchError, RecordReader, Result, Split, Value, wire};

/// Zero-based ordinal of a sub-source or sub-sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(pub u32);

impl Tag {
    /// The tag as an index into the sub-format list.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Check the tag against `len` configured sub-formats.
    pub fn check(self, len: usize) -> Result<usize> {
        let index = self.index();
        if index < len {
            return Ok(index);
        }

        #[cfg(feature = "tracing")]
        tracing::error!(tag = self.0, len, "tag out of range");

        Err(DispatchError::TagOutOfRange { tag: self.0, len }.into())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Tag {
    fn from(tag: u32) -> Self {
        Tag(tag)
    }
}

// ============================================================================
// TaggedSplit
// ============================================================================

/// A sub-format's split paired with the tag of the sub-format.
///
/// Wire format: `u32` tag followed by the inner split's encoding.
#[derive(Debug)]
pub struct TaggedSplit {
    tag: Tag,
    inner: Box<dyn Split>,
}

impl TaggedSplit {
    /// Pair a split with its tag.
    pub fn new(tag: Tag, inner: Box<dyn Split>) -> Self {
        Self { tag, inner }
    }

    /// The sub-format tag.
    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The sub-format's own split.
    pub fn inner(&self) -> &dyn Split {
        self.inner.as_ref()
    }

    /// Split into tag and inner split.
    pub fn into_parts(self) -> (Tag, Box<dyn Split>) {
        (self.tag, self.inner)
    }
}

impl Split for TaggedSplit {
    fn byte_length(&self) -> u64 {
        self.inner.byte_length()
    }

    fn location_hints(&self) -> Vec<String> {
        self.inner.location_hints()
    }

    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        out.put_u32(self.tag.0);
        self.inner.encode(out)
    }

    /// Decodes splits of the same tag only; use
    /// [`MultiplexSource::decode_split`](super::MultiplexSource) for input
    /// mixing tags.
    fn decode(&self, input: &mut Bytes) -> Result<Box<dyn Split>> {
        let found = wire::get_u32(input)?;
        if found != self.tag.0 {
            return Err(DispatchError::TagMismatch {
                expected: self.tag.0,
                found,
            }
            .into());
        }
        Ok(Box::new(Self::new(self.tag, self.inner.decode(input)?)))
    }

    fn value(&self) -> Value {
        json!([self.tag.0, self.inner.value()])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ============================================================================
// TaggedReader
// ============================================================================

/// Reader over a tagged split; reports the sub-reader's records unchanged.
pub struct TaggedReader {
    tag: Tag,
    inner: Box<dyn RecordReader>,
}

impl TaggedReader {
    /// Wrap a sub-format's reader.
    pub fn new(tag: Tag, inner: Box<dyn RecordReader>) -> Self {
        Self { tag, inner }
    }

    /// The sub-format the records come from.
    pub fn tag(&self) -> Tag {
        self.tag
    }
}

impl RecordReader for TaggedReader {
    fn advance(&mut self) -> Result<bool> {
        self.inner.advance()
    }

    fn current_key(&self) -> Option<&Datum> {
        self.inner.current_key()
    }

    fn current_value(&self) -> Option<&Datum> {
        self.inner.current_value()
    }

    fn progress(&self) -> f32 {
        self.inner.progress()
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    fn as_any(&self) -> Option<&dyn Any> {
        Some(self)
    }
}
