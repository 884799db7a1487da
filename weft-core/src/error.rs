//! Error types for Weft.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`WeftError`] - Top-level error type for all Weft operations
//! - [`ConfigError`] - Missing or unusable configuration entries
//! - [`ResolutionError`] - Qualified names that do not resolve to a behavior
//! - [`DispatchError`] - Tags, ids or partitions outside the valid range
//! - [`DecodeError`] - Structured values or split payloads that fail to parse
//! - [`EncodeError`] - Values that cannot be framed for the wire

use crate::{behavior::Slot, capability::CapabilityKind};
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout Weft.
pub type Result<T, E = WeftError> = std::result::Result<T, E>;

/// Top-level error type for all Weft operations.
#[derive(Error, Debug)]
pub enum WeftError {
    /// A configuration entry is missing or unusable.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A behavior reference could not be resolved.
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// A tag, id or partition is outside the valid range.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// A structured value or split payload failed to decode.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A value could not be framed for the wire.
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Storage I/O failure raised by a capability implementation.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any other failure raised by a capability implementation.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors about the content of the configuration store.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required key was never written by the driver.
    #[error("missing required configuration key `{key}`")]
    Missing {
        /// The key that was looked up.
        key: String,
    },

    /// A key is present but its value cannot be used.
    #[error("invalid value `{value}` for configuration key `{key}`: {reason}")]
    Invalid {
        /// The offending key.
        key: String,
        /// The raw value found.
        value: String,
        /// What was expected.
        reason: String,
    },

    /// An adapter was used before a configuration was injected.
    #[error("{adapter} for {slot} used before a configuration was set")]
    Unbound {
        /// Adapter type name.
        adapter: &'static str,
        /// Slot the adapter resolves from.
        slot: Slot,
    },
}

/// Errors that occur while turning a qualified name into a live behavior.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// The qualified name is not of the form `namespace/symbol`.
    #[error("malformed qualified name `{name}` (expected `namespace/symbol`)")]
    MalformedName {
        /// The raw name.
        name: String,
    },

    /// No namespace with this name is known to the registry.
    #[error("unknown namespace `{namespace}` while resolving `{qualified}`")]
    UnknownNamespace {
        /// The namespace part.
        namespace: String,
        /// The full qualified name.
        qualified: String,
    },

    /// The namespace loaded but does not define the symbol.
    #[error("namespace `{namespace}` does not define `{symbol}`")]
    UnknownSymbol {
        /// The namespace part.
        namespace: String,
        /// The symbol part.
        symbol: String,
    },

    /// The namespace loader failed.
    #[error("failed to load namespace `{namespace}`: {reason}")]
    LoadFailed {
        /// The namespace whose loader failed.
        namespace: String,
        /// Loader failure message.
        reason: String,
    },

    /// The behavior produced a capability of another kind.
    #[error("`{qualified}` produced a {found} where a {expected} was required")]
    WrongCapability {
        /// The full qualified name.
        qualified: String,
        /// The kind the caller asked for.
        expected: CapabilityKind,
        /// The kind the behavior returned.
        found: CapabilityKind,
    },

    /// The behavior itself failed while building its capability.
    #[error("behavior `{qualified}` failed")]
    Behavior {
        /// The full qualified name.
        qualified: String,
        /// The failure raised by the behavior.
        #[source]
        source: BoxError,
    },
}

/// Errors raised when a tag, id or partition is outside the valid range.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// A tag refers to a sub-source or sub-sink that does not exist.
    #[error("tag {tag} out of range for {len} configured sub-formats")]
    TagOutOfRange {
        /// The offending tag.
        tag: u32,
        /// The number of configured sub-formats.
        len: usize,
    },

    /// A sub-sink name is not part of the multiplexed sink.
    #[error("no sub-format named `{name}`")]
    UnknownName {
        /// The requested name.
        name: String,
    },

    /// A tagged split prototype was asked to decode a sibling's split.
    #[error("split tagged {found} cannot be decoded by the prototype for tag {expected}")]
    TagMismatch {
        /// Tag of the prototype.
        expected: u32,
        /// Tag read from the input.
        found: u32,
    },

    /// A multiplexed component received a split that carries no tag.
    #[error("split is not tagged with a sub-format index")]
    Untagged,

    /// A pair-keyed write did not carry a `[tag, key]` pair.
    #[error("multiplexed write key must be a `[tag, key]` pair, got {found}")]
    MalformedTaggedKey {
        /// The key that was received.
        found: String,
    },

    /// A partitioner returned a partition outside `[0, partitions)`.
    #[error("partitioner returned {partition} for {partitions} partitions")]
    PartitionOutOfRange {
        /// The returned partition.
        partition: u32,
        /// The number of partitions.
        partitions: u32,
    },

    /// A partition was requested for zero partitions.
    #[error("cannot partition into zero partitions")]
    NoPartitions,
}

/// Errors raised while decoding structured values or split payloads.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The text is not a valid structured value.
    #[error("invalid structured value in {context}")]
    Json {
        /// Where the text came from (a key name, a split type).
        context: String,
        /// The parser failure.
        #[source]
        source: serde_json::Error,
    },

    /// The input ended before the announced payload.
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        remaining: usize,
    },

    /// The payload is not valid UTF-8 text.
    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::str::Utf8Error),

    /// The payload parsed but does not have the expected shape.
    #[error("unexpected payload shape: {0}")]
    Shape(String),
}

/// Errors raised while writing a split or frame.
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The payload does not fit the `u32` length prefix.
    #[error("payload of {len} bytes exceeds the u32 length prefix")]
    TooLong {
        /// Payload size in bytes.
        len: usize,
    },
}

// Convenience conversions
impl From<BoxError> for WeftError {
    fn from(err: BoxError) -> Self {
        WeftError::Custom(err)
    }
}

impl WeftError {
    /// Wrap any error raised by a capability implementation.
    pub fn custom<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        WeftError::Custom(err.into())
    }
}
