//! # weft-core
//!
//! Core traits for the Weft dispatch layer.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! crates that implement capabilities without needing the registry, adapters
//! or multiplexed composites of `weft-std`.
//!
//! # What Lives Here
//!
//! ## Configuration ([`Conf`])
//!
//! An immutable, process-wide, string-keyed map. It is the only channel for
//! passing parameters from the driver to worker processes.
//!
//! ## Behavior References ([`BehaviorReference`], [`Slot`])
//!
//! A slot is a location in the configuration (`<component>.<id>.var`); a
//! reference is what the driver stores there: a `namespace/symbol` name plus
//! optional structured options.
//!
//! ## Capabilities ([`SourceFormat`], [`SinkFormat`], ...)
//!
//! The contracts externally supplied behavior implements. A resolved
//! behavior yields a [`Capability`], the closed set of those contracts.
//!
//! ## Host Lifecycle ([`host`])
//!
//! Configuration injection and binary serialization, the two lifecycles the
//! host framework drives adapters through.
//!
//! # Error Types
//!
//! - [`WeftError`] - Top-level error type
//! - [`ConfigError`] - Missing or invalid configuration
//! - [`ResolutionError`] - Names that do not resolve
//! - [`DispatchError`] - Tags, ids or partitions out of range
//! - [`DecodeError`] - Payloads that fail to parse

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod behavior;
mod capability;
mod conf;
mod context;
mod error;
pub mod host;
mod split;
pub mod wire;

// Re-exports
pub use behavior::{BehaviorId, BehaviorReference, QualifiedName, REFERENCE_MARKER, Slot, component};
pub use capability::{
    Capability, CapabilityKind, Datum, FromCapability, JobCommitter, KeyPartitioner, RecordReader,
    RecordWriter, SinkFormat, SourceFormat, Split, TaskBody,
};
pub use conf::{Conf, ConfBuilder};
pub use context::{JobContext, JobState, TaskAttemptId, TaskContext};
pub use error::{
    BoxError, ConfigError, DecodeError, DispatchError, EncodeError, ResolutionError, Result,
    WeftError,
};
pub use host::{Configurable, Writable};
pub use split::{
    LENGTH_KEY, LOCATION_POLICY_KEY, LOCATIONS_KEY, LocationPolicy, StructuredSplit,
};

pub use bytes;
pub use serde_json;
pub use serde_json::Value;
