//! # weft - Dynamic Behavior Dispatch for Batch Hosts
//!
//! `weft` lets a batch data-processing host run task logic that is not known
//! when the host is built, and lets one job read from or write to several
//! independently configured formats as though they were one.
//!
//! The driver writes behavior references (`namespace/symbol` plus optional
//! structured options) into the job configuration. Workers rebuild the
//! behavior through a [`BehaviorRegistry`]; the host only ever talks to the
//! proxy adapters and multiplexed composites.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use weft::prelude::*;
//!
//! // Driver side
//! let conf = ConfBuilder::new()
//!     .behavior(
//!         &Slot::with_id("mapper", 3),
//!         &BehaviorReference::new("jobs/scale").with_options(json!({"factor": 10})),
//!     )
//!     .build();
//!
//! // Worker side
//! let registry = Arc::new(
//!     BehaviorRegistry::builder()
//!         .define("jobs", "scale", scale_behavior)
//!         .build(),
//! );
//! let mut mapper = ProxyTask::mapper(registry, 3);
//! mapper.set_conf(conf)?;
//! mapper.run(&task, &mut input, &mut output)?;
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): structured logs from resolution and dispatch
//! - `inventory`: link-time behavior registration, [`BehaviorRegistry::global`]
//! - `macros`: the `#[behavior]` attribute

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub use weft_core::{
    // Behavior references
    BehaviorId,
    BehaviorReference,
    // Error types
    BoxError,
    // Capabilities
    Capability,
    CapabilityKind,
    // Configuration
    Conf,
    ConfBuilder,
    ConfigError,
    // Host lifecycle
    Configurable,
    Datum,
    DecodeError,
    DispatchError,
    EncodeError,
    FromCapability,
    JobCommitter,
    // Contexts
    JobContext,
    JobState,
    KeyPartitioner,
    LENGTH_KEY,
    LOCATION_POLICY_KEY,
    LOCATIONS_KEY,
    // Splits
    LocationPolicy,
    QualifiedName,
    REFERENCE_MARKER,
    RecordReader,
    RecordWriter,
    ResolutionError,
    Result,
    SinkFormat,
    Slot,
    SourceFormat,
    Split,
    StructuredSplit,
    TaskAttemptId,
    TaskBody,
    TaskContext,
    Value,
    WeftError,
    Writable,
    bytes,
    component,
    serde_json,
    wire,
};

// Registry
pub use weft_std::registry::{Behavior, BehaviorRegistry, BehaviorRegistryBuilder, Namespace};

// Adapters
pub use weft_std::proxy::{
    LazyBinding, ProxyCommitter, ProxyPartitioner, ProxyRecordWriter, ProxySinkFormat,
    ProxySourceFormat, ProxySplit, ProxyTask,
};

// Multiplexing
pub use weft_std::multiplex::{
    MultiplexCommitter, MultiplexMapper, MultiplexSink, MultiplexSource, MultiplexWriter, Tag,
    TaggedReader, TaggedSplit,
};

/// Behavior registry.
pub mod registry {
    #![allow(clippy::wildcard_imports)]
    pub use weft_std::registry::*;
}

/// Multiplexed sources and sinks.
pub mod multiplex {
    #![allow(clippy::wildcard_imports)]
    pub use weft_std::multiplex::*;
}

/// In-memory input.
pub mod memory {
    #![allow(clippy::wildcard_imports)]
    pub use weft_std::memory::*;
}

/// Sampled input.
pub mod sample {
    #![allow(clippy::wildcard_imports)]
    pub use weft_std::sample::*;
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use weft_std::testing::*;
}

/// Prelude module - common imports for Weft.
///
/// # Usage
///
/// ```rust,ignore
/// use weft::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BehaviorReference,
        BehaviorRegistry,
        BoxError,
        Capability,
        Conf,
        ConfBuilder,
        Configurable,
        Datum,
        JobCommitter,
        JobContext,
        KeyPartitioner,
        MultiplexSink,
        MultiplexSource,
        ProxySinkFormat,
        ProxySourceFormat,
        ProxySplit,
        ProxyTask,
        RecordReader,
        RecordWriter,
        SinkFormat,
        Slot,
        SourceFormat,
        Split,
        TaskBody,
        TaskContext,
        Value,
        WeftError,
        Writable,
    };
}

#[cfg(feature = "macros")]
pub use weft_macros::behavior;

#[cfg(feature = "inventory")]
pub use inventory;
