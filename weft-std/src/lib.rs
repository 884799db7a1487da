//! # weft-std
//!
//! Standard implementations for the Weft dispatch layer.
//!
//! This crate provides:
//! - **Behavior registry**: [`BehaviorRegistry`], namespaces with lazy loaders,
//!   link-time registration with the `inventory` feature
//! - **Proxy adapters**: [`ProxySourceFormat`], [`ProxySplit`],
//!   [`ProxySinkFormat`], [`ProxyPartitioner`], [`ProxyTask`], ...
//! - **Multiplexed I/O**: [`MultiplexSource`], [`MultiplexSink`]
//! - **In-memory input**: [`MemorySource`]
//! - **Sampled input**: [`SampleSource`]
//! - **Testing doubles**: [`testing`]
//!
//! [`BehaviorRegistry`]: registry::BehaviorRegistry
//! [`ProxySourceFormat`]: proxy::ProxySourceFormat
//! [`ProxySplit`]: proxy::ProxySplit
//! [`ProxySinkFormat`]: proxy::ProxySinkFormat
//! [`ProxyPartitioner`]: proxy::ProxyPartitioner
//! [`ProxyTask`]: proxy::ProxyTask
//! [`MultiplexSource`]: multiplex::MultiplexSource
//! [`MultiplexSink`]: multiplex::MultiplexSink
//! [`MemorySource`]: memory::MemorySource
//! [`SampleSource`]: sample::SampleSource

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use weft_core;

// Modules
pub mod memory;
pub mod multiplex;
pub mod proxy;
pub mod registry;
pub mod sample;
pub mod testing;

#[cfg(feature = "inventory")]
pub use inventory;
