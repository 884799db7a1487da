//! # Proxy Adapters
//!
//! Host-facing adapters that hold exactly one resolved capability and forward
//! every call to it.
//!
//! Each adapter supports both construction paths the host uses:
//!
//! - **eager** (`bind`): resolve now, optionally with explicit options;
//! - **lazy** (`new` + [`Configurable::set_conf`]): the host creates the
//!   adapter without arguments and injects the configuration later.
//!
//! Resolution happens at most once per adapter ([`LazyBinding`]). An adapter
//! used before it is bound fails with [`ConfigError::Unbound`].
//!
//! [`Configurable::set_conf`]: weft_core::Configurable::set_conf
//! [`ConfigError::Unbound`]: weft_core::ConfigError::Unbound

mod binding;
mod partitioner;
mod sink;
mod source;
mod split;
mod task;

pub use binding::LazyBinding;
pub use partitioner::ProxyPartitioner;
pub use sink::{ProxyCommitter, ProxyRecordWriter, ProxySinkFormat};
pub use source::ProxySourceFormat;
pub use split::ProxySplit;
pub use task::ProxyTask;
