//! Host framework lifecycle contracts.
//!
//! The host instantiates adapters without arguments, then injects the job
//! configuration through [`Configurable::set_conf`]. Splits additionally
//! travel between processes through [`Writable`].

use crate::{conf::Conf, error::Result};
use bytes::{Bytes, BytesMut};

/// Configuration injection lifecycle.
///
/// Hosts may call `set_conf` more than once (for instance when an object is
/// reconstructed for a speculative attempt); implementations must be
/// idempotent.
pub trait Configurable {
    /// Inject the job configuration.
    fn set_conf(&mut self, conf: Conf) -> Result<()>;

    /// The injected configuration, if any.
    fn conf(&self) -> Option<&Conf>;
}

/// Binary serialization lifecycle for objects shipped to workers.
pub trait Writable {
    /// Serialize into `out`.
    fn write(&self, out: &mut BytesMut) -> Result<()>;

    /// Replace this object's state with the one read from `input`.
    fn read_fields(&mut self, input: &mut Bytes) -> Result<()>;
}
