//! # Multiplexed Sources and Sinks
//!
//! Compose N independently configured formats into one logical format.
//!
//! On the input side every split is wrapped in a [`TaggedSplit`] carrying the
//! ordinal ([`Tag`]) of the sub-source that planned it, so a worker can route
//! the split back to that sub-source. On the output side records are routed
//! by tag to lazily opened sub-writers, and the commit protocol is fanned out
//! to the sub-sinks' committers.
//!
//! # Configuration Layout
//!
//! A composite recorded under `component` uses:
//!
//! | Key                          | Content                          |
//! |------------------------------|----------------------------------|
//! | `<component>.count`          | number of sub-formats            |
//! | `<component>.<i>.name`       | optional name, defaults to `<i>` |
//! | `<component>.<i>.var`        | behavior of sub-format `i`       |
//! | `<component>.<i>.options`    | its options                      |
//! | `<component>.mapper.<i>.var` | mapper of sub-source `i`         |
//!
//! The per-sub-source mappers are read by [`MultiplexMapper`].

mod sink;
mod source;
mod tagged;
mod task;

pub use sink::{MultiplexCommitter, MultiplexSink, MultiplexWriter, SubSink};
pub use source::{MultiplexSource, SubSource};
pub use tagged::{Tag, TaggedReader, TaggedSplit};
pub use task::MultiplexMapper;

use crate::registry::BehaviorRegistry;
use weft_core::{BehaviorReference, Conf, ConfBuilder, FromCapability, Result, Slot};

/// Record the sub-format list of a composite under `component`.
pub fn write_entries<I, S>(builder: &mut ConfBuilder, component: &str, entries: I)
where
    I: IntoIterator<Item = (S, BehaviorReference)>,
    S: Into<String>,
{
    let mut count = 0u32;
    for (name, reference) in entries {
        builder.set_mut(format!("{component}.{count}.name"), name);
        builder.behavior_mut(&Slot::with_id(component.to_string(), count), &reference);
        count += 1;
    }
    builder.set_mut(format!("{component}.count"), count.to_string());
}

/// Resolve the sub-format list recorded under `component`.
pub(crate) fn read_entries<T: FromCapability>(
    registry: &BehaviorRegistry,
    conf: &Conf,
    component: &str,
) -> Result<Vec<(String, T)>> {
    let count = conf.require_u32(&format!("{component}.count"))?;
    (0..count)
        .map(|i| {
            let name = conf
                .get(&format!("{component}.{i}.name"))
                .map_or_else(|| i.to_string(), str::to_string);
            let handle = registry.resolve(conf, &Slot::with_id(component.to_string(), i))?;
            Ok((name, handle))
        })
        .collect()
}
