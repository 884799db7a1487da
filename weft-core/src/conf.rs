//! # Configuration Store
//!
//! The only channel for passing parameters across the driver/worker boundary.
//!
//! The driver writes entries through a [`ConfBuilder`] at job-construction
//! time and freezes them into a [`Conf`]. A `Conf` is immutable and
//! reference-counted, so handing it to every adapter of a task is O(1).
//! It serializes as a flat JSON object for broadcast to worker processes.
//!
//! # Example
//!
//! ```rust,ignore
//! let conf = ConfBuilder::new()
//!     .behavior(&Slot::with_id("mapper", 3), &BehaviorReference::new("myns/handler"))
//!     .set("weft.split.locations", "retain")
//!     .build();
//!
//! let shipped = conf.to_json()?;
//! let on_worker = Conf::from_json(&shipped)?;
//! assert_eq!(conf, on_worker);
//! ```

use crate::{
    behavior::{BehaviorReference, Slot},
    error::{ConfigError, DecodeError, Result, WeftError},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, sync::Arc};

/// An immutable, shared, string-keyed configuration map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conf(Arc<BTreeMap<String, String>>);

impl Conf {
    /// An empty configuration.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start a builder seeded with this configuration's entries.
    pub fn to_builder(&self) -> ConfBuilder {
        ConfBuilder {
            entries: (*self.0).clone(),
        }
    }

    /// Look up a raw entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Look up an entry that the driver must have written.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            ConfigError::Missing {
                key: key.to_string(),
            }
            .into()
        })
    }

    /// Decode an optional entry holding a structured value.
    ///
    /// Absent keys yield `None`; present but unparsable keys are a
    /// [`DecodeError`] naming the key.
    pub fn get_value(&self, key: &str) -> Result<Option<Value>> {
        match self.get(key) {
            None => Ok(None),
            Some(text) => serde_json::from_str(text)
                .map(Some)
                .map_err(|source| {
                    DecodeError::Json {
                        context: format!("configuration key `{key}`"),
                        source,
                    }
                    .into()
                }),
        }
    }

    /// Read a required non-negative integer entry.
    pub fn require_u32(&self, key: &str) -> Result<u32> {
        let raw = self.require(key)?;
        parse_unsigned(key, raw)
    }

    /// Read an optional non-negative integer entry.
    pub fn get_u64(&self, key: &str) -> Result<Option<u64>> {
        self.get(key).map(|raw| parse_unsigned(key, raw)).transpose()
    }

    /// Whether the key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the configuration has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serialize for broadcast to worker processes.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(WeftError::custom)
    }

    /// Rebuild a configuration shipped by [`Conf::to_json`].
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|source| {
            DecodeError::Json {
                context: "serialized configuration".to_string(),
                source,
            }
            .into()
        })
    }
}

fn parse_unsigned<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        ConfigError::Invalid {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a non-negative integer".to_string(),
        }
        .into()
    })
}

/// Driver-side builder for a [`Conf`].
#[derive(Debug, Clone, Default)]
pub struct ConfBuilder {
    entries: BTreeMap<String, String>,
}

impl ConfBuilder {
    /// Create a new empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an entry.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_mut(key, value);
        self
    }

    /// Set an entry (mutable version).
    pub fn set_mut(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Store a structured value as JSON text.
    pub fn set_value(mut self, key: impl Into<String>, value: &Value) -> Self {
        self.entries.insert(key.into(), value.to_string());
        self
    }

    /// Remove an entry.
    pub fn unset(mut self, key: &str) -> Self {
        self.entries.remove(key);
        self
    }

    /// Write a behavior reference into the slot's keys.
    pub fn behavior(mut self, slot: &Slot, reference: &BehaviorReference) -> Self {
        self.behavior_mut(slot, reference);
        self
    }

    /// Write a behavior reference into the slot's keys (mutable version).
    ///
    /// Any stale options entry of the slot is removed when the reference
    /// carries none, so a rewritten slot never inherits old options.
    pub fn behavior_mut(&mut self, slot: &Slot, reference: &BehaviorReference) {
        self.entries
            .insert(slot.var_key(), reference.qualified_name().to_string());
        if let Some(options_key) = slot.options_key() {
            match reference.options() {
                Some(options) => {
                    self.entries.insert(options_key, options.to_string());
                }
                None => {
                    self.entries.remove(&options_key);
                }
            }
        }
    }

    /// Freeze into an immutable configuration.
    pub fn build(self) -> Conf {
        Conf(Arc::new(self.entries))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Conf {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut builder = ConfBuilder::new();
        for (k, v) in iter {
            builder.set_mut(k, v);
        }
        builder.build()
    }
}
