//! # Opaque Structured Split
//!
//! The generic [`Split`] used when no more specific split type applies. It
//! carries one structured value; two accessors are derived from well-known
//! sub-keys of that value:
//!
//! - `length`: the split's byte length, `0` when absent;
//! - `locations`: locality hints, empty when absent.
//!
//! # Wire Format
//!
//! A length-prefixed JSON text of the value (see [`crate::wire`]).
//!
//! # Locations Across a Round Trip
//!
//! Locations are transport metadata rather than canonical payload. Under the
//! default [`LocationPolicy::Strip`] they are dropped on encode and on decode,
//! so `decode(encode(s)).location_hints()` is empty. Setting
//! `weft.split.locations = retain` in the bound configuration keeps them on
//! both sides.

use crate::{
    capability::Split,
    conf::Conf,
    error::{ConfigError, DecodeError, Result},
    host::Configurable,
    wire,
};
use bytes::{Bytes, BytesMut};
use serde_json::Value;
use std::any::Any;

/// Sub-key holding the split's byte length.
pub const LENGTH_KEY: &str = "length";

/// Sub-key holding the split's locality hints.
pub const LOCATIONS_KEY: &str = "locations";

/// Configuration key selecting the [`LocationPolicy`].
pub const LOCATION_POLICY_KEY: &str = "weft.split.locations";

/// Whether locality hints survive serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocationPolicy {
    /// Drop locations on encode and decode.
    #[default]
    Strip,
    /// Keep locations on encode and decode.
    Retain,
}

impl LocationPolicy {
    /// Read the policy from an optional configuration.
    pub fn from_conf(conf: Option<&Conf>) -> Result<Self> {
        let Some(raw) = conf.and_then(|c| c.get(LOCATION_POLICY_KEY)) else {
            return Ok(Self::default());
        };
        match raw.trim() {
            "strip" => Ok(LocationPolicy::Strip),
            "retain" => Ok(LocationPolicy::Retain),
            other => Err(ConfigError::Invalid {
                key: LOCATION_POLICY_KEY.to_string(),
                value: other.to_string(),
                reason: "expected `strip` or `retain`".to_string(),
            }
            .into()),
        }
    }

    fn apply(self, value: &mut Value) {
        if self == LocationPolicy::Strip {
            if let Some(map) = value.as_object_mut() {
                map.remove(LOCATIONS_KEY);
            }
        }
    }
}

/// A split carrying an arbitrary structured value.
///
/// Equality is defined on the carried value only.
#[derive(Debug, Clone, Default)]
pub struct StructuredSplit {
    conf: Option<Conf>,
    value: Value,
}

impl StructuredSplit {
    /// A split over `value`, without a bound configuration.
    pub fn new(value: Value) -> Self {
        Self { conf: None, value }
    }

    /// A split over `value`, bound to `conf`.
    pub fn with_conf(conf: Conf, value: Value) -> Self {
        Self {
            conf: Some(conf),
            value,
        }
    }

    /// Decode a split, using `conf` as decoding context.
    pub fn read_from(input: &mut Bytes, conf: &Conf) -> Result<Self> {
        let text = wire::get_text(input)?;
        let mut value: Value =
            serde_json::from_str(&text).map_err(|source| DecodeError::Json {
                context: "structured split payload".to_string(),
                source,
            })?;
        LocationPolicy::from_conf(Some(conf))?.apply(&mut value);
        Ok(Self::with_conf(conf.clone(), value))
    }

    /// The carried value.
    pub fn get(&self) -> &Value {
        &self.value
    }

    /// Consume the split, returning the carried value.
    pub fn into_value(self) -> Value {
        self.value
    }
}

impl PartialEq for StructuredSplit {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Split for StructuredSplit {
    fn byte_length(&self) -> u64 {
        self.value
            .get(LENGTH_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    fn location_hints(&self) -> Vec<String> {
        self.value
            .get(LOCATIONS_KEY)
            .and_then(Value::as_array)
            .map(|hosts| {
                hosts
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn encode(&self, out: &mut BytesMut) -> Result<()> {
        let mut canonical = self.value.clone();
        LocationPolicy::from_conf(self.conf.as_ref())?.apply(&mut canonical);
        wire::put_text(out, &canonical.to_string())
    }

    fn decode(&self, input: &mut Bytes) -> Result<Box<dyn Split>> {
        let conf = self.conf.clone().unwrap_or_default();
        Ok(Box::new(Self::read_from(input, &conf)?))
    }

    fn value(&self) -> Value {
        self.value.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Configurable for StructuredSplit {
    fn set_conf(&mut self, conf: Conf) -> Result<()> {
        self.conf = Some(conf);
        Ok(())
    }

    fn conf(&self) -> Option<&Conf> {
        self.conf.as_ref()
    }
}
