//! Behavior references and the configuration slots they live in.
//!
//! A [`Slot`] names where a behavior is stored in the configuration store:
//! a component prefix plus an optional job-scoped [`BehaviorId`]. A
//! [`BehaviorReference`] is what is stored there: a qualified
//! `namespace/symbol` name and an optional structured options value.

use crate::{
    conf::Conf,
    error::{ResolutionError, Result},
};
use serde_json::Value;
use std::{borrow::Cow, fmt};

/// Marker that may prefix a qualified name to flag it as a reference.
pub const REFERENCE_MARKER: &str = "#'";

/// Well-known component prefixes.
pub mod component {
    /// Mapper task bodies.
    pub const MAPPER: &str = "mapper";
    /// Combiner task bodies.
    pub const COMBINER: &str = "combiner";
    /// Reducer task bodies.
    pub const REDUCER: &str = "reducer";
    /// Key partitioners.
    pub const PARTITIONER: &str = "partitioner";
    /// Source formats.
    pub const INPUT_FORMAT: &str = "input-format";
    /// Split prototypes.
    pub const INPUT_SPLIT: &str = "input-split";
    /// Sink formats.
    pub const OUTPUT_FORMAT: &str = "output-format";
}

/// A job-scoped identifier selecting one behavior of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BehaviorId(pub u32);

impl fmt::Display for BehaviorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u32> for BehaviorId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// The configuration location of one behavior.
///
/// With an id the slot owns the keys `<component>.<id>.var` and
/// `<component>.<id>.options`. Without an id it is the single-behavior
/// encoding whose only key is `<component>` itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slot {
    component: Cow<'static, str>,
    id: Option<BehaviorId>,
}

impl Slot {
    /// A slot selected by id within a component.
    pub fn with_id(component: impl Into<Cow<'static, str>>, id: impl Into<BehaviorId>) -> Self {
        Self {
            component: component.into(),
            id: Some(id.into()),
        }
    }

    /// The single-behavior slot of a component.
    pub fn single(component: impl Into<Cow<'static, str>>) -> Self {
        Self {
            component: component.into(),
            id: None,
        }
    }

    /// The component prefix.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// The behavior id, if any.
    pub fn id(&self) -> Option<BehaviorId> {
        self.id
    }

    /// Key holding the qualified name.
    pub fn var_key(&self) -> String {
        match self.id {
            Some(id) => format!("{}.{id}.var", self.component),
            None => self.component.to_string(),
        }
    }

    /// Key holding the structured options, if this slot has one.
    pub fn options_key(&self) -> Option<String> {
        self.id.map(|id| format!("{}.{id}.options", self.component))
    }

    /// Key of the superseded positional-arguments encoding.
    pub fn legacy_args_key(&self) -> Option<String> {
        self.id.map(|id| format!("{}.{id}.args", self.component))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "slot `{}.{id}`", self.component),
            None => write!(f, "slot `{}`", self.component),
        }
    }
}

/// "Which external logic to run and with what options."
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorReference {
    qualified_name: String,
    options: Option<Value>,
}

impl BehaviorReference {
    /// A reference without options.
    pub fn new(qualified_name: impl Into<String>) -> Self {
        Self {
            qualified_name: qualified_name.into(),
            options: None,
        }
    }

    /// Attach a structured options value.
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    /// Read the reference stored in a slot.
    pub fn from_conf(conf: &Conf, slot: &Slot) -> Result<Self> {
        let qualified_name = conf.require(&slot.var_key())?.to_string();
        let options = match slot.options_key() {
            Some(key) => conf.get_value(&key)?,
            None => None,
        };
        Ok(Self {
            qualified_name,
            options,
        })
    }

    /// The qualified name as written, marker included.
    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    /// The options value, if any.
    pub fn options(&self) -> Option<&Value> {
        self.options.as_ref()
    }

    /// Take the options value out of the reference.
    pub fn into_options(self) -> Option<Value> {
        self.options
    }

    /// Split the name into namespace and symbol.
    pub fn target(&self) -> Result<QualifiedName<'_>> {
        QualifiedName::parse(&self.qualified_name)
    }
}

/// A parsed `namespace/symbol` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualifiedName<'a> {
    /// Namespace part.
    pub namespace: &'a str,
    /// Symbol part.
    pub symbol: &'a str,
}

impl<'a> QualifiedName<'a> {
    /// Parse a qualified name, stripping [`REFERENCE_MARKER`].
    ///
    /// The name is split at the first `/`; the symbol may contain further
    /// slashes.
    pub fn parse(raw: &'a str) -> Result<Self> {
        let name = raw.trim();
        let name = name.strip_prefix(REFERENCE_MARKER).unwrap_or(name);
        match name.split_once('/') {
            Some((namespace, symbol)) if !namespace.is_empty() && !symbol.is_empty() => {
                Ok(Self { namespace, symbol })
            }
            _ => Err(ResolutionError::MalformedName {
                name: raw.to_string(),
            }
            .into()),
        }
    }
}

impl fmt::Display for QualifiedName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.symbol)
    }
}
