//! The per-invocation execution context
//!
//! A [`Frame`] bundles everything one action invocation needs: parsed input
//! records, query options, the acting identity, and the mutable response
//! metadata. It is created once per invocation, normalized in place by the
//! validator, and consumed when the executor produces its result.

use indexmap::IndexMap;
use serde_json::Value;

use crate::core::context::ActorContext;

/// A single option value as submitted by the caller.
///
/// Options arrive as loosely typed request parameters; the validator
/// normalizes enumerated options (e.g. a comma-separated `include` string)
/// into [`OptionValue::List`] before the query function runs.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Str(String),
    List(Vec<String>),
    Int(i64),
    Bool(bool),
}

impl OptionValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            OptionValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(n) => Some(*n),
            OptionValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            OptionValue::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// The individual values an enumerated constraint inspects: the elements
    /// of a list, or the comma-separated segments of a single string.
    pub fn elements(&self) -> Vec<String> {
        match self {
            OptionValue::List(items) => items.clone(),
            OptionValue::Str(s) => s
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_owned)
                .collect(),
            OptionValue::Int(n) => vec![n.to_string()],
            OptionValue::Bool(b) => vec![b.to_string()],
        }
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_owned())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::List(value)
    }
}

/// Response-control flags attached to an action result.
///
/// The recognized vocabulary is deliberately small: downstream caches only
/// need to know whether a mutation produced an observable change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseHeaders {
    pub cache_invalidate: Option<bool>,
}

impl ResponseHeaders {
    pub const fn none() -> Self {
        ResponseHeaders {
            cache_invalidate: None,
        }
    }

    pub const fn invalidate_cache(flag: bool) -> Self {
        ResponseHeaders {
            cache_invalidate: Some(flag),
        }
    }

    /// Overlay another header set on top of this one. Flags set in the
    /// overlay win; unset flags keep the base value.
    pub fn merged(self, overlay: ResponseHeaders) -> ResponseHeaders {
        ResponseHeaders {
            cache_invalidate: overlay.cache_invalidate.or(self.cache_invalidate),
        }
    }
}

/// Execution context for one action invocation.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Input entity name -> ordered submitted records
    pub data: IndexMap<String, Vec<Value>>,
    /// Option name -> submitted value (normalized in place by the validator)
    pub options: IndexMap<String, OptionValue>,
    /// Acting identity
    pub context: ActorContext,
    /// Per-request response metadata
    pub headers: ResponseHeaders,
}

impl Frame {
    pub fn builder() -> FrameBuilder {
        FrameBuilder::default()
    }

    /// Look up a submitted option by name.
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// All submitted records for an input entity, empty if none.
    pub fn records(&self, entity: &str) -> &[Value] {
        self.data.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first submitted record for an input entity.
    pub fn first_record(&self, entity: &str) -> Option<&Value> {
        self.records(entity).first()
    }
}

/// Builder for [`Frame`].
#[derive(Debug, Default)]
pub struct FrameBuilder {
    data: IndexMap<String, Vec<Value>>,
    options: IndexMap<String, OptionValue>,
    context: Option<ActorContext>,
    headers: ResponseHeaders,
}

impl FrameBuilder {
    pub fn context(mut self, context: ActorContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn option(mut self, name: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(name.into(), value.into());
        self
    }

    /// Append one input record under an entity name.
    pub fn record(mut self, entity: impl Into<String>, record: Value) -> Self {
        self.data.entry(entity.into()).or_default().push(record);
        self
    }

    pub fn headers(mut self, headers: ResponseHeaders) -> Self {
        self.headers = headers;
        self
    }

    pub fn build(self) -> Frame {
        Frame {
            data: self.data,
            options: self.options,
            context: self.context.unwrap_or(ActorContext::Anonymous),
            headers: self.headers,
        }
    }
}
