//! Parameter bindings
//!
//! A [`Binding`] describes where one handler argument comes from. The route
//! compiler turns a route's bindings into a fixed-length plan; at request
//! time each slot is filled with an [`Arg`] and the whole list is handed to
//! the handler as [`Args`].
//!
//! ```
//! use trellis_core::{Binding, FieldRule, Schema};
//!
//! let create = Schema::new("CreateItem").field("name", FieldRule::string().min(1));
//!
//! let plan = vec![
//!     Binding::param("id"),
//!     Binding::validated_body(create),
//!     Binding::context_field("user"),
//! ];
//! assert_eq!(plan.len(), 3);
//! ```

use crate::context::{ContextSnapshot, RequestContext};
use crate::Error;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use trellis_validation::{validate, Schema};

/// Source of one handler argument.
#[derive(Debug, Clone)]
pub enum Binding {
    /// The request body, validated when a schema is attached
    Body { schema: Option<Arc<Schema>> },
    /// One query value by key, or the whole query map when `key` is `None`
    Query {
        key: Option<String>,
        schema: Option<Arc<Schema>>,
    },
    /// One path parameter by key, or the whole parameter map
    Param { key: Option<String> },
    /// All request headers as an object
    Header,
    /// A snapshot of the request context
    Context,
    /// One value stored in the context by a plugin
    ContextField { name: String },
}

impl Binding {
    pub fn body() -> Self {
        Binding::Body { schema: None }
    }

    pub fn validated_body(schema: impl Into<Arc<Schema>>) -> Self {
        Binding::Body {
            schema: Some(schema.into()),
        }
    }

    pub fn query(key: impl Into<String>) -> Self {
        Binding::Query {
            key: Some(key.into()),
            schema: None,
        }
    }

    /// A single query value validated as field `key` of `schema`.
    pub fn validated_query(key: impl Into<String>, schema: impl Into<Arc<Schema>>) -> Self {
        Binding::Query {
            key: Some(key.into()),
            schema: Some(schema.into()),
        }
    }

    pub fn query_map() -> Self {
        Binding::Query {
            key: None,
            schema: None,
        }
    }

    pub fn validated_query_map(schema: impl Into<Arc<Schema>>) -> Self {
        Binding::Query {
            key: None,
            schema: Some(schema.into()),
        }
    }

    pub fn param(key: impl Into<String>) -> Self {
        Binding::Param {
            key: Some(key.into()),
        }
    }

    pub fn params() -> Self {
        Binding::Param { key: None }
    }

    pub fn header() -> Self {
        Binding::Header
    }

    pub fn context() -> Self {
        Binding::Context
    }

    pub fn context_field(name: impl Into<String>) -> Self {
        Binding::ContextField { name: name.into() }
    }

    /// Resolve this binding against the current request.
    pub fn extract(&self, ctx: &RequestContext) -> Result<Arg, Error> {
        let request = ctx.request();
        match self {
            Binding::Body { schema } => {
                let body = match &request.parsed_body {
                    Some(parsed) => parsed.clone(),
                    None if request.body.is_empty() => Value::Null,
                    None => Value::String(String::from_utf8_lossy(&request.body).into_owned()),
                };
                match schema {
                    Some(schema) => Ok(Arg::Value(validate(&body, schema)?)),
                    None => Ok(Arg::Value(body)),
                }
            }
            Binding::Query { key: Some(key), schema } => {
                let raw = request.query(key).map(str::to_string);
                match schema {
                    Some(schema) => {
                        let mut record = Map::new();
                        if let Some(raw) = raw {
                            record.insert(key.clone(), Value::String(raw));
                        }
                        let clean = validate(&Value::Object(record), schema)?;
                        Ok(Arg::Value(clean.get(key).cloned().unwrap_or(Value::Null)))
                    }
                    None => Ok(Arg::Text(raw)),
                }
            }
            Binding::Query { key: None, schema } => {
                let query = string_map(&request.query);
                match schema {
                    Some(schema) => Ok(Arg::Value(validate(&query, schema)?)),
                    None => Ok(Arg::Value(query)),
                }
            }
            Binding::Param { key: Some(key) } => Ok(Arg::Text(ctx.param(key).map(str::to_string))),
            Binding::Param { key: None } => Ok(Arg::Value(string_map(ctx.params()))),
            Binding::Header => Ok(Arg::Value(string_map(&request.headers))),
            Binding::Context => Ok(Arg::Context(ctx.snapshot())),
            Binding::ContextField { name } => {
                Ok(Arg::Value(ctx.get(name).cloned().unwrap_or(Value::Null)))
            }
        }
    }
}

fn string_map(map: &HashMap<String, String>) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect(),
    )
}

/// One bound handler argument.
#[derive(Debug, Clone, Default)]
pub enum Arg {
    /// No binding was declared for this slot
    #[default]
    Missing,
    Value(Value),
    /// A single query value or path parameter, `None` when absent
    Text(Option<String>),
    Context(ContextSnapshot),
}

/// Arguments for one handler invocation, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Args(Vec<Arg>);

impl Args {
    pub fn new(args: Vec<Arg>) -> Self {
        Self(args)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Arg> {
        self.0.get(index)
    }

    pub fn is_missing(&self, index: usize) -> bool {
        matches!(self.get(index), None | Some(Arg::Missing))
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        match self.get(index) {
            Some(Arg::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Textual argument; also accepts a bound JSON string.
    pub fn text(&self, index: usize) -> Option<&str> {
        match self.get(index) {
            Some(Arg::Text(Some(text))) => Some(text),
            Some(Arg::Value(Value::String(text))) => Some(text),
            _ => None,
        }
    }

    pub fn context(&self, index: usize) -> Option<&ContextSnapshot> {
        match self.get(index) {
            Some(Arg::Context(snapshot)) => Some(snapshot),
            _ => None,
        }
    }

    /// Deserialize an argument. Absent values deserialize from `null`, so
    /// `Option<T>` accepts a missing slot.
    pub fn json<T: DeserializeOwned>(&self, index: usize) -> Result<T, Error> {
        let value = match self.get(index) {
            Some(Arg::Value(value)) => value.clone(),
            Some(Arg::Text(Some(text))) => Value::String(text.clone()),
            Some(Arg::Context(snapshot)) => serde_json::to_value(&snapshot.data)
                .map_err(|e| Error::Serialization(e.to_string()))?,
            _ => Value::Null,
        };
        serde_json::from_value(value)
            .map_err(|e| Error::BadRequest(format!("Invalid argument {}: {}", index, e)))
    }

    /// Move an argument out, leaving [`Arg::Missing`] behind.
    pub fn take(&mut self, index: usize) -> Arg {
        self.0
            .get_mut(index)
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

impl From<Vec<Arg>> for Args {
    fn from(args: Vec<Arg>) -> Self {
        Self(args)
    }
}

impl IntoIterator for Args {
    type Item = Arg;
    type IntoIter = std::vec::IntoIter<Arg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
