// Schema model and builders

use std::sync::Arc;

/// Bounds and presence requirements for a single field.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Constraints {
    /// Lower bound: string length, numeric value, or array length
    pub min: Option<f64>,
    /// Upper bound: string length, numeric value, or array length
    pub max: Option<f64>,
    /// Whether a missing or null field is an error
    pub required: bool,
}

/// The expected shape of a field.
#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Number,
    /// A nested record, validated recursively when a schema is attached
    Object(Option<Arc<Schema>>),
    /// A list whose elements are records of the given schema
    Array(Arc<Schema>),
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Object(_) => "object",
            FieldKind::Array(_) => "array",
        }
    }
}

/// Rule applied to one named field of a record.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field_name: String,
    pub kind: FieldKind,
    pub constraints: Constraints,
}

impl FieldRule {
    fn of(kind: FieldKind) -> Self {
        Self {
            field_name: String::new(),
            kind,
            constraints: Constraints::default(),
        }
    }

    /// A string field (numbers are coerced to their string form)
    pub fn string() -> Self {
        Self::of(FieldKind::String)
    }

    /// A numeric field (strings are coerced via numeric parse)
    pub fn number() -> Self {
        Self::of(FieldKind::Number)
    }

    /// An object field copied as-is
    pub fn object() -> Self {
        Self::of(FieldKind::Object(None))
    }

    /// An object field validated against a nested schema
    pub fn nested(schema: impl Into<Arc<Schema>>) -> Self {
        Self::of(FieldKind::Object(Some(schema.into())))
    }

    /// An array field whose elements must satisfy `element`
    pub fn array(element: impl Into<Arc<Schema>>) -> Self {
        Self::of(FieldKind::Array(element.into()))
    }

    pub fn min(mut self, min: impl Into<f64>) -> Self {
        self.constraints.min = Some(min.into());
        self
    }

    pub fn max(mut self, max: impl Into<f64>) -> Self {
        self.constraints.max = Some(max.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.constraints.required = true;
        self
    }
}

/// Ordered list of field rules describing a record.
///
/// # Examples
///
/// ```
/// use trellis_validation::{FieldRule, Schema};
///
/// let schema = Schema::new("CreateUser")
///     .field("name", FieldRule::string().min(1).max(32).required())
///     .field("age", FieldRule::number().min(0));
///
/// assert_eq!(schema.fields().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
    subject: String,
    fields: Vec<FieldRule>,
}

impl Schema {
    /// Create an empty schema; `subject` names the record in top-level errors.
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            fields: Vec::new(),
        }
    }

    /// Append a rule for `name`. A second rule for the same name replaces the
    /// first one in place.
    pub fn field(mut self, name: impl Into<String>, mut rule: FieldRule) -> Self {
        rule.field_name = name.into();
        match self
            .fields
            .iter_mut()
            .find(|existing| existing.field_name == rule.field_name)
        {
            Some(existing) => *existing = rule,
            None => self.fields.push(rule),
        }
        self
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn fields(&self) -> &[FieldRule] {
        &self.fields
    }
}
