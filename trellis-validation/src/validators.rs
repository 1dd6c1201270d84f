// Schema validator

use crate::{Constraints, FieldKind, FieldRule, Schema, ValidationError};
use serde_json::{Map, Number, Value};

/// Validate `value` against `schema`, producing a sanitized copy.
///
/// Only fields named in the schema are copied into the result; unknown input
/// fields are dropped. Numbers destined for string fields and numeric strings
/// destined for number fields are coerced.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use trellis_validation::{validate, FieldRule, Schema};
///
/// let schema = Schema::new("RequestBody").field("name", FieldRule::string().min(1));
///
/// let clean = validate(&json!({"name": 7, "extra": true}), &schema).unwrap();
/// assert_eq!(clean, json!({"name": "7"}));
///
/// let err = validate(&json!({"name": ""}), &schema).unwrap_err();
/// assert_eq!(err.field, "name");
/// ```
pub fn validate(value: &Value, schema: &Schema) -> Result<Value, ValidationError> {
    let Value::Object(record) = value else {
        return Err(ValidationError::new(
            schema.subject(),
            format!("{} must be an object", schema.subject()),
        )
        .with_constraint("type"));
    };
    validate_record(record, schema).map(Value::Object)
}

fn validate_record(record: &Map<String, Value>, schema: &Schema) -> Result<Map<String, Value>, ValidationError> {
    let mut sanitized = Map::new();

    for rule in schema.fields() {
        let name = rule.field_name.as_str();
        match record.get(name) {
            None | Some(Value::Null) => {
                if rule.constraints.required {
                    return Err(ValidationError::new(name, format!("{} is required", name))
                        .with_constraint("required"));
                }
            }
            Some(input) => {
                sanitized.insert(name.to_string(), validate_field(input, rule)?);
            }
        }
    }

    Ok(sanitized)
}

fn validate_field(input: &Value, rule: &FieldRule) -> Result<Value, ValidationError> {
    let name = rule.field_name.as_str();
    match &rule.kind {
        FieldKind::String => validate_string(input, name, &rule.constraints),
        FieldKind::Number => validate_number(input, name, &rule.constraints),
        FieldKind::Object(nested) => {
            let Value::Object(record) = input else {
                return Err(type_error(name, "an object"));
            };
            match nested {
                Some(schema) => validate_record(record, schema)
                    .map(Value::Object)
                    .map_err(|e| e.within(name)),
                None => Ok(input.clone()),
            }
        }
        FieldKind::Array(element) => {
            let Value::Array(items) = input else {
                return Err(type_error(name, "an array"));
            };
            check_bounds(items.len() as f64, name, &rule.constraints, "items")?;

            let mut sanitized = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                let Value::Object(record) = item else {
                    return Err(type_error(&format!("{}[{}]", name, index), "an object"));
                };
                let clean = validate_record(record, element)
                    .map_err(|e| e.at_index(index).within(name))?;
                sanitized.push(Value::Object(clean));
            }
            Ok(Value::Array(sanitized))
        }
    }
}

fn validate_string(input: &Value, name: &str, constraints: &Constraints) -> Result<Value, ValidationError> {
    let text = match input {
        Value::String(s) => s.clone(),
        Value::Number(n) => number_to_string(n),
        _ => return Err(type_error(name, "a string")),
    };
    check_bounds(text.chars().count() as f64, name, constraints, "characters")?;
    Ok(Value::String(text))
}

fn validate_number(input: &Value, name: &str, constraints: &Constraints) -> Result<Value, ValidationError> {
    let number = match input {
        Value::Number(n) => n.clone(),
        Value::String(s) => parse_number(s).ok_or_else(|| type_error(name, "a number"))?,
        _ => return Err(type_error(name, "a number")),
    };
    let value = number.as_f64().ok_or_else(|| type_error(name, "a number"))?;

    if let Some(min) = constraints.min {
        if value < min {
            return Err(ValidationError::new(name, format!("{} must be at least {}", name, min))
                .with_constraint("min"));
        }
    }
    if let Some(max) = constraints.max {
        if value > max {
            return Err(ValidationError::new(name, format!("{} must be at most {}", name, max))
                .with_constraint("max"));
        }
    }
    Ok(Value::Number(number))
}

fn check_bounds(len: f64, name: &str, constraints: &Constraints, unit: &str) -> Result<(), ValidationError> {
    if let Some(min) = constraints.min {
        if len < min {
            return Err(ValidationError::new(
                name,
                format!("{} must be at least {} {}", name, min, unit),
            )
            .with_constraint("min"));
        }
    }
    if let Some(max) = constraints.max {
        if len > max {
            return Err(ValidationError::new(
                name,
                format!("{} must be at most {} {}", name, max, unit),
            )
            .with_constraint("max"));
        }
    }
    Ok(())
}

fn type_error(name: &str, expected: &str) -> ValidationError {
    ValidationError::new(name, format!("{} must be {}", name, expected)).with_constraint("type")
}

/// Integral floats print without a fractional part (`7.0` becomes `"7"`).
fn number_to_string(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => {
            format!("{}", f as i64)
        }
        _ => n.to_string(),
    }
}

fn parse_number(raw: &str) -> Option<Number> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(int) = trimmed.parse::<i64>() {
        return Some(Number::from(int));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
}
