//! Integration tests for trellis-validation

use serde_json::json;
use trellis_validation::*;

fn user_schema() -> Schema {
    let address = Schema::new("Address")
        .field("street", FieldRule::string().required())
        .field("zip", FieldRule::string().min(4).max(10));

    Schema::new("CreateUser")
        .field("name", FieldRule::string().min(1).max(32).required())
        .field("age", FieldRule::number().min(0))
        .field("address", FieldRule::nested(address))
}

#[test]
fn test_full_record_is_sanitized() {
    let input = json!({
        "name": "Ada",
        "age": "36",
        "address": {"street": "Main", "zip": 12345, "country": "NO"},
        "admin": true
    });

    let clean = validate(&input, &user_schema()).unwrap();
    assert_eq!(
        clean,
        json!({
            "name": "Ada",
            "age": 36,
            "address": {"street": "Main", "zip": "12345"}
        })
    );
}

#[test]
fn test_first_failing_rule_is_reported() {
    let input = json!({"name": "", "age": "abc"});
    let err = validate(&input, &user_schema()).unwrap_err();
    assert_eq!(err.field, "name");
}

#[test]
fn test_nested_required_field() {
    let input = json!({"name": "Ada", "address": {"zip": "1234"}});
    let err = validate(&input, &user_schema()).unwrap_err();
    assert_eq!(err.field, "address.street");
    assert_eq!(err.constraint, "required");
}

#[test]
fn test_schema_shared_between_arrays() {
    let tag = std::sync::Arc::new(Schema::new("Tag").field("label", FieldRule::string().max(5)));
    let schema = Schema::new("Post")
        .field("tags", FieldRule::array(tag.clone()))
        .field("pinned", FieldRule::array(tag));

    let err = validate(
        &json!({"tags": [{"label": "rust"}], "pinned": [{"label": "toolong"}]}),
        &schema,
    )
    .unwrap_err();
    assert_eq!(err.field, "pinned[0].label");
}

#[test]
fn test_error_json_shape() {
    let err = validate(&json!(null), &user_schema()).unwrap_err();
    let body = err.to_json();
    assert_eq!(body["field"], "CreateUser");
    assert_eq!(body["constraint"], "type");
}
