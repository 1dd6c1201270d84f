//! Validation framework for Trellis
//!
//! Describes request records as ordered [`Schema`]s of [`FieldRule`]s and
//! validates untyped JSON input against them. Validation both checks and
//! sanitizes: numbers bound for string fields become strings, numeric strings
//! bound for number fields become numbers, and only declared fields survive.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use trellis_validation::{validate, FieldRule, Schema};
//!
//! let line = Schema::new("Line")
//!     .field("sku", FieldRule::string().min(1).required())
//!     .field("qty", FieldRule::number().min(1));
//!
//! let order = Schema::new("Order")
//!     .field("customer", FieldRule::string().required())
//!     .field("lines", FieldRule::array(line).min(1));
//!
//! let clean = validate(
//!     &json!({"customer": 42, "lines": [{"sku": "A-1", "qty": "2"}], "debug": true}),
//!     &order,
//! )
//! .unwrap();
//!
//! assert_eq!(clean, json!({"customer": "42", "lines": [{"sku": "A-1", "qty": 2}]}));
//! ```

mod errors;
mod rules;
mod validators;

pub use errors::*;
pub use rules::*;
pub use validators::*;
