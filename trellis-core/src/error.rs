// Error types for the Trellis runtime

use crate::config::ConfigError;
use thiserror::Error;
use trellis_validation::ValidationError;

/// Fatal wiring problems detected while registering, resolving or compiling
/// components. Any of these aborts startup before the server listens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("duplicate component name '{name}'")]
    DuplicateComponent { name: String },

    #[error("component '{target}' not found (requested by {requester}::{field})")]
    MissingComponent {
        target: String,
        requester: String,
        field: String,
    },

    #[error("cyclic dependency: {}", chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    #[error("component {type_name} declares no role")]
    UnsetRole { type_name: String },

    #[error("invalid route '{route}': {reason}")]
    InvalidRoute { route: String, reason: String },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dependency injection error: {0}")]
    DependencyInjection(String),

    #[error("Handler error: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    // 4xx raised by handlers or the body parser
    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),
}

impl Error {
    /// Wrap an arbitrary handler failure.
    pub fn handler<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Handler(Box::new(error))
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) | Error::BadRequest(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::NotFound(_) => 404,
            Error::Conflict(_) => 409,
            Error::PayloadTooLarge(_) => 413,
            _ => 500,
        }
    }

    /// Check if this is a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Check if this is a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }

    /// JSON body the HTTP boundary sends for this error.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Error::Validation(e) => serde_json::json!({
                "error": e.reason,
                "field": e.field,
                "status": self.status_code(),
            }),
            _ => serde_json::json!({
                "error": self.to_string(),
                "status": self.status_code(),
            }),
        }
    }
}
