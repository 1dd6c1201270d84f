// Trellis - a component-oriented HTTP framework for Rust
//
// Controllers, services and request plugins describe themselves to a registry,
// which resolves their dependencies, compiles their routes and serves them.

// Re-export core functionality
pub use trellis_core::*;
pub use trellis_core::discover;

// Re-export the validation crate for direct schema work
pub use trellis_validation;

#[cfg(feature = "testing")]
pub use trellis_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AppConfig, Application, Args, Binding, Component, Container, DescriptorHandle, Error,
        FieldRule, FileReply, HttpMethod, HttpRequest, HttpResponse, Injected, Middleware,
        MiddlewareNext, Next, Reply, RequestContext, RequestPlugin, Schema, Service, TypedReply,
    };
    pub use async_trait::async_trait;
    pub use serde_json::json;
    pub use std::sync::Arc;
}
