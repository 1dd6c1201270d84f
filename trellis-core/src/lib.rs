// Core library for the Trellis component framework
// Component metadata, dependency resolution, route compilation and the HTTP runtime

pub mod application;
pub mod binding;
pub mod body;
pub mod compiler;
pub mod config;
pub mod container;
pub mod context;
pub mod discovery;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod logging;
pub mod metadata;
pub mod middleware;
pub mod path;
pub mod plugin;
pub mod registry;
pub mod reply;
pub mod static_files;
pub mod traits;

// Used by `discover!`
pub use inventory;

// Re-export commonly used types
pub use application::{error_response, Application, Pipeline, Server};
pub use binding::{Arg, Args, Binding};
pub use body::{collect_body, BodyParser, DEFAULT_BODY_LIMIT};
pub use compiler::{compile, CompiledRoute};
pub use config::{AppConfig, ConfigError};
pub use container::{Container, Injected, Instance};
pub use context::{ContextSnapshot, RequestContext};
pub use discovery::ComponentRegistration;
pub use dispatcher::Dispatcher;
pub use error::{ConfigurationError, Error};
pub use self::http::{HttpMethod, HttpRequest, HttpResponse, ResponseBody};
pub use metadata::{
    ComponentDescriptor, DescriptorHandle, Injection, MetadataStore, MethodFn, Role,
    RouteDescriptor, RouteEditor,
};
pub use middleware::{Middleware, MiddlewareChain, MiddlewareNext, PipelineFn};
pub use path::{join_paths, PathParams, PathPattern};
pub use plugin::{Endpoint, Next, PluginChain, RequestPlugin};
pub use registry::{Registry, Resolved};
pub use reply::{FileReply, Reply, TypedReply};
pub use static_files::{HistoryFallback, HistoryFallbackConfig, Rewrite, StaticFiles};
pub use traits::{Component, Service};

pub use trellis_validation::{validate, Constraints, FieldKind, FieldRule, Schema, ValidationError};
