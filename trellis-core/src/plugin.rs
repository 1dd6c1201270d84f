// Request plugins run ahead of every matched handler

use crate::context::RequestContext;
use crate::logging::{debug, trace};
use crate::Error;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// Continuation handed to a plugin. Calling it runs the remaining plugins
/// and then the handler.
pub type Next =
    Box<dyn FnOnce(RequestContext) -> BoxFuture<'static, Result<RequestContext, Error>> + Send>;

/// Terminal step of the chain.
pub type Endpoint =
    Arc<dyn Fn(RequestContext) -> BoxFuture<'static, Result<RequestContext, Error>> + Send + Sync>;

/// Cross-cutting request processing (authentication, tracing, headers).
///
/// A plugin either calls `next(ctx).await` to continue the request or
/// returns the context without calling it, ending the request with whatever
/// response it wrote.
///
/// ```
/// use trellis_core::{Error, HttpResponse, Next, RequestContext, RequestPlugin};
///
/// struct RequireToken;
///
/// #[async_trait::async_trait]
/// impl RequestPlugin for RequireToken {
///     async fn handle(&self, mut ctx: RequestContext, next: Next) -> Result<RequestContext, Error> {
///         if ctx.request().header("authorization").is_none() {
///             ctx.respond(HttpResponse::new(401));
///             return Ok(ctx);
///         }
///         next(ctx).await
///     }
/// }
/// ```
#[async_trait]
pub trait RequestPlugin: Send + Sync {
    async fn handle(&self, ctx: RequestContext, next: Next) -> Result<RequestContext, Error>;
}

/// Plugins in registration order.
#[derive(Clone, Default)]
pub struct PluginChain {
    plugins: Arc<[Arc<dyn RequestPlugin>]>,
}

impl PluginChain {
    pub fn new(plugins: Vec<Arc<dyn RequestPlugin>>) -> Self {
        Self {
            plugins: plugins.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run every plugin, then `endpoint`.
    pub async fn apply(&self, ctx: RequestContext, endpoint: Endpoint) -> Result<RequestContext, Error> {
        debug!(
            plugin_count = self.plugins.len(),
            path = %ctx.request().path,
            method = %ctx.request().method,
            "Executing plugin chain"
        );
        self.execute_from(0, ctx, endpoint).await
    }

    fn execute_from(
        &self,
        index: usize,
        ctx: RequestContext,
        endpoint: Endpoint,
    ) -> BoxFuture<'static, Result<RequestContext, Error>> {
        if index >= self.plugins.len() {
            trace!("Plugin chain complete, calling handler");
            return endpoint(ctx);
        }

        let plugin = self.plugins[index].clone();
        let chain = self.clone();

        trace!(plugin_index = index, "Executing plugin");
        Box::pin(async move {
            let next: Next = Box::new(move |ctx| chain.execute_from(index + 1, ctx, endpoint));
            plugin.handle(ctx, next).await
        })
    }
}
