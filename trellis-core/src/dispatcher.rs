// Request dispatch over the compiled route table

use crate::compiler::CompiledRoute;
use crate::context::RequestContext;
use crate::logging::debug;
use crate::path::PathParams;
use crate::plugin::{Endpoint, PluginChain};
use crate::{Error, HttpMethod, HttpRequest, HttpResponse};
use futures_util::future::{BoxFuture, FutureExt};
use std::sync::Arc;

/// Matches requests against the route table (first match in registration
/// order wins), runs the plugin chain and the handler, and produces the
/// response.
///
/// Unmatched requests get `404` with body `404` and never reach the
/// plugins. When neither a plugin nor the handler writes a response the
/// answer is `204 No Content`.
#[derive(Clone, Default)]
pub struct Dispatcher {
    routes: Arc<[CompiledRoute]>,
    plugins: PluginChain,
}

impl Dispatcher {
    pub fn new(routes: Vec<CompiledRoute>, plugins: PluginChain) -> Self {
        Self {
            routes: routes.into(),
            plugins,
        }
    }

    pub fn routes(&self) -> &[CompiledRoute] {
        &self.routes
    }

    pub fn plugins(&self) -> &PluginChain {
        &self.plugins
    }

    /// Index and captured parameters of the first matching route.
    pub fn find(&self, method: &str, path: &str) -> Option<(usize, PathParams)> {
        let method: HttpMethod = method.parse().ok()?;
        self.routes
            .iter()
            .enumerate()
            .find_map(|(index, route)| route.matches(method, path).map(|params| (index, params)))
    }

    pub async fn dispatch(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        let Some((index, params)) = self.find(&request.method, &request.path) else {
            debug!(method = %request.method, path = %request.path, "No route matched");
            return Ok(HttpResponse::not_found()
                .with_header("Content-Type", "text/plain")
                .with_body("404"));
        };

        debug!(
            method = %request.method,
            path = %request.path,
            route = %self.routes[index].path(),
            "Route matched"
        );

        let routes = self.routes.clone();
        let endpoint: Endpoint = Arc::new(
            move |ctx: RequestContext| -> BoxFuture<'static, Result<RequestContext, Error>> {
                let routes = routes.clone();
                async move { routes[index].call(ctx).await }.boxed()
            },
        );

        let ctx = RequestContext::new(request, params);
        let mut ctx = self.plugins.apply(ctx, endpoint).await?;
        Ok(ctx.take_response().unwrap_or_else(HttpResponse::no_content))
    }
}
