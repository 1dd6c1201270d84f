// Application-wide middleware wrapping the whole request pipeline

use crate::logging::{debug, trace};
use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// The rest of the pipeline, as seen from a middleware.
pub type MiddlewareNext =
    Box<dyn FnOnce(HttpRequest) -> BoxFuture<'static, Result<HttpResponse, Error>> + Send>;

/// Terminal stage of the middleware chain.
pub type PipelineFn =
    Arc<dyn Fn(HttpRequest) -> BoxFuture<'static, Result<HttpResponse, Error>> + Send + Sync>;

/// Runs on every request before history fallback, static files, body
/// parsing and routing, including requests that end up unmatched.
///
/// Unlike a [`RequestPlugin`](crate::RequestPlugin), a middleware is not a
/// component: it is installed on the [`Application`](crate::Application)
/// and sees the raw request and the final response.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, req: HttpRequest, next: MiddlewareNext) -> Result<HttpResponse, Error>;
}

/// Middleware in installation order.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, middleware: Arc<dyn Middleware>) {
        Arc::make_mut(&mut self.middlewares).push(middleware);
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    pub async fn apply(&self, req: HttpRequest, pipeline: PipelineFn) -> Result<HttpResponse, Error> {
        debug!(
            middleware_count = self.middlewares.len(),
            path = %req.path,
            method = %req.method,
            "Executing middleware chain"
        );
        self.execute_from(0, req, pipeline).await
    }

    fn execute_from(
        &self,
        index: usize,
        req: HttpRequest,
        pipeline: PipelineFn,
    ) -> BoxFuture<'static, Result<HttpResponse, Error>> {
        if index >= self.middlewares.len() {
            trace!("Middleware chain complete, entering pipeline");
            return pipeline(req);
        }

        let middleware = self.middlewares[index].clone();
        let chain = self.clone();

        trace!(middleware_index = index, "Executing middleware");
        Box::pin(async move {
            let next: MiddlewareNext =
                Box::new(move |req| chain.execute_from(index + 1, req, pipeline));
            middleware.handle(req, next).await
        })
    }
}
