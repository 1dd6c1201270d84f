// Application bootstrapper and HTTP server

use crate::body::{collect_body, BodyParser};
use crate::config::AppConfig;
use crate::container::Container;
use crate::dispatcher::Dispatcher;
use crate::http::ResponseBody;
use crate::logging::{debug, error, info, info_span, warn, Instrument};
use crate::middleware::{Middleware, MiddlewareChain, PipelineFn};
use crate::registry::Registry;
use crate::static_files::{HistoryFallback, StaticFiles};
use crate::traits::Component;
use crate::{Error, HttpRequest, HttpResponse};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::{Frame, Incoming as IncomingBody};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use http::header::{HeaderName, HeaderValue};
use http::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::io::ReaderStream;

type ResponseBodyStream = UnsyncBoxBody<Bytes, std::io::Error>;

/// Composition root: owns the configuration and the component registry
/// until [`bootstrap`](Self::bootstrap) resolves them.
///
/// ```no_run
/// use trellis_core::{AppConfig, Application};
///
/// # async fn run() -> Result<(), trellis_core::Error> {
/// Application::new(AppConfig::load(None)?)
///     .scan()?
///     .listen()
///     .await
/// # }
/// ```
pub struct Application {
    config: AppConfig,
    registry: Registry,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        let registry = Registry::new().with_route_prefix(config.route_prefix.clone());
        Self {
            config,
            registry,
            middleware: Vec::new(),
        }
    }

    /// Use a registry populated elsewhere; the configured route prefix wins.
    pub fn from_registry(config: AppConfig, mut registry: Registry) -> Self {
        registry.set_route_prefix(config.route_prefix.clone());
        Self {
            config,
            registry,
            middleware: Vec::new(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn register<T: Component>(mut self) -> Result<Self, Error> {
        self.registry.register::<T>()?;
        Ok(self)
    }

    /// Install a middleware ahead of static files and routing. Middleware
    /// runs in installation order on every request.
    pub fn middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Register every component announced with [`discover!`](crate::discover).
    pub fn scan(mut self) -> Result<Self, Error> {
        self.registry.scan()?;
        Ok(self)
    }

    /// Resolve all components and assemble the request pipeline.
    pub async fn bootstrap(self) -> Result<Server, Error> {
        info!(components = self.registry.len(), "Bootstrapping Trellis application");

        let resolved = self.registry.resolve_all().await?;
        let container = resolved.container.clone();
        let dispatcher = resolved.into_dispatcher();
        let mut pipeline = Pipeline::from_config(&self.config, dispatcher)?;
        for middleware in self.middleware {
            pipeline.middleware.push(middleware);
        }

        info!(
            routes = pipeline.dispatcher().routes().len(),
            plugins = pipeline.dispatcher().plugins().len(),
            middleware = pipeline.middleware.len(),
            "Application bootstrap complete"
        );

        Ok(Server {
            config: self.config,
            container,
            pipeline: Arc::new(pipeline),
        })
    }

    /// Bootstrap, then serve until the listener fails.
    pub async fn listen(self) -> Result<(), Error> {
        self.bootstrap().await?.listen().await
    }
}

/// Everything between the socket and the handlers: middleware, history
/// fallback, static files, body parsing and dispatch. Never fails; errors
/// become JSON error responses.
#[derive(Clone)]
pub struct Pipeline {
    middleware: MiddlewareChain,
    stages: Arc<Stages>,
}

#[derive(Clone)]
struct Stages {
    history: Option<HistoryFallback>,
    static_files: Option<StaticFiles>,
    body: BodyParser,
    dispatcher: Dispatcher,
}

impl Stages {
    async fn run(&self, mut request: HttpRequest) -> Result<HttpResponse, Error> {
        if let Some(history) = &self.history {
            history.rewrite(&mut request);
        }
        if let Some(files) = &self.static_files {
            if let Some(response) = files.serve(&request).await? {
                return Ok(response);
            }
        }
        self.body.parse(&mut request)?;
        self.dispatcher.dispatch(request).await
    }
}

impl Pipeline {
    /// Body parsing and dispatch only.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            middleware: MiddlewareChain::new(),
            stages: Arc::new(Stages {
                history: None,
                static_files: None,
                body: BodyParser::default(),
                dispatcher,
            }),
        }
    }

    pub fn from_config(config: &AppConfig, dispatcher: Dispatcher) -> Result<Self, Error> {
        let history = config
            .history_fallback
            .as_ref()
            .map(HistoryFallback::new)
            .transpose()?;
        let static_files = config
            .static_files
            .then(|| StaticFiles::new(&config.static_path));

        Ok(Self {
            middleware: MiddlewareChain::new(),
            stages: Arc::new(Stages {
                history,
                static_files,
                body: BodyParser::new(config.body_limit),
                dispatcher,
            }),
        })
    }

    /// Append a middleware; it runs after those installed before it.
    pub fn with_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn with_history_fallback(mut self, history: HistoryFallback) -> Self {
        Arc::make_mut(&mut self.stages).history = Some(history);
        self
    }

    pub fn with_static_files(mut self, files: StaticFiles) -> Self {
        Arc::make_mut(&mut self.stages).static_files = Some(files);
        self
    }

    pub fn with_body_parser(mut self, parser: BodyParser) -> Self {
        Arc::make_mut(&mut self.stages).body = parser;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.stages.dispatcher
    }

    pub fn body_limit(&self) -> usize {
        self.stages.body.limit()
    }

    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        match self.try_handle(request).await {
            Ok(response) => response,
            Err(err) => error_response(&err),
        }
    }

    async fn try_handle(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        if self.middleware.is_empty() {
            return self.stages.run(request).await;
        }
        let stages = self.stages.clone();
        let pipeline: PipelineFn = Arc::new(move |request: HttpRequest| -> BoxFuture<'static, Result<HttpResponse, Error>> {
            let stages = stages.clone();
            Box::pin(async move { stages.run(request).await })
        });
        self.middleware.apply(request, pipeline).await
    }
}

/// Map an error to its status and JSON body, logging it.
pub fn error_response(err: &Error) -> HttpResponse {
    let status = err.status_code();
    if err.is_server_error() {
        error!(error = %err, status, "Request failed");
    } else {
        warn!(error = %err, status, "Request rejected");
    }
    HttpResponse::json(&err.to_json())
        .map(|response| response.with_status(status))
        .unwrap_or_else(|_| HttpResponse::internal_server_error())
}

/// A bootstrapped application, ready to accept connections.
pub struct Server {
    config: AppConfig,
    container: Container,
    pipeline: Arc<Pipeline>,
}

impl Server {
    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Bind the configured address and serve.
    pub async fn listen(self) -> Result<(), Error> {
        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already-bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Error> {
        info!(addr = %listener.local_addr()?, "Server listening");

        loop {
            let (stream, remote) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let pipeline = self.pipeline.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let pipeline = pipeline.clone();
                    async move { Ok::<_, Infallible>(handle_request(req, pipeline).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!(error = %err, remote = %remote, "Error serving connection");
                }
            });
        }
    }
}

/// Convert, run through the pipeline, convert back.
async fn handle_request(
    req: Request<IncomingBody>,
    pipeline: Arc<Pipeline>,
) -> Response<ResponseBodyStream> {
    let request_id = uuid::Uuid::new_v4();
    let span = info_span!(
        "request",
        id = %request_id,
        method = %req.method(),
        path = %req.uri().path()
    );

    async move {
        let started = Instant::now();
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let mut request = HttpRequest::new(req.method().as_str(), target);
        for (name, value) in req.headers() {
            if let Ok(value) = value.to_str() {
                request.headers.insert(name.as_str().to_string(), value.to_string());
            }
        }

        let response = match collect_body(req.into_body(), pipeline.body_limit()).await {
            Ok(body) => pipeline.handle(request.with_body(body)).await,
            Err(err) => error_response(&err),
        };

        info!(
            status = response.status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        into_hyper_response(response, &request_id.to_string())
    }
    .instrument(span)
    .await
}

fn into_hyper_response(response: HttpResponse, request_id: &str) -> Response<ResponseBodyStream> {
    let mut builder = Response::builder()
        .status(response.status)
        .header("x-request-id", request_id);
    if let Some(headers) = builder.headers_mut() {
        for (key, value) in &response.headers {
            match (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %key, "Dropping invalid response header"),
            }
        }
    }

    let body: ResponseBodyStream = match response.body {
        ResponseBody::Empty => Empty::new().map_err(|never| match never {}).boxed_unsync(),
        ResponseBody::Full(bytes) => Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
        ResponseBody::Stream(reader) => {
            StreamBody::new(ReaderStream::new(reader).map_ok(Frame::data)).boxed_unsync()
        }
    };

    builder.body(body).unwrap_or_else(|err| {
        error!(error = %err, "Invalid response");
        let mut fallback = Response::new(Empty::new().map_err(|never| match never {}).boxed_unsync());
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Args, Binding, DescriptorHandle, Injected};
    use serde_json::json;

    struct EchoController;

    impl Component for EchoController {
        fn describe(meta: &mut DescriptorHandle<'_, Self>) {
            meta.controller("/echo");
            meta.route("echo")
                .post("/")
                .bind(0, Binding::body())
                .handler(|_this: Arc<Self>, args: Args| async move {
                    Ok(args.value(0).cloned().unwrap_or_default())
                });
            meta.route("fail")
                .get("/fail")
                .handler(|_this: Arc<Self>, _args| async {
                    Err::<(), _>(Error::handler(std::io::Error::other("disk on fire")))
                });
        }

        fn construct(_deps: &Injected) -> Result<Self, Error> {
            Ok(EchoController)
        }
    }

    async fn pipeline(config: AppConfig) -> Pipeline {
        let server = Application::new(config)
            .register::<EchoController>()
            .unwrap()
            .bootstrap()
            .await
            .unwrap();
        server.pipeline().clone()
    }

    #[tokio::test]
    async fn test_body_is_parsed_before_dispatch() {
        let pipeline = pipeline(AppConfig::default().static_files(false)).await;
        let req = HttpRequest::new("POST", "/echo")
            .with_json(&json!({"a": 1}))
            .unwrap();
        let res = pipeline.handle(req).await;
        assert_eq!(res.status, 200);
        assert_eq!(&res.body_bytes()[..], br#"{"a":1}"#);
    }

    #[tokio::test]
    async fn test_errors_become_json() {
        let pipeline = pipeline(AppConfig::default().static_files(false)).await;

        let res = pipeline.handle(HttpRequest::new("GET", "/echo/fail")).await;
        assert_eq!(res.status, 500);
        let body: serde_json::Value = serde_json::from_slice(&res.body_bytes()).unwrap();
        assert_eq!(body["status"], 500);

        let req = HttpRequest::new("POST", "/echo")
            .with_header("content-type", "application/json")
            .with_body("{broken");
        assert_eq!(pipeline.handle(req).await.status, 400);
    }

    #[tokio::test]
    async fn test_route_prefix_from_config() {
        let pipeline = pipeline(AppConfig::default().static_files(false).route_prefix("/api")).await;
        let req = HttpRequest::new("POST", "/api/echo").with_body("raw");
        let res = pipeline.handle(req).await;
        assert_eq!(&res.body_bytes()[..], br#""raw""#);
    }

    #[test]
    fn test_hyper_response_conversion() {
        let res = into_hyper_response(
            HttpResponse::text("hi").with_status(201),
            "req-1",
        );
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()["x-request-id"], "req-1");
        assert_eq!(res.headers()["content-type"], "text/plain");
    }

    #[test]
    fn test_hyper_response_sends_each_header_once() {
        let mut response = HttpResponse::text("hi");
        response.headers.insert("Content-Type".into(), "text/html".into());
        let res = into_hyper_response(response, "req-2");
        assert_eq!(res.headers().get_all("content-type").iter().count(), 1);
    }
}
