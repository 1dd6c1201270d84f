//! Request pipeline: bindings, plugins, replies, static files and history fallback

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use trellis_core::*;

struct ReportController;

impl Component for ReportController {
    fn describe(meta: &mut DescriptorHandle<'_, Self>) {
        meta.controller("/reports");
        meta.route("list")
            .get("/")
            .bind(
                0,
                Binding::validated_query(
                    "limit",
                    Schema::new("Paging").field("limit", FieldRule::number().max(50)),
                ),
            )
            .bind(1, Binding::context_field("user"))
            .handler(|_this: Arc<Self>, args: Args| async move {
                Ok(json!({
                    "limit": args.value(0).cloned().unwrap_or_default(),
                    "user": args.value(1).cloned().unwrap_or_default(),
                }))
            });
        meta.route("download")
            .get("/:name/download")
            .bind(0, Binding::param("name"))
            .handler(|_this: Arc<Self>, args: Args| async move {
                let name = format!("{}.csv", args.text(0).unwrap_or("report"));
                Ok(FileReply::new(name, std::io::Cursor::new(b"a,b\n1,2\n".to_vec())))
            });
        meta.route("raw")
            .put("/:name")
            .arity(2)
            .bind(0, Binding::param("name"))
            .handler(|_this: Arc<Self>, args: Args| async move {
                assert!(args.is_missing(1));
                Ok(TypedReply::new("text/csv", format!("saved {}", args.text(0).unwrap_or(""))))
            });
    }

    fn construct(_deps: &Injected) -> Result<Self, Error> {
        Ok(ReportController)
    }
}

/// Stamps the caller from the `x-user` header into the context.
struct Identify;

impl Component for Identify {
    fn describe(meta: &mut DescriptorHandle<'_, Self>) {
        meta.plugin();
    }

    fn construct(_deps: &Injected) -> Result<Self, Error> {
        Ok(Identify)
    }
}

#[async_trait]
impl RequestPlugin for Identify {
    async fn handle(&self, mut ctx: RequestContext, next: Next) -> Result<RequestContext, Error> {
        let user = ctx.request().header("x-user").unwrap_or("anonymous").to_string();
        ctx.set("user", user);
        next(ctx).await
    }
}

async fn dispatcher(prefix: &str) -> Dispatcher {
    let mut registry = Registry::new().with_route_prefix(prefix);
    registry
        .register::<ReportController>()
        .unwrap()
        .register::<Identify>()
        .unwrap();
    registry.resolve_all().await.unwrap().into_dispatcher()
}

async fn read_stream(res: HttpResponse) -> Vec<u8> {
    let mut out = Vec::new();
    if let ResponseBody::Stream(mut reader) = res.body {
        reader.read_to_end(&mut out).await.unwrap();
    }
    out
}

fn json_body(res: &HttpResponse) -> Value {
    serde_json::from_slice(&res.body_bytes()).unwrap()
}

#[tokio::test]
async fn test_query_is_validated_and_coerced() {
    let pipeline = Pipeline::new(dispatcher("/").await);

    let req = HttpRequest::new("GET", "/reports?limit=10").with_header("x-user", "ada");
    let res = pipeline.handle(req).await;
    assert_eq!(res.status, 200);
    assert_eq!(json_body(&res), json!({"limit": 10, "user": "ada"}));

    let res = pipeline.handle(HttpRequest::new("GET", "/reports?limit=500")).await;
    assert_eq!(res.status, 400);
    let body = json_body(&res);
    assert_eq!(body["field"], "limit");
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_absent_query_key_is_null() {
    let pipeline = Pipeline::new(dispatcher("/").await);
    let res = pipeline.handle(HttpRequest::new("GET", "/reports")).await;
    assert_eq!(json_body(&res), json!({"limit": null, "user": "anonymous"}));
}

#[tokio::test]
async fn test_file_reply_is_an_attachment() {
    let pipeline = Pipeline::new(dispatcher("/v1").await);
    let res = pipeline
        .handle(HttpRequest::new("GET", "/v1/reports/march/download"))
        .await;

    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("application/octet-stream"));
    assert_eq!(
        res.header("content-disposition"),
        Some("attachment; filename=march.csv")
    );
    assert_eq!(read_stream(res).await, b"a,b\n1,2\n");
}

#[tokio::test]
async fn test_typed_reply_and_unbound_slot() {
    let pipeline = Pipeline::new(dispatcher("/").await);
    let res = pipeline.handle(HttpRequest::new("PUT", "/reports/q1")).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("text/csv"));
    assert_eq!(&res.body_bytes()[..], b"saved q1");
}

#[tokio::test]
async fn test_payload_limit() {
    let pipeline =
        Pipeline::new(dispatcher("/").await).with_body_parser(BodyParser::new(4));
    let req = HttpRequest::new("PUT", "/reports/q1")
        .with_header("content-type", "text/plain")
        .with_body("far too long");
    let res = pipeline.handle(req).await;
    assert_eq!(res.status, 413);
}

fn site(tag: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("trellis-site-{}-{}", tag, std::process::id()));
    std::fs::create_dir_all(root.join("assets")).unwrap();
    std::fs::write(root.join("index.html"), "<h1>app</h1>").unwrap();
    std::fs::write(root.join("assets/app.css"), "body{}").unwrap();
    root
}

async fn spa_pipeline(root: &PathBuf) -> Pipeline {
    let fallback = HistoryFallback::new(&HistoryFallbackConfig {
        whitelist: vec!["^/api".to_string()],
        ..Default::default()
    })
    .unwrap();
    Pipeline::new(dispatcher("/api").await)
        .with_history_fallback(fallback)
        .with_static_files(StaticFiles::new(root))
}

#[tokio::test]
async fn test_navigation_falls_back_to_index() {
    let root = site("nav");
    let pipeline = spa_pipeline(&root).await;

    let req = HttpRequest::new("GET", "/dashboard/settings").with_header("accept", "text/html");
    let res = pipeline.handle(req).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.header("content-type"), Some("text/html"));
    assert_eq!(read_stream(res).await, b"<h1>app</h1>");

    std::fs::remove_dir_all(&root).ok();
}

#[tokio::test]
async fn test_assets_and_api_pass_through() {
    let root = site("assets");
    let pipeline = spa_pipeline(&root).await;

    let req = HttpRequest::new("GET", "/assets/app.css").with_header("accept", "*/*");
    let res = pipeline.handle(req).await;
    assert_eq!(res.header("content-type"), Some("text/css"));
    assert_eq!(read_stream(res).await, b"body{}");

    let req = HttpRequest::new("GET", "/api/reports?limit=3").with_header("accept", "text/html");
    let res = pipeline.handle(req).await;
    assert_eq!(json_body(&res)["limit"], 3);

    let req = HttpRequest::new("GET", "/missing.png").with_header("accept", "text/html");
    let res = pipeline.handle(req).await;
    assert_eq!(res.status, 404);

    std::fs::remove_dir_all(&root).ok();
}

/// Counts every request and tags the response.
struct Tally {
    hits: Arc<AtomicUsize>,
}

#[async_trait]
impl Middleware for Tally {
    async fn handle(&self, req: HttpRequest, next: MiddlewareNext) -> Result<HttpResponse, Error> {
        self.hits.fetch_add(1, Ordering::SeqCst);
        Ok(next(req).await?.with_header("x-tally", "1"))
    }
}

/// Answers everything with 503 while the flag header is present.
struct Maintenance;

#[async_trait]
impl Middleware for Maintenance {
    async fn handle(&self, req: HttpRequest, next: MiddlewareNext) -> Result<HttpResponse, Error> {
        if req.header("x-maintenance").is_some() {
            return Ok(HttpResponse::new(503).with_body("down"));
        }
        next(req).await
    }
}

#[tokio::test]
async fn test_middleware_sees_unmatched_requests() {
    let hits = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new(dispatcher("/api").await).with_middleware(Tally { hits: hits.clone() });

    let res = pipeline.handle(HttpRequest::new("GET", "/nowhere")).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.header("x-tally"), Some("1"));

    let res = pipeline.handle(HttpRequest::new("GET", "/api/reports")).await;
    assert_eq!(res.status, 200);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_middleware_runs_before_body_parsing() {
    let pipeline = Pipeline::new(dispatcher("/").await).with_middleware(Maintenance);

    let req = HttpRequest::new("PUT", "/reports/q3")
        .with_header("content-type", "application/json")
        .with_header("x-maintenance", "1")
        .with_body("{broken");
    let res = pipeline.handle(req).await;
    assert_eq!(res.status, 503);
    assert_eq!(&res.body_bytes()[..], b"down");

    let req = HttpRequest::new("PUT", "/reports/q3")
        .with_header("content-type", "application/json")
        .with_body("{broken");
    assert_eq!(pipeline.handle(req).await.status, 400);
}

#[tokio::test]
async fn test_application_installs_middleware() {
    let hits = Arc::new(AtomicUsize::new(0));
    let server = Application::new(AppConfig::default().static_files(false))
        .register::<ReportController>()
        .unwrap()
        .middleware(Maintenance)
        .middleware(Tally { hits: hits.clone() })
        .bootstrap()
        .await
        .unwrap();

    let res = server.pipeline().handle(HttpRequest::new("DELETE", "/reports/1")).await;
    assert_eq!(res.status, 404);
    assert_eq!(res.header("x-tally"), Some("1"));

    let req = HttpRequest::new("GET", "/reports").with_header("x-maintenance", "1");
    let res = server.pipeline().handle(req).await;
    assert_eq!(res.status, 503);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
