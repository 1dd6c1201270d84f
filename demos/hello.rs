// Hello Trellis: a controller, two services and a plugin
//
// Run with `cargo run --example hello`, then:
//   curl localhost:3000/api/test
//   curl localhost:3000/api/hello/ada?excited=yes
//   curl -X POST localhost:3000/api/greetings -H 'content-type: application/json' -d '{"name":"ada"}'

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use trellis::logging::{info, LogConfig};
use trellis::prelude::*;

/// Counts greetings handed out.
struct HitCounter {
    hits: AtomicU64,
}

impl Component for HitCounter {
    fn describe(meta: &mut DescriptorHandle<'_, Self>) {
        meta.service();
    }

    fn construct(_deps: &Injected) -> Result<Self, Error> {
        Ok(HitCounter {
            hits: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Service for HitCounter {
    async fn init(&self) -> Result<(), Error> {
        info!("Hit counter ready");
        Ok(())
    }
}

struct GreetingService {
    counter: Arc<HitCounter>,
}

impl Component for GreetingService {
    fn describe(meta: &mut DescriptorHandle<'_, Self>) {
        meta.service().inject_as("counter", "hitCounter");
    }

    fn construct(deps: &Injected) -> Result<Self, Error> {
        Ok(GreetingService {
            counter: deps.get("counter")?,
        })
    }
}

impl Service for GreetingService {}

impl GreetingService {
    fn greet(&self, name: &str, excited: bool) -> serde_json::Value {
        let count = self.counter.hits.fetch_add(1, Ordering::Relaxed) + 1;
        let mark = if excited { "!" } else { "." };
        json!({ "greeting": format!("Hello, {}{}", name, mark), "count": count })
    }
}

struct ApiController {
    greetings: Arc<GreetingService>,
}

impl Component for ApiController {
    fn describe(meta: &mut DescriptorHandle<'_, Self>) {
        meta.controller("/api").inject_as("greetings", "greetingService");

        meta.route("test")
            .get("/test")
            .handler(|_this: Arc<Self>, _args| async { Ok(json!({ "aaa": 123 })) });

        meta.route("hello")
            .get("/hello/:name")
            .bind(0, Binding::param("name"))
            .bind(1, Binding::query("excited"))
            .handler(|this: Arc<Self>, args: Args| async move {
                let name = args.text(0).unwrap_or("stranger");
                Ok(this.greetings.greet(name, args.text(1).is_some()))
            });

        meta.route("create")
            .post("/greetings")
            .bind(
                0,
                Binding::validated_body(
                    Schema::new("GreetingRequest")
                        .field("name", FieldRule::string().min(1).max(64).required()),
                ),
            )
            .handler(|this: Arc<Self>, args: Args| async move {
                let name = args.value(0).and_then(|body| body["name"].as_str()).unwrap_or_default();
                let body = this.greetings.greet(name, true).to_string();
                Ok(TypedReply::new("application/json", body).with_status(201))
            });
    }

    fn construct(deps: &Injected) -> Result<Self, Error> {
        Ok(ApiController {
            greetings: deps.get("greetings")?,
        })
    }
}

/// Logs method, path, status and latency of every routed request.
struct AccessLog;

impl Component for AccessLog {
    fn describe(meta: &mut DescriptorHandle<'_, Self>) {
        meta.plugin();
    }

    fn construct(_deps: &Injected) -> Result<Self, Error> {
        Ok(AccessLog)
    }
}

#[async_trait]
impl RequestPlugin for AccessLog {
    async fn handle(&self, ctx: RequestContext, next: Next) -> Result<RequestContext, Error> {
        let started = Instant::now();
        let method = ctx.request().method.clone();
        let path = ctx.request().path.clone();

        let ctx = next(ctx).await?;
        let status = ctx.response().map(|r| r.status).unwrap_or(204);
        info!(%method, %path, status, elapsed_us = started.elapsed().as_micros() as u64, "Handled");
        Ok(ctx)
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = AppConfig::load(None)?;
    let _guard = LogConfig::from(&config.log).init()?;

    println!("🌿 Trellis hello demo");
    println!("   listening on http://{}:{}", config.host, config.port);
    println!("   try GET /api/test or GET /api/hello/<name>\n");

    Application::new(config)
        .register::<ApiController>()?
        .register::<GreetingService>()?
        .register::<HitCounter>()?
        .register::<AccessLog>()?
        .listen()
        .await
}
