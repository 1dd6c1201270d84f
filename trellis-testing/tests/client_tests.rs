use serde_json::json;
use std::sync::Arc;
use trellis_core::*;
use trellis_testing::*;

struct NoteController;

impl Component for NoteController {
    fn describe(meta: &mut DescriptorHandle<'_, Self>) {
        meta.controller("/notes");
        meta.route("create")
            .post("/")
            .bind(
                0,
                Binding::validated_body(
                    Schema::new("Note")
                        .field("title", FieldRule::string().min(1).required())
                        .field("stars", FieldRule::number().min(0).max(5)),
                ),
            )
            .handler(|_this: Arc<Self>, args: Args| async move {
                Ok(TypedReply::new("application/json", args.value(0).cloned().unwrap_or_default().to_string())
                    .with_status(201))
            });
        meta.route("search")
            .get("/")
            .bind(0, Binding::query_map())
            .handler(|_this: Arc<Self>, args: Args| async move {
                Ok(args.value(0).cloned().unwrap_or_default())
            });
    }

    fn construct(_deps: &Injected) -> Result<Self, Error> {
        Ok(NoteController)
    }
}

async fn app() -> TestApp {
    TestAppBuilder::with_config(AppConfig::default().route_prefix("/api"))
        .register::<NoteController>()
        .unwrap()
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_json_body_is_sanitized() {
    let app = app().await;
    let res = app
        .client()
        .post_json("/api/notes", &json!({"title": "groceries", "stars": "4", "spam": 1}))
        .await;

    assert_status(&res, 201);
    assert_json(&res, &json!({"title": "groceries", "stars": 4}));
}

#[tokio::test]
async fn test_invalid_body_reports_field() {
    let app = app().await;
    let res = app
        .client()
        .post_json("/api/notes", &json!({"title": "x", "stars": 9}))
        .await;
    assert_validation_error(&res, "stars");

    let res = app.client().post_json("/api/notes", &json!({})).await;
    assert_validation_error(&res, "title");
}

#[tokio::test]
async fn test_query_builder() {
    let app = app().await;
    let client = app.client();
    let res = client
        .request(HttpMethod::GET, "/api/notes")
        .query("tag", "home")
        .header("Accept", "application/json")
        .send(client)
        .await;

    assert_success(&res);
    assert_json(&res, &json!({"tag": "home"}));
}

#[tokio::test]
async fn test_unknown_path() {
    let app = app().await;
    let res = app.client().delete("/api/notes/1").await;
    assert_status(&res, 404);
    assert_body_contains(&res, "404");
}
