//! End-to-end dispatch tests.
//!
//! An app is configured from TOML, auto-configured from the built-in
//! registry and then driven with hand-built contexts, including from many
//! tasks at once.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::{Method, StatusCode};
use serde_json::{json, Value};
use trellis::prelude::*;
use trellis_middleware::stages::{REQUEST_ID_STATE_KEY, USER_STATE_KEY};

const CONFIG: &str = r#"
[server]
port = 9000
dev_mode = false

[plugins]
recovery = true
request_id = true
access_log = { skip_paths = ["/health"] }

[plugins.basic_auth]
realm = "api"
users = { alice = "wonderland" }
"#;

fn build_app() -> App {
    let store = ConfigLoader::new()
        .with_string(CONFIG, "toml")
        .unwrap()
        .load_with_env(Vec::new())
        .unwrap();
    let mut app = App::with_config(store);
    app.auto_configure(&PluginRegistry::with_builtin()).unwrap();

    app.get("/users/:id", |ctx| {
        let id = ctx.param("id").unwrap_or_default().to_string();
        let user = ctx.state::<String>(USER_STATE_KEY).cloned();
        ctx.json(&json!({ "id": id, "caller": user }))
    })
    .unwrap()
    .summary("Fetch one user");

    app.get("/users/:id/posts/:postId", |ctx| {
        let body = json!({
            "id": ctx.param("id"),
            "postId": ctx.param("postId"),
        });
        ctx.json(&body)
    })
    .unwrap();

    app.get("/users/me", |ctx| {
        ctx.text("literal wins");
        Ok(())
    })
    .unwrap();

    app.get("/files/*path", |ctx| {
        let path = ctx.param("path").unwrap_or_default().to_string();
        ctx.text(path);
        Ok(())
    })
    .unwrap();

    app.get("/explode", |_| Err(TrellisError::internal("disk on fire")))
        .unwrap();

    app.start().unwrap();
    app
}

fn authorized(method: Method, path: &str) -> Context {
    let token = STANDARD.encode("alice:wonderland");
    Context::new(method, path).with_header("authorization", &format!("Basic {token}"))
}

fn body(ctx: &Context) -> Value {
    serde_json::from_slice(ctx.response_body()).unwrap()
}

#[test]
fn test_nested_params() {
    let app = build_app();

    let mut ctx = authorized(Method::GET, "/users/42/posts/7");
    app.dispatch(&mut ctx);
    assert_eq!(ctx.status(), StatusCode::OK);
    assert_eq!(body(&ctx), json!({ "id": "42", "postId": "7" }));

    let mut ctx = authorized(Method::GET, "/users/42");
    app.dispatch(&mut ctx);
    assert_eq!(body(&ctx), json!({ "id": "42", "caller": "alice" }));
    assert_eq!(ctx.route().map(|r| r.doc().summary.clone()), Some(Some("Fetch one user".to_string())));
    assert!(ctx.has_state(REQUEST_ID_STATE_KEY));
}

#[test]
fn test_precedence_and_wildcard() {
    let app = build_app();

    let mut ctx = authorized(Method::GET, "/users/me");
    app.dispatch(&mut ctx);
    assert_eq!(ctx.response_body().as_ref(), b"literal wins");

    let mut ctx = authorized(Method::GET, "/files/css/site.css");
    app.dispatch(&mut ctx);
    assert_eq!(ctx.response_body().as_ref(), b"css/site.css");

    let mut ctx = authorized(Method::GET, "/files");
    app.dispatch(&mut ctx);
    assert_eq!(ctx.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_recovery_renders_misses_and_failures() {
    let app = build_app();

    let mut ctx = authorized(Method::POST, "/users/1");
    app.dispatch(&mut ctx);
    assert_eq!(ctx.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(ctx.response_header("allow"), Some("GET"));
    assert_eq!(body(&ctx)["code"], 405);

    let mut ctx = authorized(Method::GET, "/explode");
    app.dispatch(&mut ctx);
    assert_eq!(ctx.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body(&ctx)["msg"], "Internal Server Error");
    assert!(!String::from_utf8_lossy(ctx.response_body()).contains("disk on fire"));
}

#[test]
fn test_auth_rejects_before_routing_result() {
    let app = build_app();

    let mut ctx = Context::new(Method::GET, "/users/1");
    app.dispatch(&mut ctx);
    assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        ctx.response_header("www-authenticate"),
        Some("Basic realm=\"api\"")
    );
    assert!(ctx.response_header("x-request-id").is_some());
}

#[test]
fn test_settings_and_stack_from_config() {
    let app = build_app();
    assert!(!app.is_dev_mode());
    assert_eq!(
        ServerSettings::from_store(app.config()).unwrap().addr(),
        "0.0.0.0:9000"
    );
    assert_eq!(
        app.middleware_names(),
        vec!["recovery", "access_log", "request_id", "basic_auth"]
    );
}

#[test]
fn test_contexts_are_reusable_through_a_pool() {
    let app = build_app();
    let pool = ContextPool::new(2);

    for id in ["1", "2", "3"] {
        let mut ctx = pool.acquire(Method::GET, &format!("/users/{id}"));
        let token = STANDARD.encode("alice:wonderland");
        ctx.headers_mut().insert(
            http::header::AUTHORIZATION,
            format!("Basic {token}").parse().unwrap(),
        );
        app.dispatch(&mut ctx);
        assert_eq!(body(&ctx)["id"], id);
        pool.release(ctx);
    }
    assert_eq!(pool.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatch() {
    let app = Arc::new(build_app());

    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                let mut ctx = authorized(Method::GET, &format!("/users/{i}/posts/{}", i * 2));
                app.dispatch(&mut ctx);
                (i, ctx.status(), body(&ctx))
            })
        })
        .collect();

    for task in tasks {
        let (i, status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], i.to_string());
        assert_eq!(body["postId"], (i * 2).to_string());
    }
}
