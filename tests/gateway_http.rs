//! HTTP surface exercised in-process.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::IntoResponse;
use parking_lot::Mutex;
use serde_json::json;

use service_guard::http::middleware::{X_GATEWAY_SOURCE, X_REQUEST_TIME};
use service_guard::http::{Completion, Flow, Interceptor, InterceptorChain, RequestContext};

mod common;

type Journal = Arc<Mutex<Vec<String>>>;

/// Records its hooks; optionally answers 403 itself.
struct Recorder {
    name: &'static str,
    priority: i32,
    deny: bool,
    journal: Journal,
    seen_headers: Arc<Mutex<Option<HeaderMap>>>,
}

impl Recorder {
    fn new(name: &'static str, priority: i32, journal: &Journal) -> Self {
        Self {
            name,
            priority,
            deny: false,
            journal: journal.clone(),
            seen_headers: Arc::default(),
        }
    }
}

impl Interceptor for Recorder {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn before(&self, ctx: &mut RequestContext) -> Flow {
        self.journal.lock().push(format!("before:{}", self.name));
        *self.seen_headers.lock() = Some(ctx.headers.clone());
        if self.deny {
            Flow::Respond(StatusCode::FORBIDDEN.into_response())
        } else {
            Flow::Continue
        }
    }

    fn after(&self, _ctx: &RequestContext, completion: &Completion) {
        self.journal
            .lock()
            .push(format!("after:{}:{}", self.name, completion.status));
    }
}

#[tokio::test]
async fn test_gateway_health_and_config() {
    let app = common::app(common::test_config());

    let health = common::get(&app, "/gateway/health").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "UP");
    assert_eq!(health.body["service"], "gateway-service");

    let greeting = common::get(&app, "/config/greeting").await;
    assert_eq!(greeting.body, json!("Hello, Default!"));

    let feature = common::get(&app, "/config/feature-status").await;
    assert_eq!(feature.body, json!(false));
}

#[tokio::test]
async fn test_source_tag_headers_reach_downstream() {
    let journal = Journal::default();
    let observer = Recorder::new("observer", 0, &journal);
    let seen = observer.seen_headers.clone();
    let app = common::app_with_chain(common::test_config(), |mut chain| {
        chain.register(observer);
        chain
    });

    let response = common::get(&app, "/api/sentinel/status").await;
    assert_eq!(response.status, StatusCode::OK);

    let headers = seen.lock().clone().unwrap();
    assert_eq!(headers[X_GATEWAY_SOURCE], "gateway-service");
    let stamp: u64 = headers[X_REQUEST_TIME].to_str().unwrap().parse().unwrap();
    assert!(stamp > 0);
}

#[tokio::test]
async fn test_short_circuit_skips_later_interceptors_and_handler() {
    let journal = Journal::default();
    let app = common::app_with_chain(common::test_config(), |_| {
        let mut chain = InterceptorChain::new();
        let mut deny = Recorder::new("p5", 5, &journal);
        deny.deny = true;
        chain
            .register(Recorder::new("p10", 10, &journal))
            .register(deny)
            .register(Recorder::new("p0", 0, &journal));
        chain
    });

    let response = common::get(&app, "/api/sentinel/test").await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        *journal.lock(),
        vec!["before:p0", "before:p5", "after:p5:403", "after:p0:403"]
    );
}

#[tokio::test]
async fn test_after_hooks_see_unmatched_routes() {
    let journal = Journal::default();
    let app = common::app_with_chain(common::test_config(), |mut chain| {
        chain.register(Recorder::new("observer", 0, &journal));
        chain
    });

    let response = common::get(&app, "/no/such/route").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(*journal.lock(), vec!["before:observer", "after:observer:404"]);
}

#[tokio::test]
async fn test_rate_limited_endpoint_uses_block_handler() {
    let app = common::app(common::test_config());

    for _ in 0..5 {
        let ok = common::get(&app, "/api/sentinel/test").await;
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.body["status"], "success");
    }

    let blocked = common::get(&app, "/api/sentinel/test").await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(blocked.body["status"], "blocked");
    assert_eq!(blocked.body["reason"], "rate");
    assert_eq!(blocked.body["body"], "Product service busy, please retry later");
}

#[tokio::test]
async fn test_hotkeys_are_limited_independently() {
    let app = common::app(common::test_config());

    for _ in 0..2 {
        assert_eq!(common::get(&app, "/api/sentinel/hotkey/A").await.status, StatusCode::OK);
    }
    let blocked = common::get(&app, "/api/sentinel/hotkey/A").await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(blocked.body["body"], "Product A requested too often, please retry later");

    assert_eq!(common::get(&app, "/api/sentinel/hotkey/B").await.status, StatusCode::OK);
}

#[tokio::test]
async fn test_failing_endpoint_serves_fallback() {
    let app = common::app(common::test_config());

    let response = common::get(&app, "/api/sentinel/exception?errorRate=100").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.headers["x-degraded"], "true");
    assert_eq!(response.body["status"], "degraded");
    assert_eq!(
        response.body["body"],
        "Product exception endpoint degraded - temporarily unavailable"
    );

    let ok = common::get(&app, "/api/sentinel/exception?errorRate=0").await;
    assert_eq!(ok.body["status"], "success");
}

#[tokio::test]
async fn test_product_with_user_composes_remote_lookup() {
    let backend = common::start_user_backend().await;
    let mut config = common::test_config();
    config.upstreams.user_service_url = format!("http://{backend}");
    let app = common::app(config);

    let response = common::get(&app, "/products/1/with-user").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["product"]["id"], 1);
    assert_eq!(response.body["user"]["username"], "alice");
    assert!(response.body.get("userError").is_none());
}

#[tokio::test]
async fn test_product_with_user_degrades_when_user_service_is_down() {
    let mut config = common::test_config();
    config.upstreams.user_service_url = format!("http://{}", common::dead_address().await);
    let app = common::app(config);

    let response = common::get(&app, "/products/1/with-user").await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(response.body["user"].is_null());
    assert!(response.body["userError"]
        .as_str()
        .unwrap()
        .starts_with("user service temporarily unavailable"));

    let missing = common::get(&app, "/products/999/with-user").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_crud() {
    let app = common::app(common::test_config());

    let created = common::send(
        &app,
        Request::post("/products")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "name": "Desk Lamp", "price": 19.9, "categoryId": 2 }).to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["id"].as_u64().unwrap();

    let fetched = common::get(&app, &format!("/products/{id}")).await;
    assert_eq!(fetched.body["name"], "Desk Lamp");

    let deleted = common::send(
        &app,
        Request::delete(format!("/products/{id}")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(common::get(&app, &format!("/products/{id}")).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_user_crud() {
    let app = common::app(common::test_config());
    let json_request = |method: &str, uri: String, body: serde_json::Value| {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let listed = common::get(&app, "/users").await;
    assert_eq!(listed.body.as_array().map(Vec::len), Some(2));

    let created = common::send(
        &app,
        json_request(
            "POST",
            "/users".to_string(),
            json!({ "username": "carol", "email": "carol@example.com" }),
        ),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["id"].as_u64().unwrap();
    assert_eq!(id, 3);

    let updated = common::send(
        &app,
        json_request(
            "PUT",
            format!("/users/{id}"),
            json!({ "username": "carol", "email": "carol@corp.example" }),
        ),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["id"], id);

    let fetched = common::get(&app, &format!("/users/{id}")).await;
    assert_eq!(fetched.body["email"], "carol@corp.example");

    let unknown = common::send(
        &app,
        json_request(
            "PUT",
            "/users/999".to_string(),
            json!({ "username": "nobody", "email": "nobody@example.com" }),
        ),
    )
    .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let deleted = common::send(
        &app,
        Request::delete(format!("/users/{id}")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(common::get(&app, &format!("/users/{id}")).await.status, StatusCode::NOT_FOUND);

    let again = common::send(
        &app,
        Request::delete(format!("/users/{id}")).body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let app = common::app(common::test_config());

    let denied = common::get(&app, "/admin/resources").await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);

    let allowed = common::send(
        &app,
        Request::get("/admin/resources")
            .header("authorization", "Bearer test-key")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(allowed.status, StatusCode::OK);
    let names: Vec<_> = allowed
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect();
    assert!(names.contains(&"product-test".to_string()));
    assert!(names.contains(&"lookup-user".to_string()));
}

#[tokio::test]
async fn test_admin_routes_absent_when_disabled() {
    let mut config = common::test_config();
    config.admin.enabled = false;
    let app = common::app(config);
    assert_eq!(common::get(&app, "/admin/status").await.status, StatusCode::NOT_FOUND);
}
