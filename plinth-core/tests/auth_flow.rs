//! Router-level auth and guard behavior.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use plinth_core::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

fn auth_config() -> AuthConfig {
    AuthConfig::enabled()
        .allow_register(true)
        .issuer("plinth-tests")
        .secret("test-secret")
        .role(RoleConfig::new("admin").implicit_allow())
        .role(
            RoleConfig::new("default")
                .permissions(["data.entity.read", "data.entity.create"])
                .is_default(),
        )
}

fn config() -> AppConfig {
    AppConfig::new(Connection::sqlite_in_memory())
        .data(Schema::new().entity(entity("posts").field(text("content").required())))
        .auth(auth_config())
        .seed(|api| async move {
            api.auth().create_user("admin@example.com", "password123", "admin").await?;
            Ok(())
        })
}

async fn router() -> axum::Router {
    App::build(config()).await.expect("app builds").router()
}

async fn send(router: &axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let res = router.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bearer(req: Request<Body>, token: &str) -> Request<Body> {
    let (mut parts, body) = req.into_parts();
    parts.headers.insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    Request::from_parts(parts, body)
}

async fn login(router: &axum::Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        router,
        json_request(
            "POST",
            "/api/auth/password/login",
            json!({ "email": email, "password": password }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_then_me() {
    let router = router().await;

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/api/auth/password/register",
            json!({ "email": "user@example.com", "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["role"], json!("default"));
    let token = body["token"].as_str().unwrap().to_string();

    let req = bearer(Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap(), &token);
    let (status, body) = send(&router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], json!("user@example.com"));

    let (status, _) =
        send(&router, Request::builder().uri("/api/auth/me").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_register_conflicts() {
    let router = router().await;
    let body = json!({ "email": "dup@example.com", "password": "password123" });
    let (status, _) =
        send(&router, json_request("POST", "/api/auth/password/register", body.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) =
        send(&router, json_request("POST", "/api/auth/password/register", body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let router = router().await;
    let (status, _) = send(
        &router,
        json_request(
            "POST",
            "/api/auth/password/login",
            json!({ "email": "admin@example.com", "password": "nope" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_sets_session_cookie() {
    let router = router().await;
    let res = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/password/login",
            json!({ "email": "admin@example.com", "password": "password123" }),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = res.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cookie.starts_with("auth="));
    assert!(cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn guard_matrix_over_data_routes() {
    let router = router().await;

    // anonymous falls back to the default role: read passes, delete does not
    let (status, _) = send(
        &router,
        Request::builder().uri("/api/data/entity/posts").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &router,
        Request::builder()
            .method("DELETE")
            .uri("/api/data/entity/posts/1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // default role: read + create pass, delete is forbidden
    let (_, body) = send(
        &router,
        json_request(
            "POST",
            "/api/auth/password/register",
            json!({ "email": "user@example.com", "password": "password123" }),
        ),
    )
    .await;
    let user_token = body["token"].as_str().unwrap().to_string();

    let req = bearer(
        json_request("POST", "/api/data/entity/posts", json!({ "content": "hi" })),
        &user_token,
    );
    let (status, created) = send(&router, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    let req = bearer(
        Request::builder().uri("/api/data/entity/posts").body(Body::empty()).unwrap(),
        &user_token,
    );
    let (status, list) = send(&router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let req = bearer(
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/data/entity/posts/{id}"))
            .body(Body::empty())
            .unwrap(),
        &user_token,
    );
    let (status, _) = send(&router, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // admin (implicit_allow): delete passes
    let admin_token = login(&router, "admin@example.com", "password123").await;
    let req = bearer(
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/data/entity/posts/{id}"))
            .body(Body::empty())
            .unwrap(),
        &admin_token,
    );
    let (status, _) = send(&router, req).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn system_config_requires_api_access() {
    let router = router().await;

    let (status, _) = send(
        &router,
        Request::builder().uri("/api/system/config").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = login(&router, "admin@example.com", "password123").await;
    let req = bearer(
        Request::builder().uri("/api/system/config").body(Body::empty()).unwrap(),
        &token,
    );
    let (status, body) = send(&router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["entities"][0]["name"], json!("posts"));
    assert_eq!(body["auth"]["allow_register"], json!(true));
}

#[tokio::test]
async fn registration_can_be_disabled() {
    let config = AppConfig::new(Connection::sqlite_in_memory())
        .auth(auth_config().allow_register(false));
    let router = App::build(config).await.unwrap().router();

    let (status, _) = send(
        &router,
        json_request(
            "POST",
            "/api/auth/password/register",
            json!({ "email": "user@example.com", "password": "password123" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_dashboard_is_served() {
    let router = router().await;
    let res = router
        .clone()
        .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8_lossy(&bytes);
    assert!(html.contains("Plinth Admin"));
}
