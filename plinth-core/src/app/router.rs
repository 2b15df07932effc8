//! REST surface mounted by [`App::router`].

use super::App;
use crate::admin_ui;
use crate::auth::auth_cookie;
use crate::data::{ListQuery, Record};
use crate::error::{Error, Result};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{AppendHeaders, Html, IntoResponse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::services::ServeDir;

pub(crate) fn build(app: App) -> Router {
    let admin_base = app.admin_options().basepath.clone();
    let uploads_dir = app.media_store().dir().clone();

    Router::new()
        .route("/api/system/config", get(system_config))
        .route("/api/data/entity/:entity", get(list_records).post(create_record))
        .route(
            "/api/data/entity/:entity/:id",
            get(get_record).patch(update_record).delete(delete_record),
        )
        .route("/api/auth/password/login", post(login))
        .route("/api/auth/password/register", post(register))
        .route("/api/auth/me", get(me))
        .route("/api/media/upload/:filename", post(upload_file))
        .route("/api/media/files", get(list_files))
        .route("/api/media/file/:name", delete(delete_file))
        .route(&admin_base, get(admin_page))
        .route(&format!("{admin_base}/*rest"), get(admin_page))
        .nest_service("/uploads", ServeDir::new(uploads_dir))
        .with_state(app)
}

// ---- system ----------------------------------------------------------------

async fn system_config(State(app): State<App>, headers: HeaderMap) -> Result<Json<Value>> {
    let api = app.api(&headers);
    api.require("system.access.api")?;
    let auth = app.auth_runtime().config();
    Ok(Json(json!({
        "data": app.schema(),
        "auth": {
            "enabled": auth.enabled,
            "allow_register": auth.allow_register,
        },
        "admin": app.admin_options(),
    })))
}

// ---- data ------------------------------------------------------------------

async fn list_records(
    State(app): State<App>,
    Path(entity): Path<String>,
    Query(query): Query<ListQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Record>>> {
    let api = app.api(&headers);
    Ok(Json(api.data().read_many(&entity, &query).await?))
}

async fn get_record(
    State(app): State<App>,
    Path((entity, id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Result<Json<Record>> {
    let api = app.api(&headers);
    Ok(Json(api.data().read_one(&entity, id).await?))
}

async fn create_record(
    State(app): State<App>,
    Path(entity): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Record>)> {
    let api = app.api(&headers);
    let record = api.data().create_one(&entity, payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn update_record(
    State(app): State<App>,
    Path((entity, id)): Path<(String, i64)>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<Json<Record>> {
    let api = app.api(&headers);
    Ok(Json(api.data().update_one(&entity, id, payload).await?))
}

async fn delete_record(
    State(app): State<App>,
    Path((entity, id)): Path<(String, i64)>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let api = app.api(&headers);
    api.data().delete_one(&entity, id).await?;
    Ok(Json(json!({ "deleted": id })))
}

// ---- auth ------------------------------------------------------------------

#[derive(Deserialize)]
struct Credentials {
    email: String,
    password: String,
}

async fn login(
    State(app): State<App>,
    headers: HeaderMap,
    Json(creds): Json<Credentials>,
) -> Result<impl IntoResponse> {
    let api = app.api(&headers);
    let token = api.auth().login(&creds.email, &creds.password).await?;
    let cookie = auth_cookie(&token.token);
    Ok((AppendHeaders([(header::SET_COOKIE, cookie)]), Json(token)))
}

async fn register(
    State(app): State<App>,
    headers: HeaderMap,
    Json(creds): Json<Credentials>,
) -> Result<impl IntoResponse> {
    let api = app.api(&headers);
    let token = api.auth().register(&creds.email, &creds.password).await?;
    let cookie = auth_cookie(&token.token);
    Ok((StatusCode::CREATED, AppendHeaders([(header::SET_COOKIE, cookie)]), Json(token)))
}

async fn me(State(app): State<App>, headers: HeaderMap) -> Result<Json<Value>> {
    let api = app.api(&headers);
    match api.user() {
        Some(user) => Ok(Json(json!(user))),
        None => Err(Error::Unauthorized),
    }
}

// ---- media -----------------------------------------------------------------

async fn upload_file(
    State(app): State<App>,
    Path(filename): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>)> {
    let api = app.api(&headers);
    let stored = api.media().upload(&filename, &body).await?;
    Ok((StatusCode::CREATED, Json(json!(stored))))
}

async fn list_files(State(app): State<App>, headers: HeaderMap) -> Result<Json<Value>> {
    let api = app.api(&headers);
    Ok(Json(json!(api.media().list().await?)))
}

async fn delete_file(
    State(app): State<App>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>> {
    let api = app.api(&headers);
    api.media().delete(&name).await?;
    Ok(Json(json!({ "deleted": name })))
}

// ---- admin -----------------------------------------------------------------

async fn admin_page(State(app): State<App>) -> Html<String> {
    Html(admin_ui::render(app.admin_options()))
}
