//! Microblog Demo
//!
//! A server-rendered microblog on the plinth runtime:
//! - Declarative `posts` schema with the timestamps plugin
//! - Auth with an implicit-allow admin role and a permissive default role
//! - Post creation and deletion patched into the page over SSE
//! - A plain form fallback (`POST /submit-post`) for scriptless clients
//! - The backend mounted alongside: `/api/*`, `/admin`, `/uploads`
//!
//! ## Run
//! ```bash
//! cargo run -p microblog
//! # open http://localhost:3000 (admin dashboard at /admin)
//! ```

mod config;
mod views;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{Html, Redirect};
use axum::routing::{delete, get, post};
use axum::{Form, Router};
use clap::Parser;
use plinth_core::prelude::*;
use serde::Deserialize;
use serde_json::json;

#[derive(Parser)]
struct Args {
    #[arg(short, long, default_value = "3000")]
    port: u16,

    #[arg(long, default_value = "data.db")]
    db: std::path::PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let app = shared::get_or_build(|| {
        config::app_config(Connection::sqlite(&args.db))
            .snapshot_path("plinth.snapshot.json")
            .env_file(".env")
    })
    .await?;

    log::info!("microblog backend ready ({} entities)", app.schema().entities.len());

    println!("🪶 Plinth Microblog");
    println!("===================");
    println!();
    println!("  http://localhost:{}", args.port);
    println!("  admin dashboard at /admin (admin@example.com / password)");
    println!();

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    axum::serve(listener, router(app.clone())).await?;
    Ok(())
}

fn router(app: App) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/create-post", post(create_post))
        .route("/submit-post", post(submit_post))
        .route("/delete-post/:id", delete(delete_post))
        .with_state(app.clone())
        .merge(app.router())
}

async fn index(State(app): State<App>, headers: HeaderMap) -> plinth_core::Result<Html<String>> {
    let api = app.api(&headers);
    let posts = api.data().read_many("posts", &ListQuery::new().sort("-created_at")).await?;
    Ok(Html(views::page(&posts)))
}

#[derive(Deserialize)]
struct PostSignals {
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: Option<String>,
}

async fn create_post(
    State(app): State<App>,
    headers: HeaderMap,
    Signals(signals): Signals<PostSignals>,
) -> plinth_core::Result<PatchStream> {
    let was_empty = app.api(&headers).data().count("posts").await? == 0;
    let record = store_post(&app, &headers, &signals.content, signals.url.as_deref()).await?;

    let stream = if was_empty {
        PatchStream::new().patch(
            Patch::elements(views::post_list(std::slice::from_ref(&record)))
                .selector("#post-empty")
                .mode(PatchMode::Replace),
        )
    } else {
        PatchStream::new().patch(
            Patch::elements(views::post_item(&record))
                .selector("#post-list")
                .mode(PatchMode::Prepend),
        )
    };
    Ok(stream.patch(Patch::signals(&json!({ "content": "", "url": "" }))))
}

#[derive(Deserialize)]
struct PostForm {
    content: String,
    #[serde(default)]
    url: Option<String>,
}

/// Scriptless fallback: same validation, then back to the page.
async fn submit_post(
    State(app): State<App>,
    headers: HeaderMap,
    Form(form): Form<PostForm>,
) -> plinth_core::Result<Redirect> {
    store_post(&app, &headers, &form.content, form.url.as_deref()).await?;
    Ok(Redirect::to("/"))
}

async fn store_post(
    app: &App,
    headers: &HeaderMap,
    content: &str,
    url: Option<&str>,
) -> plinth_core::Result<Record> {
    let content = content.trim();
    if content.is_empty() {
        return Err(Error::BadRequest("Post content is required".into()));
    }
    // anything that is not an absolute http(s) URL is dropped, not stored
    let url = url.map(str::trim).filter(|u| views::is_url(u));
    let api = app.api(headers);
    api.data().create_one("posts", json!({ "content": content, "url": url })).await
}

async fn delete_post(
    State(app): State<App>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> plinth_core::Result<PatchStream> {
    let api = app.api(&headers);
    api.data().delete_one("posts", id).await?;

    if api.data().count("posts").await? == 0 {
        // the list itself goes away; show the empty state in its place
        Ok(PatchStream::new().patch(
            Patch::elements(views::empty_state()).selector("#post-list").mode(PatchMode::Replace),
        ))
    } else {
        Ok(PatchStream::new().patch(Patch::remove(format!("#post-{id}"))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn seeded_router() -> Router {
        let app = App::build(config::app_config(Connection::sqlite_in_memory())).await.unwrap();
        router(app)
    }

    async fn empty_router() -> Router {
        let mut cfg = config::app_config(Connection::sqlite_in_memory());
        cfg.options.seed = None;
        router(App::build(cfg).await.unwrap())
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, String) {
        let res = router.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    fn get_index() -> Request<Body> {
        Request::builder().uri("/").body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn index_renders_seeded_posts() {
        let router = seeded_router().await;
        let (status, body) = send(&router, get_index()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("id=\"post-list\""));
        assert!(body.contains("Just shipped a new feature!"));
        assert!(body.contains("https://twitter.com/example/status/123"));
    }

    #[tokio::test]
    async fn created_post_is_patched_in_and_persists() {
        let router = seeded_router().await;

        let (status, body) =
            send(&router, post_json("/create-post", json!({ "content": "hello from a test" })))
                .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("datastar-patch-elements"));
        assert!(body.contains("selector #post-list"));
        assert!(body.contains("mode prepend"));
        assert!(body.contains("hello from a test"));
        // signals cleared after a successful post
        assert!(body.contains("datastar-patch-signals"));

        let (_, page) = send(&router, get_index()).await;
        assert!(page.contains("hello from a test"));
    }

    #[tokio::test]
    async fn first_post_replaces_the_empty_state() {
        let router = empty_router().await;

        let (_, page) = send(&router, get_index()).await;
        assert!(page.contains("id=\"post-empty\""));

        let (status, body) =
            send(&router, post_json("/create-post", json!({ "content": "the first post" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("selector #post-empty"));
        assert!(body.contains("mode replace"));
        assert!(body.contains("id=\"post-list\""));
    }

    #[tokio::test]
    async fn blank_content_is_rejected() {
        let router = seeded_router().await;
        let (status, body) =
            send(&router, post_json("/create-post", json!({ "content": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("error"));
    }

    #[tokio::test]
    async fn invalid_url_is_dropped() {
        let router = seeded_router().await;
        let (status, _) = send(
            &router,
            post_json("/create-post", json!({ "content": "with a bad link", "url": "not a url" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, page) = send(&router, get_index()).await;
        assert!(page.contains("with a bad link"));
        assert!(!page.contains("not a url"));
    }

    #[tokio::test]
    async fn deleting_one_of_many_removes_only_that_fragment() {
        let router = seeded_router().await;
        let (status, body) = send(
            &router,
            Request::builder()
                .method("DELETE")
                .uri("/delete-post/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("selector #post-1"));
        assert!(body.contains("mode remove"));

        let (_, page) = send(&router, get_index()).await;
        assert!(!page.contains("Just shipped a new feature!"));
        assert!(page.contains("Hot take"));
    }

    #[tokio::test]
    async fn deleting_the_last_post_restores_the_empty_state() {
        let router = empty_router().await;
        let (_, body) =
            send(&router, post_json("/create-post", json!({ "content": "only one" }))).await;
        assert!(body.contains("only one"));

        let (status, body) = send(
            &router,
            Request::builder()
                .method("DELETE")
                .uri("/delete-post/1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("selector #post-list"));
        assert!(body.contains("mode replace"));
        assert!(body.contains("id=\"post-empty\""));
    }

    #[tokio::test]
    async fn deleting_a_missing_post_is_not_found() {
        let router = seeded_router().await;
        let (status, body) = send(
            &router,
            Request::builder()
                .method("DELETE")
                .uri("/delete-post/999")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("NOT_FOUND"));
    }

    #[tokio::test]
    async fn form_fallback_redirects_to_the_page() {
        let router = seeded_router().await;
        let res = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/submit-post")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("content=posted+via+form"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers().get(header::LOCATION).unwrap(), "/");

        let (_, page) = send(&router, get_index()).await;
        assert!(page.contains("posted via form"));
    }

    #[tokio::test]
    async fn backend_routes_are_mounted() {
        let router = seeded_router().await;
        let (status, body) = send(
            &router,
            Request::builder().uri("/api/data/entity/posts?limit=2").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with('['));

        let (status, _) =
            send(&router, Request::builder().uri("/admin").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
    }
}
