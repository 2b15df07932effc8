//! Todos Demo
//!
//! A server-rendered todo list on the plinth runtime:
//! - Declarative `todos` schema (`title` required, `done` defaults false)
//! - Adding and toggling patched into the page over SSE
//! - The backend mounted alongside: `/api/*`, `/admin`, `/uploads`
//!
//! ## Run
//! ```bash
//! cargo run -p todos
//! # open http://localhost:3000
//! ```

mod views;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use plinth_core::prelude::*;
use serde::Deserialize;
use serde_json::json;

#[derive(Parser)]
struct Args {
    #[arg(short, long, default_value = "3000")]
    port: u16,

    #[arg(long, default_value = "todos.db")]
    db: std::path::PathBuf,
}

fn app_config(connection: Connection) -> AppConfig {
    AppConfig::new(connection)
        .data(Schema::new().entity(
            entity("todos")
                .field(text("title").required())
                .field(boolean("done").default_value(false)),
        ))
        .seed(|api| async move {
            for title in ["Water the plants", "Read a chapter", "Ship the demo"] {
                api.data().create_one("todos", json!({ "title": title })).await?;
            }
            Ok(())
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let app = shared::get_or_build(|| app_config(Connection::sqlite(&args.db))).await?;

    log::info!("todos backend ready");

    println!("✅ Plinth Todos");
    println!("===============");
    println!();
    println!("  http://localhost:{}", args.port);
    println!();

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    axum::serve(listener, router(app.clone())).await?;
    Ok(())
}

fn router(app: App) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/add-todo", post(add_todo))
        .route("/toggle-todo/:id/:checked", post(toggle_todo))
        .with_state(app.clone())
        .merge(app.router())
}

async fn index(State(app): State<App>, headers: HeaderMap) -> plinth_core::Result<Html<String>> {
    let api = app.api(&headers);
    let todos = api.data().read_many("todos", &ListQuery::new().sort("id")).await?;
    Ok(Html(views::page(&todos)))
}

#[derive(Deserialize)]
struct TodoSignals {
    #[serde(default)]
    title: String,
}

async fn add_todo(
    State(app): State<App>,
    headers: HeaderMap,
    Signals(signals): Signals<TodoSignals>,
) -> plinth_core::Result<PatchStream> {
    let title = signals.title.trim();
    if title.is_empty() {
        return Err(Error::BadRequest("Todo title is required".into()));
    }

    let api = app.api(&headers);
    let was_empty = api.data().count("todos").await? == 0;
    let record = api.data().create_one("todos", json!({ "title": title })).await?;

    let stream = if was_empty {
        PatchStream::new().patch(
            Patch::elements(views::todo_list(std::slice::from_ref(&record)))
                .selector("#todo-empty")
                .mode(PatchMode::Replace),
        )
    } else {
        PatchStream::new().patch(
            Patch::elements(views::todo_item(&record))
                .selector("#todo-list")
                .mode(PatchMode::Append),
        )
    };
    Ok(stream.patch(Patch::signals(&json!({ "title": "" }))))
}

async fn toggle_todo(
    State(app): State<App>,
    Path((id, checked)): Path<(i64, bool)>,
    headers: HeaderMap,
) -> plinth_core::Result<PatchStream> {
    let api = app.api(&headers);
    let record = api.data().update_one("todos", id, json!({ "done": checked })).await?;
    // the item carries its own id; the default outer patch morphs it in place
    Ok(PatchStream::new().patch(Patch::elements(views::todo_item(&record))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn seeded_router() -> Router {
        router(App::build(app_config(Connection::sqlite_in_memory())).await.unwrap())
    }

    async fn empty_router() -> Router {
        let mut cfg = app_config(Connection::sqlite_in_memory());
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

    fn post_empty(uri: &str) -> Request<Body> {
        Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn index_renders_seeded_todos() {
        let router = seeded_router().await;
        let (status, body) = send(&router, get_index()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("id=\"todo-list\""));
        assert!(body.contains("Water the plants"));
        assert!(!body.contains(" checked"));
    }

    #[tokio::test]
    async fn toggle_persists_and_rerenders() {
        let router = seeded_router().await;

        let (status, body) = send(&router, post_empty("/toggle-todo/1/true")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("datastar-patch-elements"));
        assert!(body.contains(" checked"));
        assert!(body.contains("/toggle-todo/1/false"));

        let (_, page) = send(&router, get_index()).await;
        assert!(page.contains(" checked"));

        // and back again
        let (_, body) = send(&router, post_empty("/toggle-todo/1/false")).await;
        assert!(!body.contains(" checked"));
        let (_, page) = send(&router, get_index()).await;
        assert!(!page.contains(" checked"));
    }

    #[tokio::test]
    async fn toggling_a_missing_todo_is_not_found() {
        let router = seeded_router().await;
        let (status, body) = send(&router, post_empty("/toggle-todo/99/true")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("NOT_FOUND"));
    }

    #[tokio::test]
    async fn added_todo_is_patched_in_and_persists() {
        let router = seeded_router().await;

        let (status, body) =
            send(&router, post_json("/add-todo", json!({ "title": "new entry" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("selector #todo-list"));
        assert!(body.contains("mode append"));
        assert!(body.contains("new entry"));
        assert!(body.contains("datastar-patch-signals"));

        let (_, page) = send(&router, get_index()).await;
        assert!(page.contains("new entry"));
    }

    #[tokio::test]
    async fn first_todo_replaces_the_empty_state() {
        let router = empty_router().await;

        let (_, page) = send(&router, get_index()).await;
        assert!(page.contains("id=\"todo-empty\""));

        let (status, body) =
            send(&router, post_json("/add-todo", json!({ "title": "the first" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("selector #todo-empty"));
        assert!(body.contains("mode replace"));
        assert!(body.contains("id=\"todo-list\""));
    }

    #[tokio::test]
    async fn blank_title_is_rejected() {
        let router = seeded_router().await;
        let (status, _) = send(&router, post_json("/add-todo", json!({ "title": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
