//! Landing Page Demo
//!
//! The simplest wiring: a static server-rendered page with the plinth
//! backend mounted next to it (`/api/*`, `/admin`, `/uploads`). No schema,
//! no auth — just the runtime and a page.
//!
//! ## Run
//! ```bash
//! cargo run -p landing
//! # open http://localhost:3000
//! ```

use anyhow::Result;
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use clap::Parser;
use plinth_core::prelude::*;

#[derive(Parser)]
struct Args {
    #[arg(short, long, default_value = "3000")]
    port: u16,

    #[arg(long, default_value = "landing.db")]
    db: std::path::PathBuf,
}

fn app_config(connection: Connection) -> AppConfig {
    AppConfig::new(connection)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let args = Args::parse();

    let app = shared::get_or_build(|| app_config(Connection::sqlite(&args.db))).await?;

    log::info!("landing backend ready");

    println!("🏠 Plinth Landing Page");
    println!("======================");
    println!();
    println!("  http://localhost:{}", args.port);
    println!();

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    axum::serve(listener, router(app.clone())).await?;
    Ok(())
}

fn router(app: App) -> Router {
    Router::new().route("/", get(index)).merge(app.router())
}

async fn index() -> Html<&'static str> {
    Html(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8" />
<meta name="viewport" content="width=device-width, initial-scale=1" />
<title>Home</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/franken-ui@2.1.1/dist/css/core.min.css" />
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/franken-ui@2.1.1/dist/css/utilities.min.css" />
</head>
<body>
<main class="max-w-xl mx-auto p-8 flex flex-col gap-4">
<h1 class="text-2xl font-semibold">Hello!</h1>
<p class="text-sm text-muted-foreground">A plinth-backed page. The backend is mounted right here:</p>
<ul class="text-sm list-disc pl-6">
<li><a href="/admin">Admin dashboard</a></li>
<li><code>/api/*</code> — data, auth, and media endpoints</li>
<li><code>/uploads/*</code> — stored files</li>
</ul>
</main>
</body>
</html>"#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn test_router() -> Router {
        router(App::build(app_config(Connection::sqlite_in_memory())).await.unwrap())
    }

    #[tokio::test]
    async fn landing_page_renders() {
        let router = test_router().await;
        let res = router
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8_lossy(&bytes);
        assert!(html.contains("Hello!"));
        assert!(html.contains("/admin"));
    }

    #[tokio::test]
    async fn backend_is_mounted() {
        let router = test_router().await;
        let res = router
            .clone()
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        // auth is disabled, so the guard lets the bootstrap through
        let res = router
            .oneshot(Request::builder().uri("/api/system/config").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
