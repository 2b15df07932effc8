//! Plinth - Core
//!
//! A declarative headless backend runtime. You describe your data schema,
//! auth roles, and options as one config value; Plinth derives the rest:
//! a schema-synced SQLite store, a CRUD data API, password/JWT auth with a
//! role-permission guard, media uploads, and an embedded admin dashboard —
//! all mounted as one `axum` router your app composes with its own routes.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use plinth_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::new(Connection::sqlite("data.db"))
//!         .data(Schema::new().entity(
//!             entity("todos")
//!                 .field(text("title").required())
//!                 .field(boolean("done").default_value(false)),
//!         ));
//!
//!     let app = App::build(config).await?;
//!     let router = axum::Router::new().merge(app.router());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`schema`] - Declarative entity/field definitions
//! - [`config`] - The `AppConfig` value and secret resolution
//! - [`data`] - SQLite store, schema sync, and the CRUD data API
//! - [`auth`] - Password/JWT auth and the role-permission guard
//! - [`media`] - File uploads under `/uploads`
//! - [`hypermedia`] - SSE DOM patches and client signals
//! - [`app`] - Runtime assembly: `App::build`, the router, `Api` handles
//! - [`admin_ui`] - Embedded single-file admin dashboard

pub mod admin_ui;
pub mod app;
pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod hypermedia;
pub mod media;
pub mod prelude;
pub mod schema;
pub mod shared;

pub use error::{Error, Result};
