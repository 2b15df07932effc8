//! Runtime application assembly.
//!
//! [`App::build`] turns one [`AppConfig`] into a running backend: it
//! resolves the JWT secret, connects the store, syncs the schema, writes
//! the config snapshot, and seeds a fresh database. The result hands out
//! two things: an [`axum::Router`] to mount (`/api/*`, the admin
//! dashboard, `/uploads`) and request-scoped [`Api`] handles for
//! server-side rendering.

mod router;

use crate::auth::{AuthApi, AuthContext, AuthRuntime, AuthUser};
use crate::config::{AppConfig, ConfigSnapshot};
use crate::data::{DataApi, Store};
use crate::error::{Error, Result};
use crate::media::{MediaApi, MediaStore};
use crate::schema::Schema;
use axum::http::HeaderMap;
use axum::Router;
use std::sync::Arc;

pub(crate) struct AppInner {
    store: Store,
    auth: AuthRuntime,
    media: MediaStore,
    admin: crate::config::AdminOptions,
}

/// The built backend runtime. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

impl App {
    /// Build the runtime: connect, sync, snapshot, seed.
    ///
    /// Sync failures are hard errors. The snapshot write is the one
    /// genuinely non-fatal step and only logs a warning.
    pub async fn build(config: AppConfig) -> Result<App> {
        let secret = config.resolve_jwt_secret()?;
        let schema = Arc::new(config.data.clone());
        let store = Store::connect(&config.connection, schema).await?;
        let fresh = store.sync(&config.sync, config.auth.enabled).await?;

        if let Some(path) = &config.options.snapshot_path {
            let snapshot = ConfigSnapshot {
                data: &config.data,
                auth: &config.auth,
                admin: &config.admin,
                sync: &config.sync,
            };
            match serde_json::to_string_pretty(&snapshot) {
                Ok(json) => {
                    if let Err(e) = std::fs::write(path, json) {
                        log::warn!("config snapshot not written to {}: {e}", path.display());
                    }
                }
                Err(e) => log::warn!("config snapshot not serializable: {e}"),
            }
        }

        let app = App {
            inner: Arc::new(AppInner {
                store,
                auth: AuthRuntime::new(config.auth.clone(), secret),
                media: MediaStore::new(config.options.uploads_dir()),
                admin: config.admin.clone(),
            }),
        };

        if fresh {
            if let Some(seed) = &config.options.seed {
                log::info!("seeding fresh database");
                seed(app.system_api()).await.map_err(Error::Internal)?;
            }
        }

        Ok(app)
    }

    /// The mountable HTTP surface: data/auth/media APIs, the system config
    /// bootstrap, the admin dashboard, and `/uploads` static serving.
    pub fn router(&self) -> Router {
        router::build(self.clone())
    }

    /// Request-scoped API handle with the identity resolved from headers.
    pub fn api(&self, headers: &HeaderMap) -> Api {
        Api { app: self.clone(), ctx: self.inner.auth.context_from_headers(headers) }
    }

    /// Unauthenticated handle; subject to the guard like any visitor.
    pub fn anonymous_api(&self) -> Api {
        Api { app: self.clone(), ctx: AuthContext::anonymous() }
    }

    /// Guard-bypassing handle for seeds and internal jobs.
    pub fn system_api(&self) -> Api {
        Api { app: self.clone(), ctx: AuthContext::system() }
    }

    pub fn schema(&self) -> &Schema {
        self.inner.store.schema()
    }

    pub(crate) fn store(&self) -> &Store {
        &self.inner.store
    }

    pub(crate) fn auth_runtime(&self) -> &AuthRuntime {
        &self.inner.auth
    }

    pub(crate) fn media_store(&self) -> &MediaStore {
        &self.inner.media
    }

    pub(crate) fn admin_options(&self) -> &crate::config::AdminOptions {
        &self.inner.admin
    }
}

/// Typed access to the backend, scoped to one caller identity.
pub struct Api {
    app: App,
    ctx: AuthContext,
}

impl Api {
    pub fn data(&self) -> DataApi<'_> {
        DataApi::new(&self.app.inner.store, self.app.inner.auth.guard(), &self.ctx)
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(&self.app.inner.store, &self.app.inner.auth, &self.ctx)
    }

    pub fn media(&self) -> MediaApi<'_> {
        MediaApi::new(&self.app.inner.media, self.app.inner.auth.guard(), &self.ctx)
    }

    /// The authenticated user, when there is one.
    pub fn user(&self) -> Option<&AuthUser> {
        self.ctx.user.as_ref()
    }

    /// Check a permission against this handle's identity.
    pub fn require(&self, permission: &str) -> Result<()> {
        self.ctx.authorize(self.app.inner.auth.guard(), permission)
    }
}
