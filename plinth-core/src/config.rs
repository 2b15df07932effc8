//! Application configuration.
//!
//! Configuration is declared in code as one [`AppConfig`] value, the same
//! way the schema is declared: construct, chain builder methods, hand it to
//! [`App::build`](crate::app::App::build). There is no config file; demos
//! that want environment overrides load a dotenv file before building.
//!
//! The JWT secret resolution mirrors the usual dev workflow: explicit
//! config wins, then the `PLINTH_JWT_SECRET` environment variable, then a
//! secret persisted in `options.env_file`, and as a last resort a freshly
//! generated one (persisted to `options.env_file` when set, ephemeral
//! otherwise).

use crate::app::Api;
use crate::error::{Error, Result};
use crate::schema::Schema;
use rand::{distributions::Alphanumeric, Rng};
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

/// Where the embedded database lives.
#[derive(Debug, Clone)]
pub enum Connection {
    /// File-backed database, created on first run.
    File(PathBuf),
    /// In-memory database. Used by the test suites.
    Memory,
}

impl Connection {
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Connection::File(path.into())
    }

    pub fn sqlite_in_memory() -> Self {
        Connection::Memory
    }
}

/// JWT settings. `secret: None` defers to env / generated secrets.
#[derive(Debug, Clone, Serialize)]
pub struct JwtConfig {
    pub issuer: String,
    #[serde(skip)]
    pub secret: Option<String>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self { issuer: "plinth".into(), secret: None }
    }
}

/// One role and the permission strings it grants.
#[derive(Debug, Clone, Serialize)]
pub struct RoleConfig {
    pub name: String,
    /// Role passes every guard check without consulting `permissions`.
    pub implicit_allow: bool,
    pub permissions: Vec<String>,
    /// Assigned to self-registered users.
    pub is_default: bool,
}

impl RoleConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), implicit_allow: false, permissions: Vec::new(), is_default: false }
    }

    pub fn implicit_allow(mut self) -> Self {
        self.implicit_allow = true;
        self
    }

    pub fn permissions<I, P>(mut self, perms: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.permissions = perms.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// Auth module settings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthConfig {
    pub enabled: bool,
    pub allow_register: bool,
    pub jwt: JwtConfig,
    /// When false, every permission check passes.
    pub guard_enabled: bool,
    pub roles: Vec<RoleConfig>,
}

impl AuthConfig {
    pub fn enabled() -> Self {
        Self { enabled: true, guard_enabled: true, ..Default::default() }
    }

    pub fn allow_register(mut self, allow: bool) -> Self {
        self.allow_register = allow;
        self
    }

    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.jwt.issuer = issuer.into();
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt.secret = Some(secret.into());
        self
    }

    pub fn guard(mut self, enabled: bool) -> Self {
        self.guard_enabled = enabled;
        self
    }

    pub fn role(mut self, role: RoleConfig) -> Self {
        self.roles.push(role);
        self
    }

    pub(crate) fn default_role(&self) -> Option<&RoleConfig> {
        self.roles.iter().find(|r| r.is_default)
    }
}

/// Admin dashboard mount settings.
#[derive(Debug, Clone, Serialize)]
pub struct AdminOptions {
    /// Path the embedded dashboard is served under.
    pub basepath: String,
    /// Where the dashboard's "back to app" link points.
    pub logo_return_path: String,
}

impl Default for AdminOptions {
    fn default() -> Self {
        Self { basepath: "/admin".into(), logo_return_path: "/".into() }
    }
}

/// Schema sync behavior.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncOptions {
    /// Apply additive column changes to existing tables.
    pub force: bool,
    /// Drop and recreate all managed tables on every sync.
    pub drop: bool,
}

pub type SeedFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
pub type SeedFn = Arc<dyn Fn(Api) -> SeedFuture + Send + Sync>;

/// Runtime options that are not part of the declarative surface.
#[derive(Clone, Default)]
pub struct AppOptions {
    /// Runs once against a freshly initialized database.
    pub seed: Option<SeedFn>,
    /// JSON snapshot of the declarative config, written after sync.
    pub snapshot_path: Option<PathBuf>,
    /// Dotenv-style file for persisting a generated JWT secret.
    pub env_file: Option<PathBuf>,
    /// Media storage directory, also mounted at `/uploads`.
    pub uploads_dir: Option<PathBuf>,
}

impl AppOptions {
    pub(crate) fn uploads_dir(&self) -> PathBuf {
        self.uploads_dir.clone().unwrap_or_else(|| PathBuf::from("./uploads"))
    }
}

/// Everything [`App::build`](crate::app::App::build) needs.
#[derive(Clone)]
pub struct AppConfig {
    pub connection: Connection,
    pub data: Schema,
    pub auth: AuthConfig,
    pub admin: AdminOptions,
    pub sync: SyncOptions,
    pub options: AppOptions,
}

impl AppConfig {
    pub fn new(connection: Connection) -> Self {
        Self {
            connection,
            data: Schema::default(),
            auth: AuthConfig::default(),
            admin: AdminOptions::default(),
            sync: SyncOptions::default(),
            options: AppOptions::default(),
        }
    }

    pub fn data(mut self, schema: Schema) -> Self {
        self.data = schema;
        self
    }

    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    pub fn admin(mut self, admin: AdminOptions) -> Self {
        self.admin = admin;
        self
    }

    pub fn sync(mut self, sync: SyncOptions) -> Self {
        self.sync = sync;
        self
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.snapshot_path = Some(path.into());
        self
    }

    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn uploads_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.uploads_dir = Some(path.into());
        self
    }

    pub fn seed<F, Fut>(mut self, seed: F) -> Self
    where
        F: Fn(Api) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.options.seed = Some(Arc::new(move |api| Box::pin(seed(api))));
        self
    }

    /// Resolve the signing secret per the order documented on this module.
    pub(crate) fn resolve_jwt_secret(&self) -> Result<String> {
        if let Some(secret) = self.jwt_secret_from_config() {
            return Ok(secret);
        }
        if let Ok(secret) = std::env::var("PLINTH_JWT_SECRET") {
            if !secret.is_empty() {
                return Ok(secret);
            }
        }
        if let Some(env_file) = &self.options.env_file {
            if let Some(secret) = read_env_secret(env_file)? {
                return Ok(secret);
            }
            let secret = secure_random_string(64);
            append_env_secret(env_file, &secret)?;
            log::info!("generated JWT secret persisted to {}", env_file.display());
            return Ok(secret);
        }
        log::warn!("no JWT secret configured; using an ephemeral one (sessions reset on restart)");
        Ok(secure_random_string(64))
    }

    fn jwt_secret_from_config(&self) -> Option<String> {
        self.auth.jwt.secret.as_ref().filter(|s| !s.is_empty()).cloned()
    }
}

/// Serializable view of the declarative parts, written as the sync snapshot.
#[derive(Serialize)]
pub(crate) struct ConfigSnapshot<'a> {
    pub data: &'a Schema,
    pub auth: &'a AuthConfig,
    pub admin: &'a AdminOptions,
    pub sync: &'a SyncOptions,
}

/// Alphanumeric secret generator.
pub fn secure_random_string(len: usize) -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(len).map(char::from).collect()
}

const ENV_SECRET_KEY: &str = "PLINTH_JWT_SECRET";

fn read_env_secret(path: &Path) -> Result<Option<String>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    for line in contents.lines() {
        if let Some(value) = line.trim().strip_prefix(ENV_SECRET_KEY) {
            if let Some(value) = value.trim_start().strip_prefix('=') {
                let value = value.trim();
                if !value.is_empty() {
                    return Ok(Some(value.to_string()));
                }
            }
        }
    }
    Ok(None)
}

fn append_env_secret(path: &Path, secret: &str) -> Result<()> {
    let mut contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(Error::Io(e)),
    };
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&format!("{ENV_SECRET_KEY}={secret}\n"));
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_random_string_is_alphanumeric() {
        let s = secure_random_string(64);
        assert_eq!(s.len(), 64);
        assert!(s.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(s, secure_random_string(64));
    }

    #[test]
    fn env_secret_round_trip() {
        let dir = std::env::temp_dir().join(format!("plinth-env-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(".env");
        let _ = std::fs::remove_file(&path);

        assert_eq!(read_env_secret(&path).unwrap(), None);
        append_env_secret(&path, "abc123").unwrap();
        assert_eq!(read_env_secret(&path).unwrap(), Some("abc123".into()));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn config_secret_wins() {
        let config = AppConfig::new(Connection::sqlite_in_memory())
            .auth(AuthConfig::enabled().secret("configured"));
        assert_eq!(config.resolve_jwt_secret().unwrap(), "configured");
    }

    #[test]
    fn default_role_lookup() {
        let auth = AuthConfig::enabled()
            .role(RoleConfig::new("admin").implicit_allow())
            .role(RoleConfig::new("default").permissions(["data.entity.read"]).is_default());
        assert_eq!(auth.default_role().unwrap().name, "default");
    }
}
