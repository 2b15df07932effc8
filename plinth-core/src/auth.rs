//! Password + JWT authentication and the role-permission guard.
//!
//! Users live in a system `users` table created during sync (never part of
//! the declarative schema). Passwords are argon2-hashed; sessions are HS256
//! JWTs carried in the `Authorization` header or the `auth` cookie. The
//! guard answers permission checks from the configured roles: an
//! `implicit_allow` role passes everything, any other role passes only the
//! permissions it lists, and a disabled guard passes all checks.

use crate::config::AuthConfig;
use crate::data::{now_timestamp, Store};
use crate::error::{Error, Result};
use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum::http::{header, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::Row;
use std::collections::HashMap;

/// An authenticated user, as carried in token claims.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    role: String,
    iss: String,
    iat: usize,
    exp: usize,
}

const TOKEN_TTL_DAYS: i64 = 7;

/// Role-permission lookup compiled from the auth config.
///
/// Anonymous requests fall back to the `is_default` role, so a public page
/// works exactly like a visitor who registered and never got promoted.
pub struct Guard {
    enabled: bool,
    roles: HashMap<String, (bool, Vec<String>)>,
    default_role: Option<String>,
}

impl Guard {
    pub(crate) fn from_config(config: &AuthConfig) -> Self {
        Self {
            enabled: config.enabled && config.guard_enabled,
            roles: config
                .roles
                .iter()
                .map(|r| (r.name.clone(), (r.implicit_allow, r.permissions.clone())))
                .collect(),
            default_role: config.roles.iter().find(|r| r.is_default).map(|r| r.name.clone()),
        }
    }

    pub fn allows(&self, role: Option<&str>, permission: &str) -> bool {
        if !self.enabled {
            return true;
        }
        let Some(role) = role.or(self.default_role.as_deref()) else { return false };
        match self.roles.get(role) {
            Some((true, _)) => true,
            Some((false, permissions)) => permissions.iter().any(|p| p == permission),
            None => false,
        }
    }

    fn role_is_implicit_allow(&self, role: &str) -> bool {
        matches!(self.roles.get(role), Some((true, _)))
    }
}

/// Request-scoped identity, resolved once from headers.
#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    pub user: Option<AuthUser>,
    system: bool,
}

impl AuthContext {
    pub(crate) fn anonymous() -> Self {
        Self::default()
    }

    /// Bypasses the guard entirely. Seeds and internal machinery only.
    pub(crate) fn system() -> Self {
        Self { user: None, system: true }
    }

    pub(crate) fn with_user(user: AuthUser) -> Self {
        Self { user: Some(user), system: false }
    }

    pub fn is_system(&self) -> bool {
        self.system
    }

    pub(crate) fn authorize(&self, guard: &Guard, permission: &str) -> Result<()> {
        if self.system {
            return Ok(());
        }
        let role = self.user.as_ref().map(|u| u.role.as_str());
        if guard.allows(role, permission) {
            Ok(())
        } else if self.user.is_none() {
            Err(Error::Unauthorized)
        } else {
            Err(Error::Forbidden(format!("Missing permission \"{permission}\"")))
        }
    }
}

/// Token signing/verification plus header resolution.
pub struct AuthRuntime {
    config: AuthConfig,
    guard: Guard,
    secret: String,
}

impl AuthRuntime {
    pub(crate) fn new(config: AuthConfig, secret: String) -> Self {
        let guard = Guard::from_config(&config);
        Self { config, guard, secret }
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    pub(crate) fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Resolve the request identity from `Authorization: Bearer` or the
    /// `auth` cookie. Invalid or absent tokens resolve to anonymous; the
    /// guard rejects later if the route needs more.
    pub(crate) fn context_from_headers(&self, headers: &HeaderMap) -> AuthContext {
        if !self.config.enabled {
            return AuthContext::anonymous();
        }
        let token = match bearer_token(headers) {
            Some(t) => Some(t.to_string()),
            None => cookie_token(headers),
        };
        match token {
            Some(token) => match self.verify(&token) {
                Ok(user) => AuthContext::with_user(user),
                Err(e) => {
                    log::debug!("request token rejected: {e}");
                    AuthContext::anonymous()
                }
            },
            None => AuthContext::anonymous(),
        }
    }

    pub(crate) fn sign(&self, user: &AuthUser) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role.clone(),
            iss: self.config.jwt.issuer.clone(),
            iat: now.timestamp() as usize,
            exp: (now + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(self.secret.as_bytes()))?)
    }

    pub fn verify(&self, token: &str) -> Result<AuthUser> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.jwt.issuer]);
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )?;
        let id = data.claims.sub.parse().map_err(|_| Error::Unauthorized)?;
        Ok(AuthUser { id, email: data.claims.email, role: data.claims.role })
    }
}

/// Login/register response body.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub user: AuthUser,
    pub token: String,
}

/// Guarded auth operations.
pub struct AuthApi<'a> {
    store: &'a Store,
    runtime: &'a AuthRuntime,
    ctx: &'a AuthContext,
}

impl<'a> AuthApi<'a> {
    pub(crate) fn new(store: &'a Store, runtime: &'a AuthRuntime, ctx: &'a AuthContext) -> Self {
        Self { store, runtime, ctx }
    }

    /// Create a user with an explicit role. Reserved for seeds and
    /// implicit-allow roles; regular users go through [`Self::register`].
    pub async fn create_user(&self, email: &str, password: &str, role: &str) -> Result<AuthUser> {
        let allowed = self.ctx.is_system()
            || self
                .ctx
                .user
                .as_ref()
                .is_some_and(|u| self.runtime.guard.role_is_implicit_allow(&u.role));
        if !allowed {
            return Err(Error::Forbidden("User creation requires an admin role".into()));
        }
        self.insert_user(email, password, role).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenResponse> {
        let row = sqlx::query("SELECT id, email, password_hash, role FROM \"users\" WHERE email = ?")
            .bind(email)
            .fetch_optional(self.store.pool())
            .await?;
        let Some(row) = row else { return Err(Error::Unauthorized) };
        let stored: String = row.try_get("password_hash")?;
        if !verify_password(password, &stored) {
            return Err(Error::Unauthorized);
        }
        let user = AuthUser {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            role: row.try_get("role")?,
        };
        let token = self.runtime.sign(&user)?;
        log::info!("user {} logged in", user.email);
        Ok(TokenResponse { user, token })
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<TokenResponse> {
        if !self.runtime.config.allow_register {
            return Err(Error::Forbidden("Registration is disabled".into()));
        }
        let role = self
            .runtime
            .config
            .default_role()
            .map(|r| r.name.clone())
            .unwrap_or_else(|| "default".to_string());
        let user = self.insert_user(email, password, &role).await?;
        let token = self.runtime.sign(&user)?;
        log::info!("user {} registered with role {}", user.email, user.role);
        Ok(TokenResponse { user, token })
    }

    async fn insert_user(&self, email: &str, password: &str, role: &str) -> Result<AuthUser> {
        if email.is_empty() || !email.contains('@') {
            return Err(Error::BadRequest("Invalid email address".into()));
        }
        if password.len() < 8 {
            return Err(Error::BadRequest("Password must be at least 8 characters".into()));
        }
        let hash = hash_password(password)?;
        let result = sqlx::query(
            "INSERT INTO \"users\" (email, password_hash, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind(&hash)
        .bind(role)
        .bind(now_timestamp())
        .execute(self.store.pool())
        .await;

        match result {
            Ok(done) => Ok(AuthUser {
                id: done.last_insert_rowid(),
                email: email.to_string(),
                role: role.to_string(),
            }),
            Err(e) if is_unique_violation(&e) => {
                Err(Error::Conflict(format!("User \"{email}\" already exists")))
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| Error::Internal(anyhow::anyhow!("password hashing failed: {e}")))
}

fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

fn cookie_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|kv| kv.trim().strip_prefix("auth=")).map(str::to_string)
}

/// Session cookie attributes used by the auth routes.
pub(crate) fn auth_cookie(token: &str) -> String {
    format!("auth={token}; Path=/; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoleConfig;

    fn roles_config() -> AuthConfig {
        AuthConfig::enabled()
            .role(RoleConfig::new("admin").implicit_allow())
            .role(RoleConfig::new("default").permissions(["data.entity.read"]).is_default())
    }

    #[test]
    fn guard_matrix() {
        let guard = Guard::from_config(&roles_config());
        assert!(guard.allows(Some("admin"), "anything.at.all"));
        assert!(guard.allows(Some("default"), "data.entity.read"));
        assert!(!guard.allows(Some("default"), "data.entity.delete"));
        assert!(!guard.allows(Some("ghost"), "data.entity.read"));
        // anonymous falls back to the default role
        assert!(guard.allows(None, "data.entity.read"));
        assert!(!guard.allows(None, "data.entity.delete"));
    }

    #[test]
    fn anonymous_without_default_role_is_denied() {
        let guard = Guard::from_config(
            &AuthConfig::enabled().role(RoleConfig::new("admin").implicit_allow()),
        );
        assert!(!guard.allows(None, "data.entity.read"));
    }

    #[test]
    fn disabled_guard_allows_everything() {
        let guard = Guard::from_config(&roles_config().guard(false));
        assert!(guard.allows(None, "data.entity.delete"));
    }

    #[test]
    fn token_round_trip() {
        let runtime = AuthRuntime::new(roles_config().issuer("test-issuer"), "secret".into());
        let user = AuthUser { id: 42, email: "a@b.c".into(), role: "default".into() };
        let token = runtime.sign(&user).unwrap();
        let back = runtime.verify(&token).unwrap();
        assert_eq!(back.id, 42);
        assert_eq!(back.email, "a@b.c");
        assert_eq!(back.role, "default");
    }

    #[test]
    fn wrong_issuer_rejected() {
        let signer = AuthRuntime::new(roles_config().issuer("one"), "secret".into());
        let verifier = AuthRuntime::new(roles_config().issuer("two"), "secret".into());
        let user = AuthUser { id: 1, email: "a@b.c".into(), role: "default".into() };
        let token = signer.sign(&user).unwrap();
        assert!(verifier.verify(&token).is_err());
    }

    #[test]
    fn header_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc.def.ghi".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; auth=tok123; lang=en".parse().unwrap());
        assert_eq!(cookie_token(&headers), Some("tok123".into()));
        assert_eq!(bearer_token(&headers), None);
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong", &hash));
        assert!(!verify_password("correct horse", "not-a-hash"));
    }

    #[test]
    fn system_context_bypasses_guard() {
        let guard = Guard::from_config(&roles_config());
        assert!(AuthContext::system().authorize(&guard, "data.entity.delete").is_ok());
        assert!(matches!(
            AuthContext::anonymous().authorize(&guard, "data.entity.delete"),
            Err(Error::Unauthorized)
        ));
    }
}
