//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use plinth_core::prelude::*;
//! ```

// === Runtime ===
pub use crate::app::{Api, App};
pub use crate::shared;

// === Configuration ===
pub use crate::config::{
    AdminOptions, AppConfig, AuthConfig, Connection, JwtConfig, RoleConfig, SyncOptions,
    secure_random_string,
};

// === Schema ===
pub use crate::schema::{boolean, entity, integer, json, real, text, timestamp, Schema};

// === Data ===
pub use crate::data::{ListQuery, Record};

// === Hypermedia ===
pub use crate::hypermedia::{escape, Patch, PatchMode, PatchStream, Signals};

// === Errors ===
pub use crate::error::{Error, Result};
