//! Declarative schema definitions.
//!
//! A [`Schema`] is a plain value describing the entities the runtime should
//! persist. You declare it once in your app config and the store derives
//! tables, indexes, and the CRUD surface from it:
//!
//! ```rust,ignore
//! use plinth_core::schema::{boolean, entity, text, Schema};
//!
//! let schema = Schema::new()
//!     .entity(
//!         entity("posts")
//!             .field(text("content").required())
//!             .field(text("url"))
//!             .index(["created_at"]),
//!     )
//!     .with_timestamps(&["posts"], true);
//! ```
//!
//! Entity and field names are the only identifiers ever spliced into SQL,
//! so they are restricted to `[a-z_][a-z0-9_]*` and checked by
//! [`Schema::validate`] before any statement runs.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::Value;

/// Storage type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Boolean,
    Integer,
    Real,
    Timestamp,
    Json,
}

impl FieldType {
    /// SQLite column type for CREATE TABLE / ALTER TABLE.
    pub(crate) fn sql_type(self) -> &'static str {
        match self {
            FieldType::Text | FieldType::Timestamp | FieldType::Json => "TEXT",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Integer => "INTEGER",
            FieldType::Real => "REAL",
        }
    }
}

/// A single declared field.
#[derive(Debug, Clone, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Field {
    fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type, required: false, default: None }
    }

    /// Reject create payloads that omit this field.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value used when a create payload omits this field.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

pub fn text(name: impl Into<String>) -> Field {
    Field::new(name, FieldType::Text)
}

pub fn boolean(name: impl Into<String>) -> Field {
    Field::new(name, FieldType::Boolean)
}

pub fn integer(name: impl Into<String>) -> Field {
    Field::new(name, FieldType::Integer)
}

pub fn real(name: impl Into<String>) -> Field {
    Field::new(name, FieldType::Real)
}

pub fn timestamp(name: impl Into<String>) -> Field {
    Field::new(name, FieldType::Timestamp)
}

pub fn json(name: impl Into<String>) -> Field {
    Field::new(name, FieldType::Json)
}

/// Timestamps plugin settings for one entity.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Timestamps {
    /// Also stamp `updated_at` when a record is created.
    pub set_updated_on_create: bool,
}

/// A named record type. `id` is implicit (`INTEGER PRIMARY KEY AUTOINCREMENT`).
#[derive(Debug, Clone, Serialize)]
pub struct Entity {
    pub name: String,
    pub fields: Vec<Field>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Timestamps>,
}

/// Start declaring an entity.
pub fn entity(name: impl Into<String>) -> Entity {
    Entity { name: name.into(), fields: Vec::new(), indexes: Vec::new(), timestamps: None }
}

impl Entity {
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare a secondary index over the given columns.
    pub fn index<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.indexes.push(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn get_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The full declarative schema: an ordered set of entities.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Schema {
    pub entities: Vec<Entity>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Apply the timestamps plugin to the named entities.
    ///
    /// Appends `created_at` and `updated_at` timestamp fields to each named
    /// entity before sync, so indexes declared on them resolve like any
    /// other column. The data API stamps `created_at` on create, refreshes
    /// `updated_at` on update, and also stamps `updated_at` on create when
    /// `set_updated_on_create` is true.
    pub fn with_timestamps(mut self, entities: &[&str], set_updated_on_create: bool) -> Self {
        for e in &mut self.entities {
            if entities.contains(&e.name.as_str()) {
                e.timestamps = Some(Timestamps { set_updated_on_create });
                if e.get_field("created_at").is_none() {
                    e.fields.push(Field::new("created_at", FieldType::Timestamp));
                }
                if e.get_field("updated_at").is_none() {
                    e.fields.push(Field::new("updated_at", FieldType::Timestamp));
                }
            }
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Check every identifier and index reference before SQL is generated.
    pub fn validate(&self) -> Result<()> {
        let mut seen = Vec::new();
        for e in &self.entities {
            validate_ident(&e.name)?;
            if e.name == "users" {
                return Err(Error::Config("entity name \"users\" is reserved".into()));
            }
            if seen.contains(&&e.name) {
                return Err(Error::Config(format!("duplicate entity \"{}\"", e.name)));
            }
            seen.push(&e.name);

            let mut field_names = Vec::new();
            for f in &e.fields {
                validate_ident(&f.name)?;
                if f.name == "id" {
                    return Err(Error::Config(format!(
                        "field \"id\" on \"{}\" is implicit and cannot be declared",
                        e.name
                    )));
                }
                if field_names.contains(&&f.name) {
                    return Err(Error::Config(format!(
                        "duplicate field \"{}\" on \"{}\"",
                        f.name, e.name
                    )));
                }
                field_names.push(&f.name);
            }

            for idx in &e.indexes {
                for col in idx {
                    if col != "id" && e.get_field(col).is_none() {
                        return Err(Error::Config(format!(
                            "index column \"{}\" not found on entity \"{}\"",
                            col, e.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Identifier rule for everything that ends up in a SQL statement.
pub(crate) fn validate_ident(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let ok = match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {
            chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Config(format!("invalid identifier \"{name}\"")))
    }
}
