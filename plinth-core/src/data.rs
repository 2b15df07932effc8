//! SQLite-backed storage: connection, schema sync, and the CRUD data API.
//!
//! Records are dynamic — `serde_json` maps keyed by column name — because
//! the schema is a runtime value, not a compile-time type. Identifiers that
//! reach SQL are validated by the schema module; every payload value is
//! bound, never interpolated.

use crate::auth::{AuthContext, Guard};
use crate::config::{Connection, SyncOptions};
use crate::error::{Error, Result};
use crate::schema::{Entity, Field, FieldType, Schema};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::sync::Arc;
use std::time::Duration;

/// One stored row as a JSON object. `id` is always present.
pub type Record = Map<String, Value>;

/// Pool plus the schema it was synced against.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    schema: Arc<Schema>,
}

impl Store {
    pub async fn connect(connection: &Connection, schema: Arc<Schema>) -> Result<Self> {
        let pool = match connection {
            // A pooled in-memory database needs exactly one connection:
            // every connection would otherwise get its own empty database.
            Connection::Memory => SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(SqliteConnectOptions::new().in_memory(true))
                .await?,
            Connection::File(path) => SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(SqliteConnectOptions::new().filename(path).create_if_missing(true))
                .await?,
        };
        Ok(Self { pool, schema })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Bring the database in line with the schema.
    ///
    /// Returns true when the database was freshly initialized (any managed
    /// table had to be created), which gates seeding.
    pub async fn sync(&self, opts: &SyncOptions, auth_enabled: bool) -> Result<bool> {
        self.schema.validate()?;
        let mut fresh = false;

        if opts.drop {
            for entity in &self.schema.entities {
                sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", entity.name))
                    .execute(&self.pool)
                    .await?;
            }
            if auth_enabled {
                sqlx::query("DROP TABLE IF EXISTS \"users\"").execute(&self.pool).await?;
            }
        }

        for entity in &self.schema.entities {
            if !self.table_exists(&entity.name).await? {
                fresh = true;
                sqlx::query(&create_table_sql(entity)).execute(&self.pool).await?;
            } else if opts.force {
                self.apply_additive_columns(entity).await?;
            }

            for (i, columns) in entity.indexes.iter().enumerate() {
                let name = format!("idx_{}_{}", entity.name, i);
                let cols: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
                let sql = format!(
                    "CREATE INDEX IF NOT EXISTS \"{name}\" ON \"{}\" ({})",
                    entity.name,
                    cols.join(", ")
                );
                sqlx::query(&sql).execute(&self.pool).await?;
            }
        }

        if auth_enabled && !self.table_exists("users").await? {
            fresh = true;
            sqlx::query(
                "CREATE TABLE \"users\" (\
                 \"id\" INTEGER PRIMARY KEY AUTOINCREMENT, \
                 \"email\" TEXT NOT NULL UNIQUE, \
                 \"password_hash\" TEXT NOT NULL, \
                 \"role\" TEXT NOT NULL, \
                 \"created_at\" TEXT NOT NULL)",
            )
            .execute(&self.pool)
            .await?;
        }

        log::info!(
            "schema sync complete ({} entities{})",
            self.schema.entities.len(),
            if fresh { ", fresh database" } else { "" }
        );
        Ok(fresh)
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// `force` sync: add columns the schema has but the table does not.
    async fn apply_additive_columns(&self, entity: &Entity) -> Result<()> {
        let rows = sqlx::query(&format!("PRAGMA table_info(\"{}\")", entity.name))
            .fetch_all(&self.pool)
            .await?;
        let existing: Vec<String> =
            rows.iter().filter_map(|r| r.try_get::<String, _>("name").ok()).collect();

        for field in &entity.fields {
            if !existing.contains(&field.name) {
                let sql = format!(
                    "ALTER TABLE \"{}\" ADD COLUMN \"{}\" {}",
                    entity.name,
                    field.name,
                    field.field_type.sql_type()
                );
                log::info!("adding column {}.{}", entity.name, field.name);
                sqlx::query(&sql).execute(&self.pool).await?;
            }
        }
        Ok(())
    }

    fn entity(&self, name: &str) -> Result<&Entity> {
        self.schema.get(name).ok_or_else(|| Error::NotFound(format!("Unknown entity \"{name}\"")))
    }
}

fn create_table_sql(entity: &Entity) -> String {
    let mut cols = vec!["\"id\" INTEGER PRIMARY KEY AUTOINCREMENT".to_string()];
    for f in &entity.fields {
        let not_null = if f.required { " NOT NULL" } else { "" };
        cols.push(format!("\"{}\" {}{}", f.name, f.field_type.sql_type(), not_null));
    }
    format!("CREATE TABLE \"{}\" ({})", entity.name, cols.join(", "))
}

/// Sort direction parsed from a `sort` parameter (`"created_at"` ascending,
/// `"-created_at"` descending).
#[derive(Debug, Clone)]
struct Sort {
    column: String,
    descending: bool,
}

impl Sort {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(col) => Self { column: col.to_string(), descending: true },
            None => Self { column: raw.to_string(), descending: false },
        }
    }
}

/// List parameters for [`DataApi::read_many`]. Deserializes from query
/// strings (`?limit=10&sort=-created_at`) and builds fluently in code.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub sort: Option<String>,
    #[serde(skip)]
    pub filter: Vec<(String, Value)>,
}

impl ListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// `"column"` for ascending, `"-column"` for descending.
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn filter_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.push((column.into(), value.into()));
        self
    }
}

/// Guarded CRUD over the configured entities.
pub struct DataApi<'a> {
    store: &'a Store,
    guard: &'a Guard,
    ctx: &'a AuthContext,
}

impl<'a> DataApi<'a> {
    pub(crate) fn new(store: &'a Store, guard: &'a Guard, ctx: &'a AuthContext) -> Self {
        Self { store, guard, ctx }
    }

    fn require(&self, permission: &str) -> Result<()> {
        self.ctx.authorize(self.guard, permission)
    }

    pub async fn read_many(&self, entity: &str, query: &ListQuery) -> Result<Vec<Record>> {
        self.require("data.entity.read")?;
        let entity = self.store.entity(entity)?;

        let mut sql = format!("SELECT * FROM \"{}\"", entity.name);
        let mut binds: Vec<(FieldType, Value)> = Vec::new();

        if !query.filter.is_empty() {
            let mut clauses = Vec::new();
            for (column, value) in &query.filter {
                let ftype = column_type(entity, column)?;
                clauses.push(format!("\"{column}\" = ?"));
                binds.push((ftype, value.clone()));
            }
            sql.push_str(&format!(" WHERE {}", clauses.join(" AND ")));
        }

        if let Some(raw) = &query.sort {
            let sort = Sort::parse(raw);
            column_type(entity, &sort.column)?;
            sql.push_str(&format!(
                " ORDER BY \"{}\" {}",
                sort.column,
                if sort.descending { "DESC" } else { "ASC" }
            ));
        }

        match (query.limit, query.offset) {
            (Some(limit), Some(offset)) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
            (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
            (None, None) => {}
        }

        let mut q = sqlx::query(&sql);
        for (ftype, value) in &binds {
            q = bind_value(q, *ftype, value);
        }
        let rows = q.fetch_all(self.store.pool()).await?;
        rows.iter().map(|row| record_from_row(entity, row)).collect()
    }

    pub async fn read_one(&self, entity: &str, id: i64) -> Result<Record> {
        self.require("data.entity.read")?;
        let entity = self.store.entity(entity)?;
        self.fetch_by_id(entity, id).await
    }

    pub async fn create_one(&self, entity: &str, payload: Value) -> Result<Record> {
        self.require("data.entity.create")?;
        let entity = self.store.entity(entity)?;
        let payload = as_object(payload)?;
        reject_unknown_fields(entity, &payload)?;

        let mut columns = Vec::new();
        let mut values: Vec<(FieldType, Value)> = Vec::new();
        for field in &entity.fields {
            let value = match payload.get(&field.name) {
                Some(v) => {
                    validate_value(field, v)?;
                    v.clone()
                }
                None => match &field.default {
                    Some(default) => default.clone(),
                    None if field.required => {
                        return Err(Error::BadRequest(format!(
                            "Missing required field \"{}\"",
                            field.name
                        )));
                    }
                    None => Value::Null,
                },
            };
            columns.push(field.name.clone());
            values.push((field.field_type, value));
        }

        if let Some(ts) = entity.timestamps {
            let now = now_timestamp();
            set_column(&mut columns, &mut values, "created_at", json!(now));
            if ts.set_updated_on_create {
                set_column(&mut columns, &mut values, "updated_at", json!(now));
            }
        }

        let quoted: Vec<String> = columns.iter().map(|c| format!("\"{c}\"")).collect();
        let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            entity.name,
            quoted.join(", "),
            placeholders.join(", ")
        );

        let mut q = sqlx::query(&sql);
        for (ftype, value) in &values {
            q = bind_value(q, *ftype, value);
        }
        let result = q.execute(self.store.pool()).await?;
        self.fetch_by_id(entity, result.last_insert_rowid()).await
    }

    pub async fn update_one(&self, entity: &str, id: i64, payload: Value) -> Result<Record> {
        self.require("data.entity.update")?;
        let entity = self.store.entity(entity)?;
        let payload = as_object(payload)?;
        reject_unknown_fields(entity, &payload)?;

        let mut assignments = Vec::new();
        let mut values: Vec<(FieldType, Value)> = Vec::new();
        for field in &entity.fields {
            if let Some(value) = payload.get(&field.name) {
                validate_value(field, value)?;
                assignments.push(format!("\"{}\" = ?", field.name));
                values.push((field.field_type, value.clone()));
            }
        }
        if entity.timestamps.is_some() && !payload.contains_key("updated_at") {
            assignments.push("\"updated_at\" = ?".to_string());
            values.push((FieldType::Timestamp, json!(now_timestamp())));
        }
        if assignments.is_empty() {
            return Err(Error::BadRequest("Empty update payload".into()));
        }

        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE \"id\" = ?",
            entity.name,
            assignments.join(", ")
        );
        let mut q = sqlx::query(&sql);
        for (ftype, value) in &values {
            q = bind_value(q, *ftype, value);
        }
        let result = q.bind(id).execute(self.store.pool()).await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("No {} with id {id}", entity.name)));
        }
        self.fetch_by_id(entity, id).await
    }

    pub async fn delete_one(&self, entity: &str, id: i64) -> Result<()> {
        self.require("data.entity.delete")?;
        let entity = self.store.entity(entity)?;
        let sql = format!("DELETE FROM \"{}\" WHERE \"id\" = ?", entity.name);
        let result = sqlx::query(&sql).bind(id).execute(self.store.pool()).await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("No {} with id {id}", entity.name)));
        }
        Ok(())
    }

    pub async fn count(&self, entity: &str) -> Result<i64> {
        self.require("data.entity.read")?;
        let entity = self.store.entity(entity)?;
        let sql = format!("SELECT COUNT(*) FROM \"{}\"", entity.name);
        let row = sqlx::query(&sql).fetch_one(self.store.pool()).await?;
        Ok(row.try_get(0)?)
    }

    async fn fetch_by_id(&self, entity: &Entity, id: i64) -> Result<Record> {
        let sql = format!("SELECT * FROM \"{}\" WHERE \"id\" = ?", entity.name);
        let row = sqlx::query(&sql).bind(id).fetch_optional(self.store.pool()).await?;
        match row {
            Some(row) => record_from_row(entity, &row),
            None => Err(Error::NotFound(format!("No {} with id {id}", entity.name))),
        }
    }
}

pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn set_column(columns: &mut Vec<String>, values: &mut Vec<(FieldType, Value)>, name: &str, value: Value) {
    match columns.iter().position(|c| c == name) {
        Some(i) => values[i] = (FieldType::Timestamp, value),
        None => {
            columns.push(name.to_string());
            values.push((FieldType::Timestamp, value));
        }
    }
}

fn as_object(payload: Value) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(Error::BadRequest("Payload must be a JSON object".into())),
    }
}

fn reject_unknown_fields(entity: &Entity, payload: &Map<String, Value>) -> Result<()> {
    for key in payload.keys() {
        if key == "id" {
            return Err(Error::BadRequest("Field \"id\" is server-assigned".into()));
        }
        if entity.get_field(key).is_none() {
            return Err(Error::BadRequest(format!(
                "Unknown field \"{key}\" on entity \"{}\"",
                entity.name
            )));
        }
    }
    Ok(())
}

fn column_type(entity: &Entity, column: &str) -> Result<FieldType> {
    if column == "id" {
        return Ok(FieldType::Integer);
    }
    entity
        .get_field(column)
        .map(|f| f.field_type)
        .ok_or_else(|| Error::BadRequest(format!(
            "Unknown column \"{column}\" on entity \"{}\"",
            entity.name
        )))
}

fn validate_value(field: &Field, value: &Value) -> Result<()> {
    if value.is_null() {
        if field.required {
            return Err(Error::BadRequest(format!(
                "Field \"{}\" is required and cannot be null",
                field.name
            )));
        }
        return Ok(());
    }
    let ok = match field.field_type {
        FieldType::Text | FieldType::Timestamp => value.is_string(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Integer => value.is_i64(),
        FieldType::Real => value.is_number(),
        FieldType::Json => true,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::BadRequest(format!(
            "Field \"{}\" expects {:?}",
            field.name, field.field_type
        )))
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_value<'q>(q: SqliteQuery<'q>, ftype: FieldType, value: &Value) -> SqliteQuery<'q> {
    match ftype {
        FieldType::Text | FieldType::Timestamp => q.bind(value.as_str().map(str::to_string)),
        FieldType::Boolean => q.bind(value.as_bool()),
        FieldType::Integer => q.bind(value.as_i64()),
        FieldType::Real => q.bind(value.as_f64()),
        FieldType::Json => {
            q.bind(if value.is_null() { None } else { Some(value.to_string()) })
        }
    }
}

fn record_from_row(entity: &Entity, row: &SqliteRow) -> Result<Record> {
    let mut record = Record::new();
    let id: i64 = row.try_get("id")?;
    record.insert("id".into(), json!(id));

    for field in &entity.fields {
        let name = field.name.as_str();
        let value = match field.field_type {
            FieldType::Text | FieldType::Timestamp => {
                row.try_get::<Option<String>, _>(name)?.map(Value::String).unwrap_or(Value::Null)
            }
            FieldType::Boolean => {
                row.try_get::<Option<bool>, _>(name)?.map(Value::Bool).unwrap_or(Value::Null)
            }
            FieldType::Integer => {
                row.try_get::<Option<i64>, _>(name)?.map(|n| json!(n)).unwrap_or(Value::Null)
            }
            FieldType::Real => {
                row.try_get::<Option<f64>, _>(name)?.map(|n| json!(n)).unwrap_or(Value::Null)
            }
            FieldType::Json => match row.try_get::<Option<String>, _>(name)? {
                Some(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
                None => Value::Null,
            },
        };
        record.insert(field.name.clone(), value);
    }
    Ok(record)
}
