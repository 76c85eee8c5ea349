//! Store contract and its SQLite implementation.
//!
//! # Responsibility
//! - Own every SQL statement that touches the `contact`, `interaction` and
//!   `todo` tables.
//! - Turn persisted rows into entities through the same record decoder the
//!   interchange codec uses.
//!
//! # Invariants
//! - String columns are escaped on write and unescaped on read; values are
//!   always bound as statement parameters.
//! - Read paths reject invalid persisted rows instead of masking them.
//! - `update` on a missing row is `NotFound`; `delete` of a missing row is a
//!   no-op.
//!
//! # See also
//! - `crate::gateway` for the write-back cache built on top of [`Store`].

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::contact::Contact;
use crate::model::interaction::Interaction;
use crate::model::record::Record;
use crate::model::task::Task;
use crate::model::{Entity, EntityId, EntityKind, EntityRef};
use crate::sanitize::{escape_for_store, unescape_from_store};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure of one store operation.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Update targeted a row that does not exist.
    NotFound { kind: EntityKind, id: EntityId },
    /// Persisted row cannot be converted to a valid entity.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { kind, id } => {
                write!(f, "{} not found: {id}", kind.object_type())
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "store requires table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "store requires column `{column}` in table `{table}`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable storage for the three entity kinds.
///
/// Implementations perform I/O immediately; deferral lives in the gateway.
pub trait Store {
    /// Every contact, ordered by id. Sub-collections are left empty.
    fn list_contacts(&self) -> RepoResult<Vec<Contact>>;
    /// Interactions whose `owner_id` equals `owner_id` (`-1` for unowned).
    fn list_interactions(&self, owner_id: EntityId) -> RepoResult<Vec<Interaction>>;
    /// Tasks whose `owner_id` equals `owner_id` (`-1` for unowned).
    fn list_tasks(&self, owner_id: EntityId) -> RepoResult<Vec<Task>>;
    /// Inserts a new row and returns the id the store assigned.
    fn insert(&mut self, entity: EntityRef<'_>) -> RepoResult<EntityId>;
    fn update(&mut self, entity: EntityRef<'_>) -> RepoResult<()>;
    fn delete(&mut self, kind: EntityKind, id: EntityId) -> RepoResult<()>;
}

const CONTACT_COLUMNS: &[&str] = &[
    "first_name",
    "last_name",
    "company",
    "email",
    "phone",
    "creation_date",
    "note",
];
const INTERACTION_COLUMNS: &[&str] = &["owner_id", "type", "description", "date"];
const TASK_COLUMNS: &[&str] = &["owner_id", "description", "date"];

/// Non-id columns of the table backing `kind`, in bind order.
fn data_columns(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::Contact => CONTACT_COLUMNS,
        EntityKind::Interaction => INTERACTION_COLUMNS,
        EntityKind::Task => TASK_COLUMNS,
    }
}

/// SQLite-backed store over a migrated connection.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Wraps `conn` after checking it carries the expected schema.
    pub fn try_new(conn: Connection) -> RepoResult<Self> {
        ensure_store_connection_ready(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn list_entities<T: Entity>(&self, filter: Option<EntityId>) -> RepoResult<Vec<T>> {
        let kind = T::KIND;
        let table = kind.object_type();
        let mut sql = format!("SELECT id, {} FROM {table}", data_columns(kind).join(", "));
        let mut bind_values = Vec::new();
        if let Some(owner_id) = filter {
            sql.push_str(" WHERE owner_id = ?1");
            bind_values.push(Value::Integer(owner_id));
        }
        sql.push_str(" ORDER BY id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            let record = row_to_record(row, kind)?;
            let entity = T::from_record(&record).map_err(|err| {
                RepoError::InvalidData(format!("{table} row {}: {err}", record_id(&record)))
            })?;
            entities.push(entity);
        }
        Ok(entities)
    }
}

impl Store for SqliteStore {
    fn list_contacts(&self) -> RepoResult<Vec<Contact>> {
        self.list_entities(None)
    }

    fn list_interactions(&self, owner_id: EntityId) -> RepoResult<Vec<Interaction>> {
        self.list_entities(Some(owner_id))
    }

    fn list_tasks(&self, owner_id: EntityId) -> RepoResult<Vec<Task>> {
        self.list_entities(Some(owner_id))
    }

    fn insert(&mut self, entity: EntityRef<'_>) -> RepoResult<EntityId> {
        let columns = data_columns(entity.kind());
        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders});",
            entity.kind().object_type(),
            columns.join(", ")
        );
        self.conn.execute(&sql, params_from_iter(column_values(entity)))?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&mut self, entity: EntityRef<'_>) -> RepoResult<()> {
        let kind = entity.kind();
        let columns = data_columns(kind);
        let assignments = columns
            .iter()
            .enumerate()
            .map(|(index, column)| format!("{column} = ?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE id = ?{};",
            kind.object_type(),
            columns.len() + 1
        );

        let id = entity_id(entity);
        let mut values = column_values(entity);
        values.push(Value::Integer(id));

        let changed = self.conn.execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(RepoError::NotFound { kind, id });
        }
        Ok(())
    }

    fn delete(&mut self, kind: EntityKind, id: EntityId) -> RepoResult<()> {
        self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", kind.object_type()),
            [id],
        )?;
        Ok(())
    }
}

fn entity_id(entity: EntityRef<'_>) -> EntityId {
    match entity {
        EntityRef::Contact(contact) => contact.id(),
        EntityRef::Interaction(interaction) => interaction.id,
        EntityRef::Task(task) => task.id,
    }
}

fn column_values(entity: EntityRef<'_>) -> Vec<Value> {
    match entity {
        EntityRef::Contact(contact) => vec![
            text(contact.first_name()),
            text(contact.last_name()),
            text(contact.company()),
            text(contact.email()),
            text(contact.phone()),
            Value::Text(contact.creation_date().to_store_string()),
            text(contact.note()),
        ],
        EntityRef::Interaction(interaction) => vec![
            Value::Integer(interaction.owner_id),
            Value::Integer(interaction.kind.code()),
            text(&interaction.description),
            Value::Text(interaction.date.to_store_string()),
        ],
        EntityRef::Task(task) => vec![
            Value::Integer(task.owner_id),
            text(&task.description),
            Value::Text(task.date.to_store_string()),
        ],
    }
}

fn text(value: &str) -> Value {
    Value::Text(escape_for_store(value))
}

/// Reads the `id` column followed by the data columns into a record.
fn row_to_record(row: &Row<'_>, kind: EntityKind) -> RepoResult<Record> {
    let mut record = Record::new();
    for (index, column) in std::iter::once("id")
        .chain(data_columns(kind).iter().copied())
        .enumerate()
    {
        let value = match row.get_ref(index)? {
            ValueRef::Null => String::new(),
            ValueRef::Integer(value) => value.to_string(),
            ValueRef::Real(value) => value.to_string(),
            ValueRef::Text(bytes) => {
                let value = std::str::from_utf8(bytes).map_err(|_| {
                    RepoError::InvalidData(format!(
                        "non utf-8 text in {}.{column}",
                        kind.object_type()
                    ))
                })?;
                unescape_from_store(value)
            }
            ValueRef::Blob(_) => {
                return Err(RepoError::InvalidData(format!(
                    "unexpected blob in {}.{column}",
                    kind.object_type()
                )));
            }
        };
        record.insert(column.to_string(), value);
    }
    Ok(record)
}

fn record_id(record: &Record) -> &str {
    record.get("id").map_or("?", String::as_str)
}

fn ensure_store_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for kind in [EntityKind::Contact, EntityKind::Interaction, EntityKind::Task] {
        let table = kind.object_type();
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
        for column in std::iter::once(&"id").chain(data_columns(kind)) {
            if !table_has_column(conn, table, column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table,
                    column: *column,
                });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
