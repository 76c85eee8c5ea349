//! Domain model for contacts, their history and their tasks.
//!
//! # Responsibility
//! - Define the three entity kinds and the shared `Date` value.
//! - Define the record shape used for import/export and entity construction.
//!
//! # Invariants
//! - Every entity is born with id `-1` and receives its durable id from the
//!   persistence gateway on first insert.
//! - `owner_id == -1` marks an unowned interaction or task.

pub mod contact;
pub mod date;
pub mod interaction;
pub mod record;
pub mod task;

use contact::Contact;
use date::Date;
use interaction::Interaction;
use record::{Record, RecordError};
use task::Task;

/// Store-assigned integer identity.
pub type EntityId = i64;

/// Id carried by entities that were never inserted.
pub const UNPERSISTED_ID: EntityId = -1;

/// Owner id of interactions/tasks not linked to any contact.
pub const NO_OWNER: EntityId = -1;

/// Discriminates the three entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Contact,
    Interaction,
    Task,
}

impl EntityKind {
    /// Value of the `object_type` record key; also the SQL table name.
    pub fn object_type(self) -> &'static str {
        match self {
            Self::Contact => "contact",
            Self::Interaction => "interaction",
            Self::Task => "todo",
        }
    }

    pub fn from_object_type(value: &str) -> Option<Self> {
        match value {
            "contact" => Some(Self::Contact),
            "interaction" => Some(Self::Interaction),
            "todo" => Some(Self::Task),
            _ => None,
        }
    }
}

/// Borrowed view of any entity, used where the kind is only known at runtime.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Contact(&'a Contact),
    Interaction(&'a Interaction),
    Task(&'a Task),
}

impl EntityRef<'_> {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Contact(_) => EntityKind::Contact,
            Self::Interaction(_) => EntityKind::Interaction,
            Self::Task(_) => EntityKind::Task,
        }
    }
}

/// Behavior shared by contacts, interactions and tasks.
pub trait Entity: Clone + PartialEq {
    const KIND: EntityKind;

    fn id(&self) -> EntityId;
    fn set_id(&mut self, id: EntityId);
    /// Date used by range queries and date sorting.
    fn date(&self) -> Date;
    fn as_entity_ref(&self) -> EntityRef<'_>;
    fn to_record(&self) -> Record;
    /// Decodes a record, rejecting missing keys and malformed values.
    fn from_record(record: &Record) -> Result<Self, RecordError>;
}

/// Entities linked to a contact through `owner_id`.
pub trait Owned: Entity {
    fn owner_id(&self) -> EntityId;
    fn set_owner_id(&mut self, owner_id: EntityId);
}
