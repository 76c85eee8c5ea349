//! Interaction entity: a dated event in a contact's history.
//!
//! # Invariants
//! - Only the three audit kinds carry a stable code; every other code
//!   decodes to [`InteractionType::Unclassified`].
//! - `owner_id == -1` marks global entries (e.g. removal audits).

use super::date::Date;
use super::record::{Record, RecordError, RecordReader, OBJECT_TYPE_KEY};
use super::{Entity, EntityId, EntityKind, EntityRef, Owned, UNPERSISTED_ID};
use std::fmt::{Display, Formatter};

const REQUIRED_FIELDS: &[&str] = &["id", "owner_id", "type", "description", "date"];

/// Classification of an interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionType {
    ContactAdded,
    ContactRemoved,
    ContactEdited,
    /// Free-form entry or a code outside the known range.
    Unclassified,
}

impl InteractionType {
    /// Integer persisted in `interaction.type` and in interchange records.
    pub fn code(self) -> i64 {
        match self {
            Self::ContactAdded => 0,
            Self::ContactRemoved => 1,
            Self::ContactEdited => 2,
            Self::Unclassified => 4,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::ContactAdded,
            1 => Self::ContactRemoved,
            2 => Self::ContactEdited,
            _ => Self::Unclassified,
        }
    }
}

/// Dated history entry, optionally owned by a contact.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: EntityId,
    pub owner_id: EntityId,
    pub kind: InteractionType,
    pub description: String,
    pub date: Date,
}

impl Interaction {
    pub fn new(
        owner_id: EntityId,
        kind: InteractionType,
        description: impl Into<String>,
        date: Date,
    ) -> Self {
        Self {
            id: UNPERSISTED_ID,
            owner_id,
            kind,
            description: description.into(),
            date,
        }
    }
}

impl PartialEq for Interaction {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.description == other.description
    }
}

impl Entity for Interaction {
    const KIND: EntityKind = EntityKind::Interaction;

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn date(&self) -> Date {
        self.date
    }

    fn as_entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Interaction(self)
    }

    fn to_record(&self) -> Record {
        Record::from([
            (OBJECT_TYPE_KEY.to_string(), Self::KIND.object_type().to_string()),
            ("id".to_string(), self.id.to_string()),
            ("owner_id".to_string(), self.owner_id.to_string()),
            ("type".to_string(), self.kind.code().to_string()),
            ("description".to_string(), self.description.clone()),
            ("date".to_string(), self.date.to_store_string()),
        ])
    }

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        let reader = RecordReader::with_schema(record, REQUIRED_FIELDS)?;
        let date = reader.date("date")?;
        Ok(Self {
            id: reader.integer("id")?,
            owner_id: reader.integer("owner_id")?,
            kind: InteractionType::from_code(reader.integer("type")?),
            description: reader.text("description")?.to_string(),
            date,
        })
    }
}

impl Owned for Interaction {
    fn owner_id(&self) -> EntityId {
        self.owner_id
    }

    fn set_owner_id(&mut self, owner_id: EntityId) {
        self.owner_id = owner_id;
    }
}

impl Display for Interaction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Interaction<id: {}; ownerId: {}; type: {}; description: '{}'; date: {}>",
            self.id,
            self.owner_id,
            self.kind.code(),
            self.description,
            self.date
        )
    }
}
