//! Task entity: something to do for a contact, either dated or urgent.

use super::date::Date;
use super::record::{Record, RecordError, RecordReader, OBJECT_TYPE_KEY};
use super::{Entity, EntityId, EntityKind, EntityRef, Owned, UNPERSISTED_ID};
use std::fmt::{Display, Formatter};

const REQUIRED_FIELDS: &[&str] = &["id", "owner_id", "description", "date"];

/// Scheduled or urgent piece of work owned by a contact.
///
/// A task whose `date` equals [`Date::urgent`] has no due date and is
/// treated as urgent.
#[derive(Debug, Clone)]
pub struct Task {
    /// `-1` until the store assigns an id.
    pub id: EntityId,
    /// Owning contact, `-1` when unowned.
    pub owner_id: EntityId,
    pub description: String,
    pub date: Date,
}

impl Task {
    pub fn new(owner_id: EntityId, description: impl Into<String>, date: Date) -> Self {
        Self {
            id: UNPERSISTED_ID,
            owner_id,
            description: description.into(),
            date,
        }
    }

    /// Creates a task without a due date.
    pub fn urgent(owner_id: EntityId, description: impl Into<String>) -> Self {
        Self::new(owner_id, description, Date::urgent())
    }

    pub fn is_urgent(&self) -> bool {
        self.date.is_urgent()
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.description == other.description
    }
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

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
        EntityRef::Task(self)
    }

    fn to_record(&self) -> Record {
        Record::from([
            (OBJECT_TYPE_KEY.to_string(), Self::KIND.object_type().to_string()),
            ("id".to_string(), self.id.to_string()),
            ("owner_id".to_string(), self.owner_id.to_string()),
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
            description: reader.text("description")?.to_string(),
            date,
        })
    }
}

impl Owned for Task {
    fn owner_id(&self) -> EntityId {
        self.owner_id
    }

    fn set_owner_id(&mut self, owner_id: EntityId) {
        self.owner_id = owner_id;
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Task<id: {}; ownerId: {}; description: '{}'; date: {}>",
            self.id, self.owner_id, self.description, self.date
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Task;
    use crate::model::date::Date;
    use crate::model::record::RecordError;
    use crate::model::Entity;

    #[test]
    fn equality_ignores_owner_and_date() {
        let mut left = Task::urgent(4, "call back");
        let mut right = Task::new(9, "call back", Date::from_ymd(2024, 5, 1).unwrap());
        assert_eq!(left, right);
        left.id = 1;
        right.id = 2;
        assert_ne!(left, right);
    }

    #[test]
    fn record_roundtrip_keeps_all_fields() {
        let mut task = Task::new(7, "Send quote", Date::from_ymd(2024, 6, 30).unwrap());
        task.id = 42;
        let record = task.to_record();
        assert_eq!(record["object_type"], "todo");
        assert_eq!(record["date"], "2024-06-30");

        let decoded = Task::from_record(&record).unwrap();
        assert_eq!(decoded, task);
        assert_eq!(decoded.owner_id, 7);
        assert_eq!(decoded.date, task.date);
    }

    #[test]
    fn record_without_description_is_rejected() {
        let mut record = Task::urgent(1, "x").to_record();
        record.remove("description");
        assert_eq!(
            Task::from_record(&record).unwrap_err(),
            RecordError::MissingField("description")
        );
    }

    #[test]
    fn urgent_task_survives_record_roundtrip() {
        let task = Task::urgent(3, "asap");
        let decoded = Task::from_record(&task.to_record()).unwrap();
        assert!(decoded.is_urgent());
    }
}
