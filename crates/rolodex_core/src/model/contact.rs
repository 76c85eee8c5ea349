//! Contact entity and its owned interaction/task sub-collections.
//!
//! # Responsibility
//! - Hold identity and profile fields of one person.
//! - Keep the contact's own view of its interactions and tasks.
//!
//! # Invariants
//! - First name, last name and company start with an upper-case character
//!   whenever they are assigned through setters.
//! - Two contacts are equal iff their ids and full names match.
//! - Children added through [`Contact::add_interaction`] and
//!   [`Contact::add_task`] are re-owned by this contact.

use super::date::Date;
use super::interaction::Interaction;
use super::record::{Record, RecordError, RecordReader, OBJECT_TYPE_KEY};
use super::task::Task;
use super::{Entity, EntityId, EntityKind, EntityRef, UNPERSISTED_ID};
use crate::collection::EntityCollection;
use std::fmt::{Display, Formatter};

const REQUIRED_FIELDS: &[&str] = &[
    "id",
    "first_name",
    "last_name",
    "company",
    "phone",
    "email",
    "creation_date",
    "note",
];

/// Person tracked by the address book.
#[derive(Debug, Clone)]
pub struct Contact {
    id: EntityId,
    first_name: String,
    last_name: String,
    company: String,
    email: String,
    phone: String,
    note: String,
    creation_date: Date,
    interactions: EntityCollection<Interaction>,
    tasks: EntityCollection<Task>,
}

impl Contact {
    /// Creates an unpersisted contact stamped with the current time.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let mut contact = Self {
            id: UNPERSISTED_ID,
            first_name: String::new(),
            last_name: String::new(),
            company: String::new(),
            email: String::new(),
            phone: String::new(),
            note: String::new(),
            creation_date: Date::now(),
            interactions: EntityCollection::new(),
            tasks: EntityCollection::new(),
        };
        contact.set_first_name(first_name);
        contact.set_last_name(last_name);
        contact
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn set_first_name(&mut self, value: impl Into<String>) {
        self.first_name = capitalize(value.into());
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn set_last_name(&mut self, value: impl Into<String>) {
        self.last_name = capitalize(value.into());
    }

    /// `"<last> <first>"`, the key used for equality and name sorting.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn set_company(&mut self, value: impl Into<String>) {
        self.company = capitalize(value.into());
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, value: impl Into<String>) {
        self.email = value.into();
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    pub fn set_phone(&mut self, value: impl Into<String>) {
        self.phone = value.into();
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn set_note(&mut self, value: impl Into<String>) {
        self.note = value.into();
    }

    pub fn creation_date(&self) -> Date {
        self.creation_date
    }

    pub fn set_creation_date(&mut self, date: Date) {
        self.creation_date = date;
    }

    pub fn interactions(&self) -> &EntityCollection<Interaction> {
        &self.interactions
    }

    pub fn interaction(&self, id: EntityId) -> Option<&Interaction> {
        self.interactions.get_by_id(id)
    }

    pub fn add_interaction(&mut self, mut interaction: Interaction) {
        interaction.owner_id = self.id;
        self.interactions.add(interaction);
    }

    pub fn set_interactions(&mut self, interactions: EntityCollection<Interaction>) {
        self.interactions = interactions;
    }

    pub fn clear_interactions(&mut self) {
        self.interactions.clear();
    }

    pub fn sort_interactions(&mut self, reverse: bool) {
        self.interactions.sort_by_date(reverse);
    }

    pub fn interactions_between(&self, lower: Date, upper: Date) -> EntityCollection<Interaction> {
        self.interactions.between(lower, upper)
    }

    pub fn urgent_interactions(&self) -> EntityCollection<Interaction> {
        self.interactions.urgent()
    }

    pub fn tasks(&self) -> &EntityCollection<Task> {
        &self.tasks
    }

    pub fn task(&self, id: EntityId) -> Option<&Task> {
        self.tasks.get_by_id(id)
    }

    pub fn add_task(&mut self, mut task: Task) {
        task.owner_id = self.id;
        self.tasks.add(task);
    }

    pub fn set_tasks(&mut self, tasks: EntityCollection<Task>) {
        self.tasks = tasks;
    }

    pub fn clear_tasks(&mut self) {
        self.tasks.clear();
    }

    pub fn sort_tasks(&mut self, reverse: bool) {
        self.tasks.sort_by_date(reverse);
    }

    pub fn tasks_between(&self, lower: Date, upper: Date) -> EntityCollection<Task> {
        self.tasks.between(lower, upper)
    }

    pub fn urgent_tasks(&self) -> EntityCollection<Task> {
        self.tasks.urgent()
    }

    pub(crate) fn interactions_mut(&mut self) -> &mut EntityCollection<Interaction> {
        &mut self.interactions
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut EntityCollection<Task> {
        &mut self.tasks
    }
}

impl PartialEq for Contact {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.full_name() == other.full_name()
    }
}

impl Entity for Contact {
    const KIND: EntityKind = EntityKind::Contact;

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    /// Contacts are dated by creation.
    fn date(&self) -> Date {
        self.creation_date
    }

    fn as_entity_ref(&self) -> EntityRef<'_> {
        EntityRef::Contact(self)
    }

    fn to_record(&self) -> Record {
        Record::from([
            (OBJECT_TYPE_KEY.to_string(), Self::KIND.object_type().to_string()),
            ("id".to_string(), self.id.to_string()),
            ("first_name".to_string(), self.first_name.clone()),
            ("last_name".to_string(), self.last_name.clone()),
            ("company".to_string(), self.company.clone()),
            ("phone".to_string(), self.phone.clone()),
            ("email".to_string(), self.email.clone()),
            (
                "creation_date".to_string(),
                self.creation_date.to_store_string(),
            ),
            ("note".to_string(), self.note.clone()),
        ])
    }

    fn from_record(record: &Record) -> Result<Self, RecordError> {
        let reader = RecordReader::with_schema(record, REQUIRED_FIELDS)?;
        let creation_date = reader.date("creation_date")?;
        let mut contact = Self::new(reader.text("first_name")?, reader.text("last_name")?);
        contact.id = reader.integer("id")?;
        contact.set_company(reader.text("company")?);
        contact.set_phone(reader.text("phone")?);
        contact.set_email(reader.text("email")?);
        contact.set_note(reader.text("note")?);
        contact.creation_date = creation_date;
        Ok(contact)
    }
}

impl Display for Contact {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Contact<{}, {}, {}, Interactions({}), Tasks({})>",
            self.full_name(),
            self.company,
            self.creation_date,
            self.interactions.len(),
            self.tasks.len()
        )
    }
}

fn capitalize(value: String) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if !first.is_uppercase() => first.to_uppercase().chain(chars).collect(),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::{capitalize, Contact};
    use crate::model::date::Date;
    use crate::model::interaction::{Interaction, InteractionType};
    use crate::model::record::RecordError;
    use crate::model::task::Task;
    use crate::model::Entity;

    #[test]
    fn names_are_capitalized_on_assignment() {
        let mut contact = Contact::new("jane", "doe");
        contact.set_company("acme");
        assert_eq!(contact.first_name(), "Jane");
        assert_eq!(contact.last_name(), "Doe");
        assert_eq!(contact.company(), "Acme");
        assert_eq!(contact.full_name(), "Doe Jane");
    }

    #[test]
    fn capitalize_handles_empty_and_unicode() {
        assert_eq!(capitalize(String::new()), "");
        assert_eq!(capitalize("élodie".to_string()), "Élodie");
        assert_eq!(capitalize("Already".to_string()), "Already");
    }

    #[test]
    fn equality_uses_id_and_full_name() {
        let mut left = Contact::new("jane", "doe");
        let mut right = Contact::new("Jane", "Doe");
        right.set_email("other@example.com");
        assert_eq!(left, right);

        left.set_id(1);
        right.set_id(2);
        assert_ne!(left, right);
    }

    #[test]
    fn children_are_reowned_when_added() {
        let mut contact = Contact::new("Ada", "Lovelace");
        contact.set_id(8);
        contact.add_task(Task::urgent(-1, "write notes"));
        contact.add_interaction(Interaction::new(
            -1,
            InteractionType::ContactEdited,
            "edited",
            Date::now(),
        ));
        assert!(contact.tasks().iter().all(|task| task.owner_id == 8));
        assert!(contact
            .interactions()
            .iter()
            .all(|interaction| interaction.owner_id == 8));
    }

    #[test]
    fn record_roundtrip_keeps_profile_fields() {
        let mut contact = Contact::new("grace", "hopper");
        contact.set_id(3);
        contact.set_company("navy");
        contact.set_phone("555-0100");
        contact.set_email("grace@example.com");
        contact.set_note("@todo Prepare talk");
        contact.set_creation_date(Date::from_ymd(2021, 10, 15).unwrap());

        let record = contact.to_record();
        assert_eq!(record.len(), 9);
        assert_eq!(record["creation_date"], "2021-10-15");

        let decoded = Contact::from_record(&record).unwrap();
        assert_eq!(decoded, contact);
        assert_eq!(decoded.company(), "Navy");
        assert_eq!(decoded.note(), "@todo Prepare talk");
        assert_eq!(decoded.creation_date(), contact.creation_date());
    }

    #[test]
    fn invalid_creation_date_is_rejected() {
        let mut record = Contact::new("a", "b").to_record();
        record.insert("creation_date".to_string(), "15/10/2021".to_string());
        assert!(matches!(
            Contact::from_record(&record),
            Err(RecordError::InvalidDate {
                field: "creation_date",
                ..
            })
        ));
    }
}
