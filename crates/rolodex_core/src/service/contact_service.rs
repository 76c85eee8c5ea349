//! Contact use-case service.
//!
//! # Responsibility
//! - Run the add/edit/remove workflows: audit interaction, task extraction
//!   from the note, gateway writes, flush.
//! - Answer the read-side views: statistics, history and task listings.
//!
//! # Invariants
//! - Every mutation goes through the gateway and ends with a flush.
//! - A contact's tasks always mirror the `@todo` lines of its latest note.

use crate::gateway::{FlushReport, PersistenceGateway};
use crate::model::contact::Contact;
use crate::model::date::Date;
use crate::model::interaction::{Interaction, InteractionType};
use crate::model::task::Task;
use crate::model::{Entity, EntityId, NO_OWNER};
use crate::parser::task_extract::extract_tasks;
use crate::repo::store::{RepoError, SqliteStore, Store};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ServiceError {
    ContactNotFound(EntityId),
    Repo(RepoError),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContactNotFound(id) => write!(f, "contact not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ContactNotFound(_) => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Result of one add/edit/remove workflow.
#[derive(Debug)]
pub struct ContactChange {
    pub contact_id: EntityId,
    pub audit_id: EntityId,
    /// Tasks created from the contact note.
    pub task_ids: Vec<EntityId>,
    pub flush: FlushReport,
}

/// Entity counts shown by the statistics view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statistics {
    pub contacts: usize,
    pub interactions: usize,
    /// Tasks attached to a cached contact.
    pub tasks: usize,
    pub urgent_tasks: usize,
}

/// History view filter; `None` fields do not filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    pub owner_id: Option<EntityId>,
    pub kind: Option<InteractionType>,
    pub from: Option<Date>,
    pub to: Option<Date>,
}

/// Task view filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Substring of the owner's full name, the description or the
    /// `dd/mm/yyyy` date.
    pub search: String,
    /// Only urgent tasks; the date bounds are ignored.
    pub urgent_only: bool,
    /// Lower bound; urgent tasks always pass it.
    pub from: Option<Date>,
    pub to: Option<Date>,
}

/// One row of the task view.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub task: Task,
    pub owner_name: String,
}

/// Use-case service over a persistence gateway.
pub struct ContactService<S: Store = SqliteStore> {
    gateway: PersistenceGateway<S>,
}

impl<S: Store> ContactService<S> {
    pub fn new(gateway: PersistenceGateway<S>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &PersistenceGateway<S> {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut PersistenceGateway<S> {
        &mut self.gateway
    }

    pub fn into_gateway(self) -> PersistenceGateway<S> {
        self.gateway
    }

    /// Persists a new contact.
    ///
    /// # Contract
    /// - Inserts the contact, then a `ContactAdded` interaction owned by it.
    /// - Creates one task per `@todo` line of the note, owned by the contact.
    /// - Flushes before returning.
    pub fn add_contact(&mut self, mut contact: Contact) -> ServiceResult<ContactChange> {
        let contact_id = self.gateway.create(&mut contact)?;
        let audit_id = self.record_audit(
            contact_id,
            InteractionType::ContactAdded,
            format!("Contact created: {}", contact.full_name()),
        )?;
        let task_ids = self.create_note_tasks(contact_id, contact.note())?;
        Ok(ContactChange {
            contact_id,
            audit_id,
            task_ids,
            flush: self.gateway.flush(),
        })
    }

    /// Saves edits to a cached contact.
    ///
    /// # Contract
    /// - Records a `ContactEdited` interaction.
    /// - Deletes the contact's current tasks and re-creates them from the
    ///   edited note.
    /// - Old-task deletes and the contact update are queued only after every
    ///   insert succeeded; on error nothing is queued and the old tasks stay.
    /// - Flushes before returning.
    pub fn edit_contact(&mut self, contact: &Contact) -> ServiceResult<ContactChange> {
        let contact_id = contact.id();
        let previous_tasks = self
            .gateway
            .get::<Contact>(contact_id)
            .ok_or(ServiceError::ContactNotFound(contact_id))?
            .tasks()
            .ids();

        let audit_id = self.record_audit(
            contact_id,
            InteractionType::ContactEdited,
            format!("Contact edited: {}", contact.full_name()),
        )?;
        let task_ids = self.create_note_tasks(contact_id, contact.note())?;
        for task_id in previous_tasks {
            self.gateway.delete_by_id::<Task>(task_id);
        }
        self.gateway.update(contact);

        Ok(ContactChange {
            contact_id,
            audit_id,
            task_ids,
            flush: self.gateway.flush(),
        })
    }

    /// Deletes a cached contact together with its tasks.
    ///
    /// # Contract
    /// - The `ContactRemoved` interaction is unowned so it outlives the
    ///   contact.
    /// - The contact's interactions stay in the store.
    /// - The delete is queued only after the audit insert succeeded.
    pub fn remove_contact(&mut self, contact_id: EntityId) -> ServiceResult<ContactChange> {
        let contact = self
            .gateway
            .get::<Contact>(contact_id)
            .ok_or(ServiceError::ContactNotFound(contact_id))?;
        let description = format!("Contact removed: {}", contact.full_name());

        let audit_id = self.record_audit(NO_OWNER, InteractionType::ContactRemoved, description)?;
        self.gateway.delete_by_id::<Contact>(contact_id);

        Ok(ContactChange {
            contact_id,
            audit_id,
            task_ids: Vec::new(),
            flush: self.gateway.flush(),
        })
    }

    pub fn statistics(&self) -> Statistics {
        let contacts = self.gateway.contacts();
        Statistics {
            contacts: contacts.len(),
            interactions: self.gateway.interactions().len(),
            tasks: contacts.iter().map(|contact| contact.tasks().len()).sum(),
            urgent_tasks: contacts.urgent_tasks().len(),
        }
    }

    /// Interactions matching `filter`, newest first.
    pub fn history(&self, filter: &HistoryFilter) -> Vec<Interaction> {
        let mut interactions: Vec<Interaction> = self
            .gateway
            .interactions()
            .iter()
            .filter(|interaction| filter.owner_id.map_or(true, |id| interaction.owner_id == id))
            .filter(|interaction| filter.kind.map_or(true, |kind| interaction.kind == kind))
            .filter(|interaction| filter.from.map_or(true, |from| interaction.date >= from))
            .filter(|interaction| filter.to.map_or(true, |to| interaction.date <= to))
            .cloned()
            .collect();
        interactions.sort_by(|left, right| right.date.cmp(&left.date));
        interactions
    }

    /// Tasks of cached contacts matching `filter`, latest due date first.
    pub fn filter_tasks(&self, filter: &TaskFilter) -> Vec<TaskRow> {
        let mut rows = Vec::new();
        for contact in self.gateway.contacts() {
            let owner_name = contact.full_name();
            for task in contact.tasks() {
                if task_matches(filter, &owner_name, task) {
                    rows.push(TaskRow {
                        task: task.clone(),
                        owner_name: owner_name.clone(),
                    });
                }
            }
        }
        rows.sort_by(|left, right| right.task.date.cmp(&left.task.date));
        rows
    }

    fn record_audit(
        &mut self,
        owner_id: EntityId,
        kind: InteractionType,
        description: String,
    ) -> ServiceResult<EntityId> {
        let mut audit = Interaction::new(owner_id, kind, description, Date::now());
        Ok(self.gateway.create(&mut audit)?)
    }

    fn create_note_tasks(&mut self, owner_id: EntityId, note: &str) -> ServiceResult<Vec<EntityId>> {
        let mut task_ids = Vec::new();
        for mut task in extract_tasks(note) {
            task.owner_id = owner_id;
            task_ids.push(self.gateway.create(&mut task)?);
        }
        Ok(task_ids)
    }
}

fn task_matches(filter: &TaskFilter, owner_name: &str, task: &Task) -> bool {
    let search = filter.search.as_str();
    if !owner_name.contains(search)
        && !task.description.contains(search)
        && !task.date.to_compact_string().contains(search)
    {
        return false;
    }
    if filter.urgent_only {
        return task.is_urgent();
    }
    if let Some(from) = filter.from {
        if task.date < from && !task.is_urgent() {
            return false;
        }
    }
    if let Some(to) = filter.to {
        if task.date > to {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::{task_matches, TaskFilter};
    use crate::model::date::Date;
    use crate::model::task::Task;

    fn dated(day: u32) -> Task {
        Task::new(1, "call", Date::from_ymd(2025, 6, day).unwrap())
    }

    #[test]
    fn search_matches_owner_description_or_date() {
        let filter = TaskFilter {
            search: "Doe".to_string(),
            ..TaskFilter::default()
        };
        assert!(task_matches(&filter, "Doe Jane", &dated(3)));
        assert!(!task_matches(&filter, "Smith Ann", &dated(3)));

        let by_date = TaskFilter {
            search: "03/06".to_string(),
            ..TaskFilter::default()
        };
        assert!(task_matches(&by_date, "Smith Ann", &dated(3)));
    }

    #[test]
    fn urgent_tasks_pass_the_lower_bound() {
        let filter = TaskFilter {
            from: Date::from_ymd(2025, 6, 10),
            to: Date::from_ymd(2025, 6, 20),
            ..TaskFilter::default()
        };
        assert!(task_matches(&filter, "", &Task::urgent(1, "asap")));
        assert!(!task_matches(&filter, "", &dated(5)));
        assert!(task_matches(&filter, "", &dated(10)));
        assert!(task_matches(&filter, "", &dated(20)));
        assert!(!task_matches(&filter, "", &dated(21)));
    }

    #[test]
    fn urgent_only_ignores_bounds() {
        let filter = TaskFilter {
            urgent_only: true,
            from: Date::from_ymd(2030, 1, 1),
            ..TaskFilter::default()
        };
        assert!(task_matches(&filter, "", &Task::urgent(1, "asap")));
        assert!(!task_matches(&filter, "", &dated(5)));
    }
}
