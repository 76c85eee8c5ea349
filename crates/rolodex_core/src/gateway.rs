//! Write-back cache between entity collections and the durable store.
//!
//! # Responsibility
//! - Hold the single authoritative in-memory copy of every contact,
//!   interaction and task.
//! - Insert immediately on create; defer updates and deletes to [`flush`].
//! - Keep each cached contact's sub-collections in step with the flat
//!   interaction/task collections.
//!
//! # Invariants
//! - The queue stores `(kind, action, id)` only; update payloads are read
//!   from the cache when the queue is flushed.
//! - Cache entries of deleted entities stay visible until their delete is
//!   applied.
//! - `flush` always empties the queue, whatever the individual outcomes.
//! - Sub-collections of a cached contact are maintained here; those carried
//!   by a contact passed to [`PersistenceGateway::update`] are ignored.
//! - Evicting a contact also drops the interactions it owned from the cache.
//!   Their rows stay in the store, where [`PersistenceGateway::load_all`]
//!   never reaches them, so the cache matches a fresh reload.
//!
//! [`flush`]: PersistenceGateway::flush

use crate::collection::EntityCollection;
use crate::db::{open_db, open_db_in_memory, DbError};
use crate::model::contact::Contact;
use crate::model::interaction::Interaction;
use crate::model::task::Task;
use crate::model::{Entity, EntityId, EntityKind, Owned, NO_OWNER};
use crate::repo::store::{RepoError, RepoResult, SqliteStore, Store};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

/// Failure that leaves the process without a usable store.
#[derive(Debug)]
pub enum FatalError {
    Open(DbError),
    Store(RepoError),
}

impl Display for FatalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(err) => write!(f, "cannot open contact store: {err}"),
            Self::Store(err) => write!(f, "contact store is unusable: {err}"),
        }
    }
}

impl Error for FatalError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

/// Deferred action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Update,
    Delete,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One deferred intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuedOperation {
    pub kind: EntityKind,
    pub action: Action,
    pub id: EntityId,
}

impl Display for QueuedOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.action.as_str(),
            self.kind.object_type(),
            self.id
        )
    }
}

/// Why one queued operation was not applied.
#[derive(Debug)]
pub enum FlushError {
    /// Update target vanished from the cache before the flush.
    NotCached,
    Store(RepoError),
}

impl Display for FlushError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotCached => write!(f, "entity is no longer cached"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for FlushError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotCached => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for FlushError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

#[derive(Debug)]
pub struct FlushFailure {
    pub operation: QueuedOperation,
    pub error: FlushError,
}

/// Outcome of one [`PersistenceGateway::flush`].
#[derive(Debug, Default)]
pub struct FlushReport {
    pub applied: usize,
    pub failures: Vec<FlushFailure>,
}

impl FlushReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Subset of the store a failed load read was targeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadScope {
    Contacts,
    Interactions { owner_id: EntityId },
    Tasks { owner_id: EntityId },
}

#[derive(Debug)]
pub struct LoadFailure {
    pub scope: LoadScope,
    pub error: RepoError,
}

/// Outcome of one [`PersistenceGateway::load_all`].
#[derive(Debug, Default)]
pub struct LoadReport {
    pub contacts: usize,
    pub interactions: usize,
    pub tasks: usize,
    pub failures: Vec<LoadFailure>,
}

/// Cached entities, one flat collection per kind.
#[derive(Debug, Default)]
pub struct EntityCache {
    pub(crate) contacts: EntityCollection<Contact>,
    pub(crate) interactions: EntityCollection<Interaction>,
    pub(crate) tasks: EntityCollection<Task>,
}

impl EntityCache {
    fn clear(&mut self) {
        self.contacts.clear();
        self.interactions.clear();
        self.tasks.clear();
    }
}

/// Entity kinds the gateway knows how to cache.
pub trait Cached: Entity {
    fn cached(cache: &EntityCache) -> &EntityCollection<Self>;
    fn cached_mut(cache: &mut EntityCache) -> &mut EntityCollection<Self>;
    /// Adds a freshly inserted entity.
    fn admit(cache: &mut EntityCache, entity: Self);
    /// Replaces the cached copy with the same id; `false` on a miss.
    fn replace(cache: &mut EntityCache, entity: Self) -> bool;
    /// Drops the cached copy once its delete is durable.
    fn evict(cache: &mut EntityCache, id: EntityId);
    /// Further deletes implied by deleting `id`.
    fn cascade(_cache: &EntityCache, _id: EntityId) -> Vec<(EntityKind, EntityId)> {
        Vec::new()
    }
}

impl Cached for Contact {
    fn cached(cache: &EntityCache) -> &EntityCollection<Self> {
        &cache.contacts
    }

    fn cached_mut(cache: &mut EntityCache) -> &mut EntityCollection<Self> {
        &mut cache.contacts
    }

    fn admit(cache: &mut EntityCache, mut entity: Self) {
        entity.clear_interactions();
        entity.clear_tasks();
        cache.contacts.add(entity);
    }

    fn replace(cache: &mut EntityCache, mut entity: Self) -> bool {
        let Some(slot) = cache.contacts.get_by_id_mut(entity.id()) else {
            return false;
        };
        entity.set_interactions(std::mem::take(slot.interactions_mut()));
        entity.set_tasks(std::mem::take(slot.tasks_mut()));
        *slot = entity;
        true
    }

    fn evict(cache: &mut EntityCache, id: EntityId) {
        cache.contacts.remove_id(id);
        cache
            .interactions
            .retain(|interaction| interaction.owner_id != id);
    }

    fn cascade(cache: &EntityCache, id: EntityId) -> Vec<(EntityKind, EntityId)> {
        let mut task_ids = cache.tasks.owned_by(id).ids();
        if let Some(contact) = cache.contacts.get_by_id(id) {
            task_ids.extend(contact.tasks().ids());
        }
        let mut seen = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            if !seen.contains(&task_id) {
                seen.push(task_id);
            }
        }
        seen.into_iter()
            .map(|task_id| (EntityKind::Task, task_id))
            .collect()
    }
}

/// Owned kinds mirrored into their owner's sub-collection.
trait Child: Owned {
    fn children_of(contact: &mut Contact) -> &mut EntityCollection<Self>;
}

impl Child for Interaction {
    fn children_of(contact: &mut Contact) -> &mut EntityCollection<Self> {
        contact.interactions_mut()
    }
}

impl Child for Task {
    fn children_of(contact: &mut Contact) -> &mut EntityCollection<Self> {
        contact.tasks_mut()
    }
}

fn mirror_child<T: Child>(cache: &mut EntityCache, entity: T) {
    if let Some(owner) = cache.contacts.get_by_id_mut(entity.owner_id()) {
        let children = T::children_of(owner);
        match children.get_by_id_mut(entity.id()) {
            Some(slot) => *slot = entity,
            None => children.add(entity),
        }
    }
}

fn unmirror_child<T: Child>(cache: &mut EntityCache, owner_id: EntityId, id: EntityId) {
    if let Some(owner) = cache.contacts.get_by_id_mut(owner_id) {
        T::children_of(owner).remove_id(id);
    }
}

fn replace_child<T: Child + Cached>(cache: &mut EntityCache, entity: T) -> bool {
    let id = entity.id();
    let Some(slot) = T::cached_mut(cache).get_by_id_mut(id) else {
        return false;
    };
    let previous_owner = slot.owner_id();
    *slot = entity.clone();
    if previous_owner != entity.owner_id() {
        unmirror_child::<T>(cache, previous_owner, id);
    }
    mirror_child(cache, entity);
    true
}

fn evict_child<T: Child + Cached>(cache: &mut EntityCache, id: EntityId) {
    if let Some(entity) = T::cached_mut(cache).remove_id(id) {
        unmirror_child::<T>(cache, entity.owner_id(), id);
    }
}

impl Cached for Interaction {
    fn cached(cache: &EntityCache) -> &EntityCollection<Self> {
        &cache.interactions
    }

    fn cached_mut(cache: &mut EntityCache) -> &mut EntityCollection<Self> {
        &mut cache.interactions
    }

    fn admit(cache: &mut EntityCache, entity: Self) {
        cache.interactions.add(entity.clone());
        mirror_child(cache, entity);
    }

    fn replace(cache: &mut EntityCache, entity: Self) -> bool {
        replace_child(cache, entity)
    }

    fn evict(cache: &mut EntityCache, id: EntityId) {
        evict_child::<Self>(cache, id);
    }
}

impl Cached for Task {
    fn cached(cache: &EntityCache) -> &EntityCollection<Self> {
        &cache.tasks
    }

    fn cached_mut(cache: &mut EntityCache) -> &mut EntityCollection<Self> {
        &mut cache.tasks
    }

    fn admit(cache: &mut EntityCache, entity: Self) {
        cache.tasks.add(entity.clone());
        mirror_child(cache, entity);
    }

    fn replace(cache: &mut EntityCache, entity: Self) -> bool {
        replace_child(cache, entity)
    }

    fn evict(cache: &mut EntityCache, id: EntityId) {
        evict_child::<Self>(cache, id);
    }
}

/// Cache plus deferred-operation queue in front of a [`Store`].
pub struct PersistenceGateway<S: Store = SqliteStore> {
    store: S,
    cache: EntityCache,
    queue: Vec<QueuedOperation>,
}

impl PersistenceGateway<SqliteStore> {
    /// Opens (creating when absent) and migrates the SQLite file at `path`.
    ///
    /// # Errors
    /// - [`FatalError`] when the file cannot be opened, migrated or verified.
    ///   Callers are expected to stop; nothing can be persisted without it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FatalError> {
        let conn = open_db(path).map_err(|err| {
            error!("event=gateway_open module=gateway status=error error={err}");
            FatalError::Open(err)
        })?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, FatalError> {
        let conn = open_db_in_memory().map_err(FatalError::Open)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: rusqlite::Connection) -> Result<Self, FatalError> {
        let store = SqliteStore::try_new(conn).map_err(|err| {
            error!("event=gateway_open module=gateway status=error error={err}");
            FatalError::Store(err)
        })?;
        Ok(Self::with_store(store))
    }
}

impl<S: Store> PersistenceGateway<S> {
    /// Wraps an existing store with an empty cache and queue.
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            cache: EntityCache::default(),
            queue: Vec::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn contacts(&self) -> &EntityCollection<Contact> {
        &self.cache.contacts
    }

    pub fn interactions(&self) -> &EntityCollection<Interaction> {
        &self.cache.interactions
    }

    pub fn tasks(&self) -> &EntityCollection<Task> {
        &self.cache.tasks
    }

    pub fn get<T: Cached>(&self, id: EntityId) -> Option<&T> {
        T::cached(&self.cache).get_by_id(id)
    }

    pub fn pending_operations(&self) -> &[QueuedOperation] {
        &self.queue
    }

    /// Rebuilds the cache from the store and drops any pending operation.
    ///
    /// A failed read is logged and recorded; the subset it covered stays
    /// empty while the remaining reads proceed.
    pub fn load_all(&mut self) -> LoadReport {
        let started_at = Instant::now();
        self.cache.clear();
        self.queue.clear();
        let mut report = LoadReport::default();

        let contacts = match self.store.list_contacts() {
            Ok(contacts) => contacts,
            Err(err) => {
                record_load_failure(&mut report, LoadScope::Contacts, err);
                Vec::new()
            }
        };

        for mut contact in contacts {
            let owner_id = contact.id();
            contact.clear_interactions();
            contact.clear_tasks();

            match self.store.list_interactions(owner_id) {
                Ok(interactions) => {
                    for interaction in interactions {
                        contact.interactions_mut().add(interaction.clone());
                        self.cache.interactions.add(interaction);
                        report.interactions += 1;
                    }
                }
                Err(err) => {
                    record_load_failure(&mut report, LoadScope::Interactions { owner_id }, err)
                }
            }

            match self.store.list_tasks(owner_id) {
                Ok(tasks) => {
                    for task in tasks {
                        contact.tasks_mut().add(task.clone());
                        self.cache.tasks.add(task);
                        report.tasks += 1;
                    }
                }
                Err(err) => record_load_failure(&mut report, LoadScope::Tasks { owner_id }, err),
            }

            self.cache.contacts.add(contact);
            report.contacts += 1;
        }

        match self.store.list_interactions(NO_OWNER) {
            Ok(interactions) => {
                report.interactions += interactions.len();
                interactions
                    .into_iter()
                    .for_each(|interaction| self.cache.interactions.add(interaction));
            }
            Err(err) => record_load_failure(
                &mut report,
                LoadScope::Interactions { owner_id: NO_OWNER },
                err,
            ),
        }

        match self.store.list_tasks(NO_OWNER) {
            Ok(tasks) => {
                report.tasks += tasks.len();
                tasks.into_iter().for_each(|task| self.cache.tasks.add(task));
            }
            Err(err) => {
                record_load_failure(&mut report, LoadScope::Tasks { owner_id: NO_OWNER }, err)
            }
        }

        info!(
            "event=gateway_load module=gateway status={} contacts={} interactions={} tasks={} failures={} duration_ms={}",
            if report.failures.is_empty() { "ok" } else { "partial" },
            report.contacts,
            report.interactions,
            report.tasks,
            report.failures.len(),
            started_at.elapsed().as_millis()
        );
        report
    }

    /// Inserts `entity` now, writes the assigned id back onto it and caches
    /// a copy.
    ///
    /// # Errors
    /// - [`RepoError`] from the store; nothing is cached and the entity keeps
    ///   its previous id, so the call can be retried.
    pub fn create<T: Cached>(&mut self, entity: &mut T) -> RepoResult<EntityId> {
        let id = match self.store.insert(entity.as_entity_ref()) {
            Ok(id) => id,
            Err(err) => {
                error!(
                    "event=gateway_create module=gateway status=error kind={} error={}",
                    T::KIND.object_type(),
                    err
                );
                return Err(err);
            }
        };
        entity.set_id(id);
        T::admit(&mut self.cache, entity.clone());
        info!(
            "event=gateway_create module=gateway status=ok kind={} id={}",
            T::KIND.object_type(),
            id
        );
        Ok(id)
    }

    /// Replaces the cached copy and queues a deferred update.
    ///
    /// Returns `false` and queues nothing when `entity` is not cached.
    pub fn update<T: Cached>(&mut self, entity: &T) -> bool {
        let id = entity.id();
        if !T::replace(&mut self.cache, entity.clone()) {
            warn!(
                "event=gateway_update module=gateway status=miss kind={} id={}",
                T::KIND.object_type(),
                id
            );
            return false;
        }
        self.enqueue(T::KIND, Action::Update, id);
        true
    }

    /// Applies `change` to a copy of the cached entity, then updates it.
    pub fn modify<T: Cached>(&mut self, id: EntityId, change: impl FnOnce(&mut T)) -> bool {
        let Some(mut entity) = self.get::<T>(id).cloned() else {
            return false;
        };
        change(&mut entity);
        entity.set_id(id);
        self.update(&entity)
    }

    pub fn delete<T: Cached>(&mut self, entity: &T) {
        self.delete_by_id::<T>(entity.id());
    }

    /// Queues a delete of `id` and of everything it cascades to.
    pub fn delete_by_id<T: Cached>(&mut self, id: EntityId) {
        self.enqueue(T::KIND, Action::Delete, id);
        for (kind, child_id) in T::cascade(&self.cache, id) {
            self.enqueue(kind, Action::Delete, child_id);
        }
    }

    /// Applies every queued operation in order and empties the queue.
    ///
    /// Failures are logged and reported; later operations still run.
    pub fn flush(&mut self) -> FlushReport {
        let started_at = Instant::now();
        let mut report = FlushReport::default();

        for operation in std::mem::take(&mut self.queue) {
            let outcome = match operation.kind {
                EntityKind::Contact => self.apply::<Contact>(operation),
                EntityKind::Interaction => self.apply::<Interaction>(operation),
                EntityKind::Task => self.apply::<Task>(operation),
            };
            match outcome {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    warn!(
                        "event=gateway_flush_op module=gateway status=error action={} kind={} id={} error={}",
                        operation.action.as_str(),
                        operation.kind.object_type(),
                        operation.id,
                        error
                    );
                    report.failures.push(FlushFailure { operation, error });
                }
            }
        }

        info!(
            "event=gateway_flush module=gateway status={} applied={} failed={} duration_ms={}",
            if report.is_clean() { "ok" } else { "partial" },
            report.applied,
            report.failures.len(),
            started_at.elapsed().as_millis()
        );
        report
    }

    fn apply<T: Cached>(&mut self, operation: QueuedOperation) -> Result<(), FlushError> {
        match operation.action {
            Action::Update => {
                let entity = T::cached(&self.cache)
                    .get_by_id(operation.id)
                    .ok_or(FlushError::NotCached)?;
                self.store.update(entity.as_entity_ref())?;
            }
            Action::Delete => {
                self.store.delete(T::KIND, operation.id)?;
                T::evict(&mut self.cache, operation.id);
            }
        }
        Ok(())
    }

    fn enqueue(&mut self, kind: EntityKind, action: Action, id: EntityId) {
        self.queue.push(QueuedOperation { kind, action, id });
    }
}

fn record_load_failure(report: &mut LoadReport, scope: LoadScope, error: RepoError) {
    warn!("event=gateway_load_read module=gateway status=error scope={scope:?} error={error}");
    report.failures.push(LoadFailure { scope, error });
}

#[cfg(test)]
mod tests {
    use super::{Action, PersistenceGateway};
    use crate::model::contact::Contact;
    use crate::model::date::Date;
    use crate::model::interaction::{Interaction, InteractionType};
    use crate::model::task::Task;
    use crate::model::{EntityKind, NO_OWNER};

    fn gateway() -> PersistenceGateway {
        PersistenceGateway::open_in_memory().unwrap()
    }

    #[test]
    fn created_children_are_mirrored_into_their_owner() {
        let mut gateway = gateway();
        let mut contact = Contact::new("ada", "lovelace");
        let owner = gateway.create(&mut contact).unwrap();

        let mut task = Task::urgent(owner, "send letter");
        gateway.create(&mut task).unwrap();
        let mut note = Interaction::new(owner, InteractionType::Unclassified, "met", Date::now());
        gateway.create(&mut note).unwrap();

        let cached = gateway.get::<Contact>(owner).unwrap();
        assert_eq!(cached.tasks().ids(), vec![task.id]);
        assert_eq!(cached.interactions().ids(), vec![note.id]);
        assert_eq!(gateway.tasks().len(), 1);
    }

    #[test]
    fn update_reparents_a_task() {
        let mut gateway = gateway();
        let first = gateway.create(&mut Contact::new("a", "one")).unwrap();
        let second = gateway.create(&mut Contact::new("b", "two")).unwrap();
        let mut task = Task::urgent(first, "move me");
        gateway.create(&mut task).unwrap();

        task.owner_id = second;
        assert!(gateway.update(&task));

        assert!(gateway.get::<Contact>(first).unwrap().tasks().is_empty());
        assert_eq!(
            gateway.get::<Contact>(second).unwrap().tasks().ids(),
            vec![task.id]
        );
    }

    #[test]
    fn contact_update_keeps_cached_children() {
        let mut gateway = gateway();
        let mut contact = Contact::new("grace", "hopper");
        let id = gateway.create(&mut contact).unwrap();
        gateway.create(&mut Task::urgent(id, "compile")).unwrap();

        contact.set_company("navy");
        assert!(gateway.update(&contact));

        let cached = gateway.get::<Contact>(id).unwrap();
        assert_eq!(cached.company(), "Navy");
        assert_eq!(cached.tasks().len(), 1);
    }

    #[test]
    fn flushed_contact_delete_drops_its_interactions_like_a_reload() {
        let mut gateway = gateway();
        let owner = gateway.create(&mut Contact::new("alan", "turing")).unwrap();
        gateway
            .create(&mut Interaction::new(
                owner,
                InteractionType::Unclassified,
                "lunch",
                Date::now(),
            ))
            .unwrap();
        gateway
            .create(&mut Interaction::new(
                NO_OWNER,
                InteractionType::ContactRemoved,
                "Contact removed: Someone",
                Date::now(),
            ))
            .unwrap();

        gateway.delete_by_id::<Contact>(owner);
        assert!(gateway.flush().is_clean());
        let before_reload = gateway.interactions().ids();
        assert_eq!(before_reload.len(), 1);

        gateway.load_all();
        assert_eq!(gateway.interactions().ids(), before_reload);
    }

    #[test]
    fn update_miss_queues_nothing() {
        let mut gateway = gateway();
        let mut stranger = Task::urgent(NO_OWNER, "nobody");
        stranger.id = 99;
        assert!(!gateway.update(&stranger));
        assert!(gateway.pending_operations().is_empty());
    }

    #[test]
    fn modify_queues_an_update_through_the_cache() {
        let mut gateway = gateway();
        let mut task = Task::urgent(NO_OWNER, "draft");
        let id = gateway.create(&mut task).unwrap();

        assert!(gateway.modify::<Task>(id, |task| task.description = "final".to_string()));
        assert!(!gateway.modify::<Task>(id + 100, |_| {}));

        assert_eq!(gateway.get::<Task>(id).unwrap().description, "final");
        let pending = gateway.pending_operations();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].kind, EntityKind::Task);
        assert_eq!(pending[0].action, Action::Update);
    }

    #[test]
    fn deleted_entities_stay_cached_until_flush() {
        let mut gateway = gateway();
        let mut task = Task::urgent(NO_OWNER, "soon gone");
        let id = gateway.create(&mut task).unwrap();

        gateway.delete(&task);
        assert!(gateway.get::<Task>(id).is_some());

        let report = gateway.flush();
        assert!(report.is_clean());
        assert_eq!(report.applied, 1);
        assert!(gateway.get::<Task>(id).is_none());
        assert!(gateway.pending_operations().is_empty());
    }
}
