use rolodex_core::db::open_db_in_memory;
use rolodex_core::gateway::{FlushError, LoadScope};
use rolodex_core::{
    Action, Contact, Date, Entity, EntityId, EntityKind, FatalError, Interaction,
    InteractionType, PersistenceGateway, RepoError, RepoResult, SqliteStore, Store, Task,
    NO_OWNER,
};
use rolodex_core::model::EntityRef;
use std::cell::RefCell;

/// SQLite store that records every write and fails the scripted ones.
struct ScriptedStore {
    inner: SqliteStore,
    fail_on: Vec<(EntityKind, EntityId)>,
    fail_list_tasks_of: Option<EntityId>,
    writes: RefCell<Vec<(&'static str, EntityKind, EntityId)>>,
}

impl ScriptedStore {
    fn new() -> Self {
        Self {
            inner: SqliteStore::try_new(open_db_in_memory().unwrap()).unwrap(),
            fail_on: Vec::new(),
            fail_list_tasks_of: None,
            writes: RefCell::new(Vec::new()),
        }
    }

    fn check(&self, kind: EntityKind, id: EntityId) -> RepoResult<()> {
        if self.fail_on.contains(&(kind, id)) {
            return Err(RepoError::InvalidData(format!("scripted failure for {id}")));
        }
        Ok(())
    }
}

fn ref_id(entity: EntityRef<'_>) -> EntityId {
    match entity {
        EntityRef::Contact(contact) => contact.id(),
        EntityRef::Interaction(interaction) => interaction.id,
        EntityRef::Task(task) => task.id,
    }
}

impl Store for ScriptedStore {
    fn list_contacts(&self) -> RepoResult<Vec<Contact>> {
        self.inner.list_contacts()
    }

    fn list_interactions(&self, owner_id: EntityId) -> RepoResult<Vec<Interaction>> {
        self.inner.list_interactions(owner_id)
    }

    fn list_tasks(&self, owner_id: EntityId) -> RepoResult<Vec<Task>> {
        if self.fail_list_tasks_of == Some(owner_id) {
            return Err(RepoError::InvalidData("scripted list failure".to_string()));
        }
        self.inner.list_tasks(owner_id)
    }

    fn insert(&mut self, entity: EntityRef<'_>) -> RepoResult<EntityId> {
        self.inner.insert(entity)
    }

    fn update(&mut self, entity: EntityRef<'_>) -> RepoResult<()> {
        let id = ref_id(entity);
        self.writes
            .borrow_mut()
            .push(("update", entity.kind(), id));
        self.check(entity.kind(), id)?;
        self.inner.update(entity)
    }

    fn delete(&mut self, kind: EntityKind, id: EntityId) -> RepoResult<()> {
        self.writes.borrow_mut().push(("delete", kind, id));
        self.check(kind, id)?;
        self.inner.delete(kind, id)
    }
}

fn stored_task_description(gateway: &PersistenceGateway<ScriptedStore>, id: EntityId) -> String {
    gateway
        .store()
        .inner
        .connection()
        .query_row("SELECT description FROM todo WHERE id = ?1;", [id], |row| {
            row.get(0)
        })
        .unwrap()
}

#[test]
fn store_matches_cache_after_flush() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rolodex.db");

    let mut gateway = PersistenceGateway::open(&path).unwrap();
    let mut ada = Contact::new("ada", "lovelace");
    let ada_id = gateway.create(&mut ada).unwrap();
    let mut bob = Contact::new("bob", "builder");
    let bob_id = gateway.create(&mut bob).unwrap();

    let mut keep = Task::new(ada_id, "review", Date::from_ymd(2025, 3, 1).unwrap());
    gateway.create(&mut keep).unwrap();
    let mut drop_me = Task::urgent(ada_id, "obsolete");
    gateway.create(&mut drop_me).unwrap();
    let mut history = Interaction::new(
        bob_id,
        InteractionType::Unclassified,
        "coffee",
        Date::from_ymd(2025, 2, 14).unwrap(),
    );
    gateway.create(&mut history).unwrap();

    assert!(gateway.modify::<Contact>(bob_id, |bob| bob.set_company("acme")));
    assert!(gateway.modify::<Task>(keep.id, |task| task.description = "review draft".into()));
    gateway.delete(&drop_me);
    let report = gateway.flush();
    assert!(report.is_clean());
    assert_eq!(report.applied, 3);

    let mut reloaded = PersistenceGateway::open(&path).unwrap();
    let load = reloaded.load_all();
    assert!(load.failures.is_empty());
    assert_eq!((load.contacts, load.interactions, load.tasks), (2, 1, 1));

    assert_eq!(reloaded.contacts().ids(), gateway.contacts().ids());
    assert_eq!(reloaded.get::<Contact>(bob_id).unwrap().company(), "Acme");
    assert_eq!(reloaded.tasks().as_slice(), gateway.tasks().as_slice());
    let task = reloaded.get::<Task>(keep.id).unwrap();
    assert_eq!(task.description, "review draft");
    assert_eq!(task.date, Date::from_ymd(2025, 3, 1).unwrap());
    assert_eq!(
        reloaded.get::<Contact>(ada_id).unwrap().tasks().ids(),
        vec![keep.id]
    );
    assert_eq!(
        reloaded.get::<Contact>(bob_id).unwrap().interactions().ids(),
        vec![history.id]
    );
}

#[test]
fn updating_twice_before_flush_writes_twice_and_keeps_last_value() {
    let mut gateway = PersistenceGateway::with_store(ScriptedStore::new());
    let mut task = Task::urgent(NO_OWNER, "first");
    let id = gateway.create(&mut task).unwrap();

    task.description = "second".to_string();
    assert!(gateway.update(&task));
    task.description = "third".to_string();
    assert!(gateway.update(&task));
    assert_eq!(gateway.pending_operations().len(), 2);
    assert!(gateway
        .pending_operations()
        .iter()
        .all(|operation| operation.action == Action::Update && operation.id == id));

    let report = gateway.flush();
    assert_eq!(report.applied, 2);
    assert_eq!(
        gateway.store().writes.borrow().as_slice(),
        &[
            ("update", EntityKind::Task, id),
            ("update", EntityKind::Task, id)
        ]
    );
    assert_eq!(stored_task_description(&gateway, id), "third");
}

#[test]
fn deleting_a_contact_cascades_to_its_tasks() {
    let mut gateway = PersistenceGateway::with_store(ScriptedStore::new());
    let owner = gateway.create(&mut Contact::new("carl", "sagan")).unwrap();
    let other = gateway.create(&mut Contact::new("vera", "rubin")).unwrap();
    let mut first = Task::urgent(owner, "telescope");
    let mut second = Task::new(owner, "lecture", Date::from_ymd(2025, 9, 9).unwrap());
    let mut unrelated = Task::urgent(other, "galaxies");
    gateway.create(&mut first).unwrap();
    gateway.create(&mut second).unwrap();
    gateway.create(&mut unrelated).unwrap();

    gateway.delete_by_id::<Contact>(owner);
    let pending: Vec<_> = gateway
        .pending_operations()
        .iter()
        .map(|operation| (operation.kind, operation.id))
        .collect();
    assert_eq!(
        pending,
        vec![
            (EntityKind::Contact, owner),
            (EntityKind::Task, first.id),
            (EntityKind::Task, second.id)
        ]
    );
    assert!(gateway.get::<Task>(first.id).is_some());

    assert!(gateway.flush().is_clean());
    assert!(gateway.get::<Contact>(owner).is_none());
    assert!(gateway.get::<Task>(first.id).is_none());
    assert!(gateway.get::<Task>(second.id).is_none());
    assert!(gateway.get::<Task>(unrelated.id).is_some());
    assert!(gateway.store().list_tasks(owner).unwrap().is_empty());
    assert_eq!(gateway.store().list_tasks(other).unwrap().len(), 1);
}

#[test]
fn failed_operation_is_reported_and_the_rest_still_apply() {
    let mut store = ScriptedStore::new();
    let mut doomed = Task::urgent(NO_OWNER, "doomed");
    let doomed_id = store.insert(EntityRef::Task(&doomed)).unwrap();
    doomed.set_id(doomed_id);
    store.fail_on.push((EntityKind::Task, doomed_id));

    let mut gateway = PersistenceGateway::with_store(store);
    gateway.load_all();
    let mut fine = Task::urgent(NO_OWNER, "fine");
    let fine_id = gateway.create(&mut fine).unwrap();

    gateway.delete(&doomed);
    assert!(gateway.modify::<Task>(fine_id, |task| task.description = "finer".into()));

    let report = gateway.flush();
    assert_eq!(report.applied, 1);
    assert_eq!(report.failures.len(), 1);
    let failure = &report.failures[0];
    assert_eq!(failure.operation.action, Action::Delete);
    assert_eq!(failure.operation.id, doomed_id);
    assert!(matches!(
        failure.error,
        FlushError::Store(RepoError::InvalidData(_))
    ));

    assert!(gateway.pending_operations().is_empty());
    assert!(gateway.get::<Task>(doomed_id).is_some());
    assert_eq!(stored_task_description(&gateway, fine_id), "finer");
}

#[test]
fn update_after_delete_in_the_same_flush_is_not_cached() {
    let mut gateway = PersistenceGateway::with_store(ScriptedStore::new());
    let mut task = Task::urgent(NO_OWNER, "short lived");
    let id = gateway.create(&mut task).unwrap();

    gateway.delete(&task);
    assert!(gateway.update(&task));

    let report = gateway.flush();
    assert_eq!(report.applied, 1);
    assert!(matches!(report.failures[0].error, FlushError::NotCached));
    assert!(gateway.get::<Task>(id).is_none());
}

#[test]
fn load_all_reads_ownerless_interactions_and_reports_failed_reads() {
    let mut store = ScriptedStore::new();
    let mut contact = Contact::new("mary", "jackson");
    let owner = store.insert(EntityRef::Contact(&contact)).unwrap();
    contact.set_id(owner);
    store
        .insert(EntityRef::Interaction(&Interaction::new(
            NO_OWNER,
            InteractionType::ContactRemoved,
            "Contact removed: Someone",
            Date::from_ymd(2024, 1, 1).unwrap(),
        )))
        .unwrap();
    store
        .insert(EntityRef::Task(&Task::urgent(owner, "unreadable")))
        .unwrap();
    store.fail_list_tasks_of = Some(owner);

    let mut gateway = PersistenceGateway::with_store(store);
    let report = gateway.load_all();

    assert_eq!(report.contacts, 1);
    assert_eq!(report.interactions, 1);
    assert_eq!(report.tasks, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].scope, LoadScope::Tasks { owner_id: owner });
    assert!(gateway.get::<Contact>(owner).unwrap().tasks().is_empty());
    assert_eq!(gateway.interactions().owned_by(NO_OWNER).len(), 1);
}

#[test]
fn unreachable_database_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("rolodex.db");
    assert!(matches!(
        PersistenceGateway::open(&path),
        Err(FatalError::Open(_))
    ));
}
