use rolodex_core::interchange::Orphan;
use rolodex_core::{
    export_to_path, import_batch, import_from_path, Contact, Date, Entity, EntityKind,
    Interaction, InteractionType, InterchangeDocument, PersistenceGateway, RecordError, Task,
    NO_OWNER,
};
use serde_json::Value;

fn populated_gateway() -> PersistenceGateway {
    let mut gateway = PersistenceGateway::open_in_memory().unwrap();

    let mut ada = Contact::new("ada", "lovelace");
    ada.set_company("analytical engines");
    ada.set_email("ada@example.com");
    ada.set_note("@todo Send notes @date 10/12/2025");
    ada.set_creation_date(Date::from_ymd(2024, 5, 1).unwrap());
    let ada_id = gateway.create(&mut ada).unwrap();

    gateway
        .create(&mut Task::new(ada_id, "Send notes ", Date::from_ymd(2025, 12, 10).unwrap()))
        .unwrap();
    gateway
        .create(&mut Task::urgent(ada_id, r#"Reply to "Charles""#))
        .unwrap();
    gateway
        .create(&mut Interaction::new(
            ada_id,
            InteractionType::ContactAdded,
            "Contact created: Lovelace Ada",
            Date::from_ymd(2024, 5, 1).unwrap(),
        ))
        .unwrap();
    gateway
        .create(&mut Interaction::new(
            NO_OWNER,
            InteractionType::ContactRemoved,
            "Contact removed: Babbage Charles",
            Date::from_ymd(2024, 6, 2).unwrap(),
        ))
        .unwrap();
    gateway
}

#[test]
fn export_writes_flat_string_records() {
    let gateway = populated_gateway();
    let json = InterchangeDocument::from_gateway(&gateway).to_json().unwrap();
    let parsed: Value = serde_json::from_str(&json).unwrap();
    let records = parsed.as_array().unwrap();

    assert_eq!(records.len(), 5);
    assert_eq!(records[0]["object_type"], "contact");
    assert_eq!(records[1]["object_type"], "todo");
    assert_eq!(records[3]["object_type"], "interaction");
    assert_eq!(records[0]["creation_date"], "2024-05-01");
    assert!(records
        .iter()
        .flat_map(|record| record.as_object().unwrap().values())
        .all(Value::is_string));
}

#[test]
fn export_then_import_preserves_entities_modulo_ids() {
    let source = populated_gateway();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    assert_eq!(export_to_path(&source, &path).unwrap(), 5);

    let mut target = PersistenceGateway::open_in_memory().unwrap();
    target
        .create(&mut Contact::new("someone", "already here"))
        .unwrap();
    let report = import_from_path(&mut target, &path).unwrap();
    assert_eq!(
        (report.contacts, report.interactions, report.tasks),
        (1, 2, 2)
    );
    assert!(report.rejected.is_empty());
    assert!(report.orphans.is_empty());

    let imported = target.contacts().search_by_name("Lovelace");
    assert_eq!(imported.len(), 1);
    let ada = imported.iter().next().unwrap();
    let original = source.contacts().iter().next().unwrap();
    assert_ne!(ada.id(), original.id());
    assert_eq!(ada.company(), "Analytical engines");
    assert_eq!(ada.email(), original.email());
    assert_eq!(ada.note(), original.note());
    assert_eq!(ada.creation_date(), original.creation_date());

    let descriptions: Vec<_> = ada
        .tasks()
        .iter()
        .map(|task| (task.description.clone(), task.is_urgent()))
        .collect();
    assert_eq!(
        descriptions,
        vec![
            ("Send notes ".to_string(), false),
            (r#"Reply to "Charles""#.to_string(), true)
        ]
    );
    assert_eq!(ada.interactions().len(), 1);
    assert_eq!(
        ada.interactions().iter().next().unwrap().kind,
        InteractionType::ContactAdded
    );

    let removal = target.interactions().owned_by(NO_OWNER);
    assert_eq!(removal.len(), 1);
    assert_eq!(
        removal.iter().next().unwrap().description,
        "Contact removed: Babbage Charles"
    );
}

#[test]
fn record_missing_description_is_skipped_without_aborting() {
    let document = InterchangeDocument::from_json(
        r#"[
            {"object_type": "contact", "id": "7", "first_name": "grace", "last_name": "hopper",
             "company": "", "phone": "", "email": "", "creation_date": "2020-01-01", "note": ""},
            {"object_type": "todo", "id": "1", "owner_id": "7", "date": "2025-01-01"},
            {"object_type": "todo", "id": "2", "owner_id": "7", "description": "Debug", "date": "1970-01-01"}
        ]"#,
    )
    .unwrap();
    let batch = document.decode();
    assert_eq!(batch.rejected.len(), 1);
    assert_eq!(batch.rejected[0].index, 1);
    assert_eq!(
        batch.rejected[0].error,
        RecordError::MissingField("description")
    );

    let mut gateway = PersistenceGateway::open_in_memory().unwrap();
    let report = import_batch(&mut gateway, batch);
    assert_eq!((report.contacts, report.tasks), (1, 1));
    assert_eq!(report.rejected.len(), 1);

    let grace = gateway.contacts().iter().next().unwrap();
    let task = grace.tasks().iter().next().unwrap();
    assert_eq!(task.description, "Debug");
    assert_eq!(task.owner_id, grace.id());
    assert!(task.is_urgent());
}

#[test]
fn owned_records_without_their_owner_are_orphans() {
    let document = InterchangeDocument::from_json(
        r#"[
            {"object_type": "interaction", "id": "3", "owner_id": "42", "type": "2",
             "description": "edited", "date": "2024-03-03"},
            {"object_type": "todo", "id": "4", "owner_id": "-1", "description": "loose", "date": "2024-03-04"}
        ]"#,
    )
    .unwrap();

    let mut gateway = PersistenceGateway::open_in_memory().unwrap();
    let report = import_batch(&mut gateway, document.decode());

    assert_eq!(
        report.orphans,
        vec![Orphan {
            kind: EntityKind::Interaction,
            id: 3,
            owner_id: 42
        }]
    );
    assert_eq!(report.tasks, 1);
    assert_eq!(gateway.tasks().owned_by(NO_OWNER).len(), 1);
    assert!(gateway.interactions().is_empty());
}
