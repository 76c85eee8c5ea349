//! JSON export/import of contacts, interactions and tasks.
//!
//! # Responsibility
//! - Encode cached entities as one flat JSON array of string records.
//! - Decode such a document record by record and import it through the
//!   gateway, re-linking owned records to the ids their owners receive.
//!
//! # Invariants
//! - One malformed record never aborts a document; it is logged, reported
//!   and skipped.
//! - Only a document that is not a JSON array fails as a whole.
//! - Imported entities always receive fresh ids from the store.

use crate::collection::EntityCollection;
use crate::gateway::{Cached, PersistenceGateway};
use crate::model::contact::Contact;
use crate::model::interaction::Interaction;
use crate::model::record::{Record, RecordError, OBJECT_TYPE_KEY};
use crate::model::task::Task;
use crate::model::{Entity, EntityId, EntityKind, Owned, NO_OWNER};
use crate::repo::store::{RepoError, Store};
use log::{info, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

/// Document-level failure.
#[derive(Debug)]
pub enum InterchangeError {
    Io { path: PathBuf, source: std::io::Error },
    Json(serde_json::Error),
    NotAnArray,
}

impl Display for InterchangeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "{}: {source}", path.display()),
            Self::Json(err) => write!(f, "invalid interchange document: {err}"),
            Self::NotAnArray => write!(f, "interchange document must be a JSON array"),
        }
    }
}

impl Error for InterchangeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json(err) => Some(err),
            Self::NotAnArray => None,
        }
    }
}

impl From<serde_json::Error> for InterchangeError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

/// Record skipped while reading a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    /// Position of the record in the document array.
    pub index: usize,
    pub error: RecordError,
}

/// Parsed interchange document.
#[derive(Debug, Clone, Default)]
pub struct InterchangeDocument {
    records: Vec<(usize, Record)>,
    rejected: Vec<RejectedRecord>,
}

impl InterchangeDocument {
    /// Builds the export document: every contact, every task owned by one
    /// of them and every interaction.
    pub fn from_collections(
        contacts: &EntityCollection<Contact>,
        interactions: &EntityCollection<Interaction>,
        tasks: &EntityCollection<Task>,
    ) -> Self {
        let mut records: Vec<Record> = contacts.iter().map(Entity::to_record).collect();
        for contact in contacts {
            records.extend(tasks.owned_by(contact.id()).iter().map(Entity::to_record));
        }
        records.extend(interactions.iter().map(Entity::to_record));
        Self {
            records: records.into_iter().enumerate().collect(),
            rejected: Vec::new(),
        }
    }

    pub fn from_gateway<S: Store>(gateway: &PersistenceGateway<S>) -> Self {
        Self::from_collections(gateway.contacts(), gateway.interactions(), gateway.tasks())
    }

    /// Parses a JSON array of flat objects.
    ///
    /// Elements that are not objects, or that hold nested or null values,
    /// are kept as rejections rather than failing the document.
    pub fn from_json(text: &str) -> Result<Self, InterchangeError> {
        let Value::Array(elements) = serde_json::from_str::<Value>(text)? else {
            return Err(InterchangeError::NotAnArray);
        };

        let mut document = Self::default();
        for (index, element) in elements.into_iter().enumerate() {
            match flatten(element) {
                Ok(record) => document.records.push((index, record)),
                Err(error) => document.rejected.push(RejectedRecord { index, error }),
            }
        }
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String, InterchangeError> {
        let records: Vec<&Record> = self.records.iter().map(|(_, record)| record).collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().map(|(_, record)| record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Decodes every record into its entity kind.
    pub fn decode(&self) -> DecodedBatch {
        let mut batch = DecodedBatch {
            rejected: self.rejected.clone(),
            ..DecodedBatch::default()
        };

        for (index, record) in &self.records {
            if let Err(error) = batch.push_record(record) {
                batch.rejected.push(RejectedRecord {
                    index: *index,
                    error,
                });
            }
        }

        for rejected in &batch.rejected {
            warn!(
                "event=interchange_decode module=interchange status=rejected index={} error={}",
                rejected.index, rejected.error
            );
        }
        batch.rejected.sort_by_key(|rejected| rejected.index);
        batch
    }
}

/// Entities decoded from a document, grouped by kind, in document order.
#[derive(Debug, Clone, Default)]
pub struct DecodedBatch {
    pub contacts: Vec<Contact>,
    pub interactions: Vec<Interaction>,
    pub tasks: Vec<Task>,
    pub rejected: Vec<RejectedRecord>,
}

impl DecodedBatch {
    fn push_record(&mut self, record: &Record) -> Result<(), RecordError> {
        let object_type = record
            .get(OBJECT_TYPE_KEY)
            .ok_or(RecordError::MissingField(OBJECT_TYPE_KEY))?;
        match EntityKind::from_object_type(object_type) {
            Some(EntityKind::Contact) => self.contacts.push(Contact::from_record(record)?),
            Some(EntityKind::Interaction) => {
                self.interactions.push(Interaction::from_record(record)?)
            }
            Some(EntityKind::Task) => self.tasks.push(Task::from_record(record)?),
            None => return Err(RecordError::UnknownObjectType(object_type.clone())),
        }
        Ok(())
    }
}

/// Owned record whose owner was not part of the imported batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orphan {
    pub kind: EntityKind,
    pub id: EntityId,
    pub owner_id: EntityId,
}

/// Record the store refused during import.
#[derive(Debug)]
pub struct ImportFailure {
    pub kind: EntityKind,
    /// Id the record carried in the document.
    pub id: EntityId,
    pub error: RepoError,
}

/// Outcome of [`import_batch`].
#[derive(Debug, Default)]
pub struct ImportReport {
    pub contacts: usize,
    pub interactions: usize,
    pub tasks: usize,
    pub rejected: Vec<RejectedRecord>,
    pub orphans: Vec<Orphan>,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn created(&self) -> usize {
        self.contacts + self.interactions + self.tasks
    }
}

/// Creates every entity of `batch` through `gateway`.
///
/// Contacts are created first; the id each receives replaces its document id
/// in the `owner_id` of the interactions and tasks that referenced it.
/// Unowned interactions and tasks are created unowned. Owned records whose
/// owner is not in the batch are reported as orphans and skipped.
pub fn import_batch<S: Store>(
    gateway: &mut PersistenceGateway<S>,
    batch: DecodedBatch,
) -> ImportReport {
    let mut report = ImportReport {
        rejected: batch.rejected,
        ..ImportReport::default()
    };
    let mut new_ids: HashMap<EntityId, EntityId> = HashMap::new();

    for mut contact in batch.contacts {
        let old_id = contact.id();
        match gateway.create(&mut contact) {
            Ok(new_id) => {
                if old_id != NO_OWNER {
                    new_ids.insert(old_id, new_id);
                }
                report.contacts += 1;
            }
            Err(error) => report.failures.push(ImportFailure {
                kind: EntityKind::Contact,
                id: old_id,
                error,
            }),
        }
    }

    for interaction in batch.interactions {
        if import_owned(gateway, interaction, &new_ids, &mut report) {
            report.interactions += 1;
        }
    }
    for task in batch.tasks {
        if import_owned(gateway, task, &new_ids, &mut report) {
            report.tasks += 1;
        }
    }

    info!(
        "event=interchange_import module=interchange status={} contacts={} interactions={} tasks={} rejected={} orphans={} failed={}",
        if report.failures.is_empty() { "ok" } else { "partial" },
        report.contacts,
        report.interactions,
        report.tasks,
        report.rejected.len(),
        report.orphans.len(),
        report.failures.len()
    );
    report
}

fn import_owned<S: Store, T: Cached + Owned>(
    gateway: &mut PersistenceGateway<S>,
    mut entity: T,
    new_ids: &HashMap<EntityId, EntityId>,
    report: &mut ImportReport,
) -> bool {
    let old_id = entity.id();
    let owner_id = entity.owner_id();
    if owner_id != NO_OWNER {
        let Some(new_owner) = new_ids.get(&owner_id) else {
            warn!(
                "event=interchange_import module=interchange status=orphan kind={} id={} owner_id={}",
                T::KIND.object_type(),
                old_id,
                owner_id
            );
            report.orphans.push(Orphan {
                kind: T::KIND,
                id: old_id,
                owner_id,
            });
            return false;
        };
        entity.set_owner_id(*new_owner);
    }

    match gateway.create(&mut entity) {
        Ok(_) => true,
        Err(error) => {
            report.failures.push(ImportFailure {
                kind: T::KIND,
                id: old_id,
                error,
            });
            false
        }
    }
}

/// Writes the export document of `gateway` to `path`; returns the record count.
pub fn export_to_path<S: Store>(
    gateway: &PersistenceGateway<S>,
    path: impl AsRef<Path>,
) -> Result<usize, InterchangeError> {
    let path = path.as_ref();
    let document = InterchangeDocument::from_gateway(gateway);
    fs::write(path, document.to_json()?).map_err(|source| InterchangeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(
        "event=interchange_export module=interchange status=ok records={}",
        document.len()
    );
    Ok(document.len())
}

/// Reads, decodes and imports the document at `path`.
pub fn import_from_path<S: Store>(
    gateway: &mut PersistenceGateway<S>,
    path: impl AsRef<Path>,
) -> Result<ImportReport, InterchangeError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| InterchangeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let batch = InterchangeDocument::from_json(&text)?.decode();
    Ok(import_batch(gateway, batch))
}

/// Flattens one array element into a string record.
fn flatten(element: Value) -> Result<Record, RecordError> {
    let Value::Object(fields) = element else {
        return Err(RecordError::NotAnObject);
    };
    fields
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => Ok((key, text)),
            Value::Number(number) => Ok((key, number.to_string())),
            Value::Bool(flag) => Ok((key, flag.to_string())),
            Value::Null | Value::Array(_) | Value::Object(_) => {
                Err(RecordError::NonScalarValue(key))
            }
        })
        .collect()
}
