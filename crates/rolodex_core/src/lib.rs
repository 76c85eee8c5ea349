//! Core domain logic for Rolodex, a personal contact and task tracker.
//! This crate is the single source of truth for business invariants.

pub mod collection;
pub mod config;
pub mod db;
pub mod gateway;
pub mod interchange;
pub mod logging;
pub mod model;
pub mod parser;
pub mod repo;
pub mod sanitize;
pub mod service;

pub use collection::EntityCollection;
pub use config::{ConfigError, RolodexConfig};
pub use gateway::{
    Action, Cached, FatalError, FlushReport, LoadReport, PersistenceGateway, QueuedOperation,
};
pub use interchange::{
    export_to_path, import_batch, import_from_path, DecodedBatch, ImportReport,
    InterchangeDocument, InterchangeError,
};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget, LoggingError};
pub use model::contact::Contact;
pub use model::date::{Date, DateParseError};
pub use model::interaction::{Interaction, InteractionType};
pub use model::record::{Record, RecordError};
pub use model::task::Task;
pub use model::{Entity, EntityId, EntityKind, Owned, NO_OWNER, UNPERSISTED_ID};
pub use parser::task_extract::extract_tasks;
pub use repo::store::{RepoError, RepoResult, SqliteStore, Store};
pub use service::contact_service::{
    ContactChange, ContactService, HistoryFilter, ServiceError, Statistics, TaskFilter, TaskRow,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
