//! Schema history of the contact store.
//!
//! # Responsibility
//! - List the contact/interaction/todo schema steps in version order.
//! - Bring a connection up to [`latest_version`] in one transaction.
//!
//! # Invariants
//! - Step versions start at 1 and grow by exactly one.
//! - `PRAGMA user_version` equals the last applied step.

use crate::db::{DbError, DbResult};
use log::{debug, info};
use rusqlite::{Connection, Transaction};

/// One schema step: `(version, name, script)`.
type Step = (u32, &'static str, &'static str);

const STEPS: &[Step] = &[
    (1, "init", include_str!("0001_init.sql")),
    (2, "owner_indexes", include_str!("0002_owner_indexes.sql")),
];

/// Schema version written by the newest step.
pub fn latest_version() -> u32 {
    STEPS.last().map_or(0, |(version, _, _)| *version)
}

/// Schema version currently recorded in `conn`.
pub fn current_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

/// Runs every step newer than the recorded version.
///
/// # Errors
/// - [`DbError::NewerSchema`] when the file is ahead of this build.
/// - [`DbError::Migration`] naming the step whose script failed; no step of
///   the batch is kept.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let found = current_version(conn)?;
    let supported = latest_version();
    if found > supported {
        return Err(DbError::NewerSchema { found, supported });
    }
    if found == supported {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for step in STEPS.iter().filter(|(version, _, _)| *version > found) {
        run_step(&tx, step)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={} to_version={}",
        found, supported
    );
    Ok(())
}

fn run_step(tx: &Transaction<'_>, &(version, name, script): &Step) -> DbResult<()> {
    tx.execute_batch(script)
        .and_then(|()| tx.pragma_update(None, "user_version", version))
        .map_err(|source| DbError::Migration {
            version,
            name,
            source,
        })?;
    debug!("event=db_migrate_step module=db status=ok version={version} name={name}");
    Ok(())
}
