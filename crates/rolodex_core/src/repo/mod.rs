//! Persistence boundary between entities and SQLite.
//!
//! # Responsibility
//! - Define the [`store::Store`] contract used by the gateway.
//! - Keep SQLite query details out of caching and use-case code.
//!
//! # Invariants
//! - Store APIs return semantic errors (`NotFound`, `InvalidData`) in
//!   addition to DB transport errors.

pub mod store;
