//! Free-text parsers producing domain entities.
//!
//! # Invariants
//! - Parsers are total: malformed input degrades, it never errors.

pub mod task_extract;
