//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate gateway calls into the workflows a host application runs.
//! - Keep hosts decoupled from caching and storage details.

pub mod contact_service;
