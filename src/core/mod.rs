//! Core broker logic.
//!
//! This module contains:
//! - CollectionStore: file-backed snapshot store with per-collection locking
//! - RequestIdGenerator: persisted `REQ-<date>-<seq>` identifiers
//! - Orchestrator: request lifecycle and provider operations

pub mod orchestrator;
pub mod request_id;
pub mod store;

// Re-export commonly used types
pub use orchestrator::Orchestrator;
pub use request_id::{format_request_id, RequestIdGenerator};
pub use store::{CollectionStore, StoreError};
