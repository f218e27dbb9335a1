//! wah4pc-gateway - patient record request broker
//!
//! Brokers patient-record requests between independent healthcare
//! providers. A requestor asks a target provider for a patient; the target
//! answers asynchronously and the gateway pushes the result back to the
//! requestor's callback.
//!
//! # Architecture
//!
//! - Every record lives in a named collection persisted as a JSON snapshot
//! - Request state only moves `PENDING -> COMPLETED | FAILED`, exactly once
//! - Callback pushes run on a bounded background dispatcher and never
//!   affect the outcome of an API call
//!
//! # Modules
//!
//! - `adapters`: Outbound delivery (HTTP, dispatcher)
//! - `api`: axum HTTP surface
//! - `core`: Store, request ids and the Orchestrator
//! - `domain`: Data structures (Provider, PatientRequest, PatientResponse)
//! - `repository`: Typed access to each collection
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the gateway
//! wah4pc-gateway serve --address 0.0.0.0:3043
//!
//! # Inspect a request
//! wah4pc-gateway status REQ-20260101-0001
//! ```

pub mod adapters;
pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod repository;

// Re-export main types at crate root for convenience
pub use crate::core::{CollectionStore, Orchestrator};
pub use domain::{PatientRequest, PatientResponse, Provider, RequestStatus, ResponseView};
pub use error::{BrokerError, Result};
