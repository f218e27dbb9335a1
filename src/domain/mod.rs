//! Domain types for the gateway.
//!
//! This module contains the core data structures:
//! - Provider: registered counterparties and their callback URLs
//! - Request: patient-record requests and their status
//! - Response: answers from target providers and the status projection
//! - Notification: payloads pushed to callback URLs

pub mod notification;
pub mod provider;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use notification::{RequestNotification, ResponseNotification};
pub use provider::{NewProvider, Provider, ProviderCallback, ProviderEndpoints, ProviderType};
pub use request::{
    FhirConstraints, NewPatientRequest, PatientIdentifier, PatientReference, PatientRequest,
    PendingRequests, RequestMetadata, RequestStatus,
};
pub use response::{NewPatientResponse, PatientResponse, ResponseView};
