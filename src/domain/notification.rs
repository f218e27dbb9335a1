//! Payloads the gateway pushes to provider callback URLs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::request::{FhirConstraints, PatientReference, PatientRequest, RequestMetadata, RequestStatus};
use super::response::PatientResponse;

/// Sent to the target provider when a request is created
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestNotification {
    pub request_id: String,
    pub requestor_provider_id: String,
    pub target_provider_id: String,
    pub patient_reference: PatientReference,
    pub fhir_constraints: FhirConstraints,
    #[serde(skip_serializing_if = "RequestMetadata::is_empty")]
    pub metadata: RequestMetadata,
    pub created_at: DateTime<Utc>,
}

impl From<&PatientRequest> for RequestNotification {
    fn from(request: &PatientRequest) -> Self {
        Self {
            request_id: request.request_id.clone(),
            requestor_provider_id: request.requestor_provider_id.clone(),
            target_provider_id: request.target_provider_id.clone(),
            patient_reference: request.patient_reference.clone(),
            fhir_constraints: request.fhir_constraints.clone(),
            metadata: request.metadata.clone(),
            created_at: request.created_at,
        }
    }
}

/// Sent to the requestor once the target has answered
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseNotification {
    pub request_id: String,
    pub from_provider_id: String,
    pub to_provider_id: String,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_patient: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseNotification {
    pub fn new(response: &PatientResponse, to_provider_id: impl Into<String>) -> Self {
        Self {
            request_id: response.request_id.clone(),
            from_provider_id: response.from_provider_id.clone(),
            to_provider_id: to_provider_id.into(),
            status: response.status,
            fhir_patient: response.fhir_patient.clone(),
            error: response.error.clone(),
        }
    }
}
