//! Responses delivered by target providers, and the status projection
//! served back to requestors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::{PatientRequest, RequestStatus};
use crate::error::{BrokerError, Result};

/// One delivered answer. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientResponse {
    pub request_id: String,
    pub from_provider_id: String,
    /// Opaque FHIR payload, never interpreted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fhir_patient: Option<Value>,
    pub status: RequestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Response ingestion input
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatientResponse {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub from_provider_id: String,
    #[serde(default)]
    pub fhir_patient: Option<Value>,
    #[serde(default)]
    pub status: Option<RequestStatus>,
    #[serde(default)]
    pub error: Option<String>,
}

impl NewPatientResponse {
    pub fn validate(&self) -> Result<()> {
        if self.request_id.trim().is_empty() || self.from_provider_id.trim().is_empty() {
            return Err(BrokerError::validation(
                "requestId and fromProviderId are required",
            ));
        }
        if self.status == Some(RequestStatus::Pending) {
            return Err(BrokerError::validation(
                "status must be COMPLETED or FAILED",
            ));
        }
        Ok(())
    }

    /// Status to record; COMPLETED when the sender omitted it
    pub fn status(&self) -> RequestStatus {
        self.status.unwrap_or(RequestStatus::Completed)
    }

    pub fn into_response(self, received_at: DateTime<Utc>) -> PatientResponse {
        let status = self.status();
        PatientResponse {
            request_id: self.request_id,
            from_provider_id: self.from_provider_id,
            fhir_patient: self.fhir_patient,
            status,
            error: self.error.filter(|e| !e.is_empty()),
            received_at,
        }
    }
}

/// Status projection for a request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseView {
    pub request_id: String,
    pub requestor_provider_id: String,
    pub target_provider_id: String,
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fhir_patient: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ResponseView {
    /// Request-level projection without any response fields
    pub fn of_request(request: &PatientRequest) -> Self {
        Self {
            request_id: request.request_id.clone(),
            requestor_provider_id: request.requestor_provider_id.clone(),
            target_provider_id: request.target_provider_id.clone(),
            status: request.status,
            fhir_patient: None,
            error: None,
            completed_at: None,
        }
    }

    pub fn with_response(mut self, response: PatientResponse) -> Self {
        self.fhir_patient = response.fhir_patient;
        self.error = response.error;
        self.completed_at = Some(response.received_at);
        self
    }
}
