//! Patient-record requests and their lifecycle status.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, Result};

pub const DEFAULT_RESOURCE_TYPE: &str = "Patient";
pub const DEFAULT_FHIR_VERSION: &str = "4.0.1";

/// Status of an exchange. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl Default for RequestStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One system/value identifier pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientIdentifier {
    pub system: String,
    pub value: String,
}

/// Who the requestor is asking about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<PatientIdentifier>,
}

/// Shape of the record the requestor expects back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FhirConstraints {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub version: String,
}

impl Default for FhirConstraints {
    fn default() -> Self {
        Self {
            resource_type: DEFAULT_RESOURCE_TYPE.to_string(),
            version: DEFAULT_FHIR_VERSION.to_string(),
        }
    }
}

impl FhirConstraints {
    /// Fill blank fields with the defaults
    pub fn with_defaults(mut self) -> Self {
        if self.resource_type.trim().is_empty() {
            self.resource_type = DEFAULT_RESOURCE_TYPE.to_string();
        }
        if self.version.trim().is_empty() {
            self.version = DEFAULT_FHIR_VERSION.to_string();
        }
        self
    }
}

/// Free-text context for the request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RequestMetadata {
    pub fn is_empty(&self) -> bool {
        self.reason.is_none() && self.notes.is_none()
    }
}

/// One exchange instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRequest {
    pub request_id: String,
    pub requestor_provider_id: String,
    pub target_provider_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_key: Option<String>,
    #[serde(default)]
    pub patient_reference: PatientReference,
    #[serde(default)]
    pub fhir_constraints: FhirConstraints,
    #[serde(default, skip_serializing_if = "RequestMetadata::is_empty")]
    pub metadata: RequestMetadata,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PatientRequest {
    /// Create a pending request from validated input
    pub fn pending(request_id: String, input: NewPatientRequest, now: DateTime<Utc>) -> Self {
        Self {
            request_id,
            requestor_provider_id: input.requestor_provider_id,
            target_provider_id: input.target_provider_id,
            correlation_key: input.correlation_key.filter(|k| !k.is_empty()),
            patient_reference: input.patient_reference,
            fhir_constraints: input.fhir_constraints.unwrap_or_default().with_defaults(),
            metadata: input.metadata,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

/// Request creation input
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatientRequest {
    #[serde(default)]
    pub requestor_provider_id: String,
    #[serde(default)]
    pub target_provider_id: String,
    #[serde(default)]
    pub correlation_key: Option<String>,
    #[serde(default)]
    pub patient_reference: PatientReference,
    #[serde(default)]
    pub fhir_constraints: Option<FhirConstraints>,
    #[serde(default)]
    pub metadata: RequestMetadata,
}

impl NewPatientRequest {
    pub fn validate(&self) -> Result<()> {
        if self.requestor_provider_id.trim().is_empty()
            || self.target_provider_id.trim().is_empty()
        {
            return Err(BrokerError::validation(
                "requestorProviderId and targetProviderId are required",
            ));
        }
        Ok(())
    }
}

/// Result of polling for pending requests
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequests {
    pub target_provider_id: String,
    pub pending_requests: Vec<PatientRequest>,
    pub count: usize,
}

impl PendingRequests {
    pub fn new(target_provider_id: impl Into<String>, pending_requests: Vec<PatientRequest>) -> Self {
        let count = pending_requests.len();
        Self {
            target_provider_id: target_provider_id.into(),
            pending_requests,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fhir_defaults_fill_blanks() {
        let constraints = FhirConstraints {
            resource_type: String::new(),
            version: "5.0.0".to_string(),
        }
        .with_defaults();

        assert_eq!(constraints.resource_type, "Patient");
        assert_eq!(constraints.version, "5.0.0");
    }

    #[test]
    fn test_pending_request_applies_defaults() {
        let input = NewPatientRequest {
            requestor_provider_id: "a".to_string(),
            target_provider_id: "b".to_string(),
            correlation_key: Some(String::new()),
            ..Default::default()
        };

        let request = PatientRequest::pending("REQ-20260101-0001".to_string(), input, Utc::now());
        assert!(request.is_pending());
        assert_eq!(request.fhir_constraints, FhirConstraints::default());
        assert!(request.correlation_key.is_none());
    }

    #[test]
    fn test_validate_requires_both_providers() {
        let input = NewPatientRequest {
            requestor_provider_id: "a".to_string(),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_string(&RequestStatus::Completed).unwrap(),
            "\"COMPLETED\""
        );
        let parsed: RequestStatus = serde_json::from_str("\"FAILED\"").unwrap();
        assert!(parsed.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let input = NewPatientRequest {
            requestor_provider_id: "a".to_string(),
            target_provider_id: "b".to_string(),
            patient_reference: PatientReference {
                id: None,
                identifiers: vec![PatientIdentifier {
                    system: "urn:mrn".to_string(),
                    value: "12345".to_string(),
                }],
            },
            ..Default::default()
        };
        let request = PatientRequest::pending("REQ-20260101-0001".to_string(), input, Utc::now());

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["requestorProviderId"], "a");
        assert_eq!(value["fhirConstraints"]["resourceType"], "Patient");
        assert_eq!(value["patientReference"]["identifiers"][0]["value"], "12345");
        assert_eq!(value["status"], "PENDING");
        assert!(value.get("metadata").is_none());
    }
}
