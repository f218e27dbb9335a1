//! Registered healthcare providers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BrokerError, Result};

/// Kind of organisation behind a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderType {
    Hospital,
    Clinic,
    Lab,
    Pharmacy,
    Other,
}

impl Default for ProviderType {
    fn default() -> Self {
        Self::Other
    }
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hospital => "HOSPITAL",
            Self::Clinic => "CLINIC",
            Self::Lab => "LAB",
            Self::Pharmacy => "PHARMACY",
            Self::Other => "OTHER",
        }
    }
}

/// Inbound endpoints a provider exposes (informational only)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEndpoints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_request: Option<String>,
}

/// URLs the gateway pushes notifications to
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCallback {
    /// Receives new requests addressed to this provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_request: Option<String>,

    /// Receives completed responses to requests this provider made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_response: Option<String>,
}

/// A registered counterparty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    pub provider_id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub provider_type: ProviderType,
    pub base_url: String,
    #[serde(default)]
    pub endpoints: ProviderEndpoints,
    #[serde(default)]
    pub callback: ProviderCallback,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    /// Build a provider from validated registration input
    pub fn register(input: NewProvider, now: DateTime<Utc>) -> Self {
        Self {
            provider_id: input.provider_id,
            name: input.name,
            provider_type: input.provider_type.unwrap_or_default(),
            base_url: input.base_url,
            endpoints: input.endpoints,
            callback: input.callback,
            created_at: now,
            updated_at: now,
        }
    }

    /// Callback URL for new requests, if one is configured
    pub fn request_callback(&self) -> Option<&str> {
        non_blank(self.callback.patient_request.as_deref())
    }

    /// Callback URL for completed responses, if one is configured
    pub fn response_callback(&self) -> Option<&str> {
        non_blank(self.callback.patient_response.as_deref())
    }
}

/// Provider registration input
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProvider {
    #[serde(default)]
    pub provider_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub provider_type: Option<ProviderType>,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub endpoints: ProviderEndpoints,
    #[serde(default)]
    pub callback: ProviderCallback,
}

impl NewProvider {
    /// Presence checks for required fields
    pub fn validate(&self) -> Result<()> {
        if self.provider_id.trim().is_empty() || self.name.trim().is_empty() {
            return Err(BrokerError::validation("providerId and name are required"));
        }
        if self.base_url.trim().is_empty() {
            return Err(BrokerError::validation("baseUrl is required"));
        }
        if non_blank(self.callback.patient_response.as_deref()).is_none() {
            return Err(BrokerError::validation("callback.patientResponse is required"));
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
