//! Request lifecycle orchestrator.
//!
//! Coordinates provider registration, request creation, response
//! ingestion and status projection. State is always persisted before a
//! notification is queued, and notification outcomes never reach the
//! caller.
//!
//! ```text
//! create_request ──► PENDING ──receive_response──► COMPLETED | FAILED
//!        │                              │
//!        └─► push to target             └─► push to requestor (COMPLETED only)
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{DeliveryDispatcher, DeliveryJob, NotificationKind};
use crate::domain::{
    NewPatientRequest, NewPatientResponse, NewProvider, PatientRequest, PatientResponse,
    PendingRequests, Provider, RequestNotification, RequestStatus, ResponseNotification,
    ResponseView,
};
use crate::error::{BrokerError, Result};
use crate::repository::{ProviderRepository, RequestRepository, ResponseRepository};

use super::request_id::RequestIdGenerator;
use super::store::CollectionStore;

/// Main request broker
pub struct Orchestrator {
    providers: ProviderRepository,
    requests: RequestRepository,
    responses: ResponseRepository,
    request_ids: RequestIdGenerator,
    dispatcher: DeliveryDispatcher,
    /// Serializes response ingestion across the two collections
    ingest: Mutex<()>,
}

impl Orchestrator {
    /// Create an orchestrator over an open store
    pub fn new(store: Arc<CollectionStore>, dispatcher: DeliveryDispatcher) -> Self {
        Self {
            providers: ProviderRepository::new(store.clone()),
            requests: RequestRepository::new(store.clone()),
            responses: ResponseRepository::new(store.clone()),
            request_ids: RequestIdGenerator::new(store),
            dispatcher,
            ingest: Mutex::new(()),
        }
    }

    /// Register a new provider
    #[instrument(skip(self, input), fields(provider_id = %input.provider_id))]
    pub async fn register_provider(&self, input: NewProvider) -> Result<Provider> {
        input.validate()?;

        let provider = Provider::register(input, Utc::now());
        self.providers.create(provider.clone()).await?;

        info!(provider_type = ?provider.provider_type, "Provider registered");
        Ok(provider)
    }

    pub async fn get_provider(&self, provider_id: &str) -> Result<Provider> {
        self.providers.get_by_id(provider_id).await
    }

    pub async fn list_providers(&self) -> Result<Vec<Provider>> {
        self.providers.get_all().await
    }

    /// Record a new PENDING request and notify the target
    #[instrument(
        skip(self, input),
        fields(
            requestor = %input.requestor_provider_id,
            target = %input.target_provider_id
        )
    )]
    pub async fn create_request(&self, input: NewPatientRequest) -> Result<PatientRequest> {
        input.validate()?;

        self.find_provider(&input.requestor_provider_id, BrokerError::RequestorNotFound)
            .await?;
        let target = self
            .find_provider(&input.target_provider_id, BrokerError::TargetNotFound)
            .await?;

        let now = Utc::now();
        let request_id = self.request_ids.next(now).await?;
        let request = PatientRequest::pending(request_id, input, now);

        self.requests.create(request.clone()).await?;
        info!(request_id = %request.request_id, "Patient request created");

        match target.request_callback() {
            Some(url) => self.dispatch(
                NotificationKind::RequestCreated,
                &request.request_id,
                url,
                RequestNotification::from(&request),
            ),
            None => debug!(
                request_id = %request.request_id,
                "Target has no patientRequest callback, leaving request for polling"
            ),
        }

        Ok(request)
    }

    /// Record the target's answer and resolve the request.
    ///
    /// The response is stored before the request leaves PENDING. If the
    /// status change cannot be written the stored response is withdrawn, so
    /// a failed call leaves the request PENDING and the sender can retry.
    #[instrument(
        skip(self, input),
        fields(request_id = %input.request_id, from = %input.from_provider_id)
    )]
    pub async fn receive_response(&self, input: NewPatientResponse) -> Result<PatientResponse> {
        input.validate()?;

        let _ingest = self.ingest.lock().await;

        let request = self.requests.get_by_id(&input.request_id).await?;
        if request.target_provider_id != input.from_provider_id {
            warn!(expected = %request.target_provider_id, "Response from unexpected provider");
            return Err(BrokerError::SenderMismatch {
                request_id: request.request_id,
                expected: request.target_provider_id,
                actual: input.from_provider_id,
            });
        }
        if request.status.is_terminal() {
            return Err(BrokerError::AlreadyResolved {
                request_id: request.request_id,
                status: request.status,
            });
        }

        let now = Utc::now();
        let status = input.status();
        let response = input.into_response(now);
        self.responses.replace_for_request(response.clone()).await?;

        let resolved = match self.requests.resolve(&request.request_id, status, now).await {
            Ok(resolved) => resolved,
            Err(e) => {
                if let Err(rollback) = self.responses.remove_for_request(&request.request_id).await {
                    error!(error = %rollback, "Failed to withdraw response after status update failed");
                }
                return Err(e);
            }
        };
        info!(%status, "Patient response recorded");

        if status == RequestStatus::Completed {
            self.notify_requestor(&resolved, &response).await;
        }

        Ok(response)
    }

    /// Status projection for a request. Response fields appear only once
    /// the request is terminal.
    pub async fn get_response(&self, request_id: &str) -> Result<ResponseView> {
        let request = self.requests.get_by_id(request_id).await?;
        let view = ResponseView::of_request(&request);

        if request.is_pending() {
            return Ok(view);
        }

        match self.responses.get_by_request_id(request_id).await {
            Ok(response) => Ok(view.with_response(response)),
            Err(e) if e.is_not_found() => {
                warn!(request_id, status = %request.status, "Terminal request has no stored response");
                Ok(view)
            }
            Err(e) => Err(e),
        }
    }

    /// All PENDING requests addressed to a target, oldest first
    pub async fn pending_requests_for_target(&self, target_provider_id: &str) -> Result<PendingRequests> {
        if !self.providers.exists(target_provider_id).await? {
            return Err(BrokerError::TargetNotFound(target_provider_id.to_string()));
        }

        let pending = self
            .requests
            .query_by_target_and_status(target_provider_id, RequestStatus::Pending)
            .await?;

        Ok(PendingRequests::new(target_provider_id, pending))
    }

    async fn find_provider(
        &self,
        provider_id: &str,
        on_missing: fn(String) -> BrokerError,
    ) -> Result<Provider> {
        match self.providers.get_by_id(provider_id).await {
            Ok(provider) => Ok(provider),
            Err(e) if e.is_not_found() => Err(on_missing(provider_id.to_string())),
            Err(e) => Err(e),
        }
    }

    async fn notify_requestor(&self, request: &PatientRequest, response: &PatientResponse) {
        let requestor = match self.providers.get_by_id(&request.requestor_provider_id).await {
            Ok(requestor) => requestor,
            Err(e) => {
                warn!(
                    requestor = %request.requestor_provider_id,
                    error = %e,
                    "Cannot notify requestor"
                );
                return;
            }
        };

        match requestor.response_callback() {
            Some(url) => self.dispatch(
                NotificationKind::ResponseReady,
                &request.request_id,
                url,
                ResponseNotification::new(response, &requestor.provider_id),
            ),
            None => warn!(
                requestor = %requestor.provider_id,
                "Requestor has no patientResponse callback configured"
            ),
        }
    }

    fn dispatch(&self, kind: NotificationKind, request_id: &str, url: &str, payload: impl Serialize) {
        let payload = match serde_json::to_value(payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(%kind, request_id, error = %e, "Failed to serialize notification");
                return;
            }
        };

        self.dispatcher.enqueue(DeliveryJob {
            kind,
            request_id: request_id.to_string(),
            url: url.to_string(),
            payload,
        });
    }
}
