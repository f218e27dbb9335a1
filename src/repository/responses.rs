//! Patient response persistence. Append-only.

use std::sync::Arc;

use crate::core::store::CollectionStore;
use crate::domain::PatientResponse;
use crate::error::{BrokerError, Entity, Result};

pub const COLLECTION: &str = "responses";

#[derive(Clone)]
pub struct ResponseRepository {
    store: Arc<CollectionStore>,
}

impl ResponseRepository {
    pub fn new(store: Arc<CollectionStore>) -> Self {
        Self { store }
    }

    pub async fn get_all(&self) -> Result<Vec<PatientResponse>> {
        Ok(self.store.load(COLLECTION).await?)
    }

    /// First response recorded for a request
    pub async fn get_by_request_id(&self, request_id: &str) -> Result<PatientResponse> {
        self.get_all()
            .await?
            .into_iter()
            .find(|r| r.request_id == request_id)
            .ok_or_else(|| BrokerError::not_found(Entity::Response, request_id))
    }

    pub async fn exists(&self, request_id: &str) -> Result<bool> {
        match self.get_by_request_id(request_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn create(&self, response: PatientResponse) -> Result<()> {
        self.store
            .update(COLLECTION, move |responses: &mut Vec<PatientResponse>| {
                responses.push(response);
                Ok(())
            })
            .await
    }

    /// Append a response, dropping any earlier one for the same request
    pub async fn replace_for_request(&self, response: PatientResponse) -> Result<()> {
        self.store
            .update(COLLECTION, move |responses: &mut Vec<PatientResponse>| {
                responses.retain(|r| r.request_id != response.request_id);
                responses.push(response);
                Ok(())
            })
            .await
    }

    /// Delete every response for a request. Returns how many were removed.
    pub async fn remove_for_request(&self, request_id: &str) -> Result<usize> {
        self.store
            .update(COLLECTION, |responses: &mut Vec<PatientResponse>| {
                let before = responses.len();
                responses.retain(|r| r.request_id != request_id);
                Ok(before - responses.len())
            })
            .await
    }
}
