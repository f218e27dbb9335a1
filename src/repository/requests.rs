//! Patient request persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::store::CollectionStore;
use crate::domain::{PatientRequest, RequestStatus};
use crate::error::{BrokerError, Entity, Result};

pub const COLLECTION: &str = "requests";

#[derive(Clone)]
pub struct RequestRepository {
    store: Arc<CollectionStore>,
}

impl RequestRepository {
    pub fn new(store: Arc<CollectionStore>) -> Self {
        Self { store }
    }

    pub async fn get_all(&self) -> Result<Vec<PatientRequest>> {
        Ok(self.store.load(COLLECTION).await?)
    }

    pub async fn get_by_id(&self, request_id: &str) -> Result<PatientRequest> {
        self.get_all()
            .await?
            .into_iter()
            .find(|r| r.request_id == request_id)
            .ok_or_else(|| BrokerError::not_found(Entity::Request, request_id))
    }

    pub async fn exists(&self, request_id: &str) -> Result<bool> {
        match self.get_by_id(request_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Requests addressed to `target_provider_id` with the given status,
    /// in insertion order
    pub async fn query_by_target_and_status(
        &self,
        target_provider_id: &str,
        status: RequestStatus,
    ) -> Result<Vec<PatientRequest>> {
        Ok(self
            .get_all()
            .await?
            .into_iter()
            .filter(|r| r.target_provider_id == target_provider_id && r.status == status)
            .collect())
    }

    pub async fn create(&self, request: PatientRequest) -> Result<()> {
        self.store
            .update(COLLECTION, move |requests: &mut Vec<PatientRequest>| {
                requests.push(request);
                Ok(())
            })
            .await
    }

    /// Replace the stored request with the same id
    pub async fn update(&self, request: PatientRequest) -> Result<()> {
        self.store
            .update(COLLECTION, move |requests: &mut Vec<PatientRequest>| {
                let slot = requests
                    .iter_mut()
                    .find(|r| r.request_id == request.request_id)
                    .ok_or_else(|| BrokerError::not_found(Entity::Request, &request.request_id))?;
                *slot = request;
                Ok(())
            })
            .await
    }

    /// Move a pending request to a terminal status.
    ///
    /// The check and the write happen under one collection lock, so at most
    /// one caller can resolve a given request. Returns the updated request.
    pub async fn resolve(
        &self,
        request_id: &str,
        status: RequestStatus,
        at: DateTime<Utc>,
    ) -> Result<PatientRequest> {
        self.store
            .update(COLLECTION, |requests: &mut Vec<PatientRequest>| {
                let request = requests
                    .iter_mut()
                    .find(|r| r.request_id == request_id)
                    .ok_or_else(|| BrokerError::not_found(Entity::Request, request_id))?;

                if request.status.is_terminal() {
                    return Err(BrokerError::AlreadyResolved {
                        request_id: request_id.to_string(),
                        status: request.status,
                    });
                }

                request.status = status;
                request.updated_at = at;
                Ok(request.clone())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewPatientRequest;
    use tempfile::TempDir;

    async fn create_test_repo() -> (RequestRepository, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = CollectionStore::open(temp.path()).await.unwrap();
        (RequestRepository::new(Arc::new(store)), temp)
    }

    fn request(id: &str, target: &str) -> PatientRequest {
        PatientRequest::pending(
            id.to_string(),
            NewPatientRequest {
                requestor_provider_id: "requestor".to_string(),
                target_provider_id: target.to_string(),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_query_preserves_insertion_order() {
        let (repo, _temp) = create_test_repo().await;

        repo.create(request("REQ-3", "b")).await.unwrap();
        repo.create(request("REQ-1", "b")).await.unwrap();
        repo.create(request("REQ-2", "c")).await.unwrap();
        repo.create(request("REQ-4", "b")).await.unwrap();
        repo.resolve("REQ-1", RequestStatus::Completed, Utc::now())
            .await
            .unwrap();

        let pending = repo
            .query_by_target_and_status("b", RequestStatus::Pending)
            .await
            .unwrap();
        let ids: Vec<_> = pending.iter().map(|r| r.request_id.as_str()).collect();
        assert_eq!(ids, vec!["REQ-3", "REQ-4"]);
    }

    #[tokio::test]
    async fn test_update_replaces_record() {
        let (repo, _temp) = create_test_repo().await;
        repo.create(request("REQ-1", "b")).await.unwrap();

        let mut changed = repo.get_by_id("REQ-1").await.unwrap();
        changed.correlation_key = Some("corr-9".to_string());
        repo.update(changed).await.unwrap();

        let stored = repo.get_by_id("REQ-1").await.unwrap();
        assert_eq!(stored.correlation_key.as_deref(), Some("corr-9"));
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (repo, _temp) = create_test_repo().await;
        let err = repo.update(request("REQ-404", "b")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!repo.exists("REQ-404").await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_only_once() {
        let (repo, _temp) = create_test_repo().await;
        repo.create(request("REQ-1", "b")).await.unwrap();

        let resolved = repo
            .resolve("REQ-1", RequestStatus::Failed, Utc::now())
            .await
            .unwrap();
        assert_eq!(resolved.status, RequestStatus::Failed);

        let err = repo
            .resolve("REQ-1", RequestStatus::Completed, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BrokerError::AlreadyResolved {
                status: RequestStatus::Failed,
                ..
            }
        ));
        assert_eq!(
            repo.get_by_id("REQ-1").await.unwrap().status,
            RequestStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_concurrent_creates_all_persist() {
        let (repo, _temp) = create_test_repo().await;

        let mut handles = Vec::new();
        for i in 0..20 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.create(request(&format!("REQ-{}", i), "b")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(repo.get_all().await.unwrap().len(), 20);
    }
}
