//! Provider persistence.

use std::sync::Arc;

use crate::core::store::CollectionStore;
use crate::domain::Provider;
use crate::error::{BrokerError, Entity, Result};

pub const COLLECTION: &str = "providers";

#[derive(Clone)]
pub struct ProviderRepository {
    store: Arc<CollectionStore>,
}

impl ProviderRepository {
    pub fn new(store: Arc<CollectionStore>) -> Self {
        Self { store }
    }

    pub async fn get_all(&self) -> Result<Vec<Provider>> {
        Ok(self.store.load(COLLECTION).await?)
    }

    pub async fn get_by_id(&self, provider_id: &str) -> Result<Provider> {
        self.get_all()
            .await?
            .into_iter()
            .find(|p| p.provider_id == provider_id)
            .ok_or_else(|| BrokerError::not_found(Entity::Provider, provider_id))
    }

    /// Whether a provider is registered. Storage errors still propagate.
    pub async fn exists(&self, provider_id: &str) -> Result<bool> {
        match self.get_by_id(provider_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Append a provider, rejecting duplicate ids
    pub async fn create(&self, provider: Provider) -> Result<()> {
        self.store
            .update(COLLECTION, move |providers: &mut Vec<Provider>| {
                if providers.iter().any(|p| p.provider_id == provider.provider_id) {
                    return Err(BrokerError::AlreadyExists(provider.provider_id));
                }
                providers.push(provider);
                Ok(())
            })
            .await
    }
}
