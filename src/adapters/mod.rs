//! Outbound delivery to provider callback endpoints.
//!
//! `Delivery` is the capability the orchestrator relies on: push a JSON
//! payload to a URL and report whether it landed. The HTTP implementation
//! lives in [`http`]; [`dispatcher`] runs deliveries off the request path.

pub mod dispatcher;
pub mod http;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use dispatcher::{DeliveryDispatcher, DeliveryJob, DispatchConfig, DispatchHandle, NotificationKind};
pub use http::HttpDelivery;

/// Why a delivery did not land
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Failed to POST to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("POST to {url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Trait for outbound notification transports
#[async_trait]
pub trait Delivery: Send + Sync {
    /// Human-readable transport name
    fn name(&self) -> &str;

    /// Deliver `payload` to `url`
    async fn deliver(&self, url: &str, payload: &Value) -> Result<(), DeliveryError>;
}
