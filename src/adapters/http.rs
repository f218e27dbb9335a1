//! HTTP delivery: POST JSON to the callback URL.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{Delivery, DeliveryError};

/// Default per-call timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers payloads with a single POST. No retries.
pub struct HttpDelivery {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for HttpDelivery {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl HttpDelivery {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    fn name(&self) -> &str {
        "http"
    }

    async fn deliver(&self, url: &str, payload: &Value) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|source| DeliveryError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(DeliveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_timeout() {
        let delivery = HttpDelivery::default();
        assert_eq!(delivery.name(), "http");
        assert_eq!(delivery.timeout(), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let delivery = HttpDelivery::new(Duration::from_secs(2));
        let err = delivery
            .deliver(&format!("http://{}/callback", addr), &json!({"requestId": "REQ-1"}))
            .await
            .unwrap_err();
        // An HTTP proxy in the environment answers with 5xx instead
        assert!(matches!(
            err,
            DeliveryError::Transport { .. } | DeliveryError::Status { .. }
        ));
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        use axum::{http::StatusCode, routing::post, Router};

        let app = Router::new().route("/callback", post(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let delivery = HttpDelivery::new(Duration::from_secs(5));
        let err = delivery
            .deliver(&format!("http://{}/callback", addr), &json!({"requestId": "REQ-1"}))
            .await
            .unwrap_err();
        match err {
            DeliveryError::Status { status, .. } => assert!(status >= 400),
            other => panic!("expected status error, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_successful_post_delivers_body() {
        use axum::{http::StatusCode, routing::post, Json, Router};
        use tokio::sync::mpsc;

        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let app = Router::new().route(
            "/callback",
            post(move |Json(body): Json<Value>| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(body);
                    StatusCode::OK
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let payload = json!({
            "requestId": "REQ-1",
            "fhirPatient": {"resourceType": "Patient", "id": "p-1"},
        });
        let delivery = HttpDelivery::new(Duration::from_secs(5));
        delivery
            .deliver(&format!("http://{}/callback", addr), &payload)
            .await
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, payload);
    }
}
