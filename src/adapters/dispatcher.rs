//! Bounded background dispatch of callback notifications.
//!
//! The orchestrator hands jobs to [`DeliveryDispatcher::enqueue`], which
//! never waits: jobs go into a bounded queue, and when the queue is full
//! the job is dropped and logged. A single dispatch loop drains the queue
//! and runs each delivery on its own task, with a semaphore capping how
//! many outbound calls are in flight at once.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::Delivery;

/// What a notification announces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// New request, pushed to the target provider
    RequestCreated,
    /// Completed response, pushed to the requestor
    ResponseReady,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestCreated => f.write_str("request_created"),
            Self::ResponseReady => f.write_str("response_ready"),
        }
    }
}

/// One notification waiting to be pushed
#[derive(Debug, Clone)]
pub struct DeliveryJob {
    pub kind: NotificationKind,
    pub request_id: String,
    pub url: String,
    pub payload: Value,
}

/// Upper bound on concurrent deliveries
pub const MAX_IN_FLIGHT: usize = 1024;

/// Upper bound on queued jobs
pub const MAX_QUEUE_CAPACITY: usize = 65_536;

/// Limits for the dispatcher. Values are clamped to `1..=MAX_*` on spawn.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Jobs that may wait in the queue (default: 256)
    pub queue_capacity: usize,

    /// Deliveries that may run at once (default: 8)
    pub max_in_flight: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_in_flight: 8,
        }
    }
}

impl DispatchConfig {
    /// The same limits, clamped to what the dispatcher accepts
    pub fn bounded(&self) -> Self {
        Self {
            queue_capacity: self.queue_capacity.clamp(1, MAX_QUEUE_CAPACITY),
            max_in_flight: self.max_in_flight.clamp(1, MAX_IN_FLIGHT),
        }
    }
}

/// Sending side of the dispatch queue. Cheap to clone.
#[derive(Clone)]
pub struct DeliveryDispatcher {
    tx: mpsc::Sender<DeliveryJob>,
}

impl DeliveryDispatcher {
    /// Start the dispatch loop on the current runtime
    pub fn spawn(delivery: Arc<dyn Delivery>, config: DispatchConfig) -> (Self, DispatchHandle) {
        let config = config.bounded();
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let max_in_flight = u32::try_from(config.max_in_flight).unwrap_or(MAX_IN_FLIGHT as u32);

        info!(
            transport = delivery.name(),
            queue_capacity = config.queue_capacity,
            max_in_flight,
            "Starting delivery dispatcher"
        );

        let task = tokio::spawn(run_dispatcher(delivery, rx, stop_rx, max_in_flight));

        (Self { tx }, DispatchHandle { stop_tx, task })
    }

    /// Queue a job without waiting. Returns false when the job was dropped.
    pub fn enqueue(&self, job: DeliveryJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) => {
                warn!(
                    kind = %job.kind,
                    request_id = %job.request_id,
                    url = %job.url,
                    "Delivery queue full, dropping notification"
                );
                false
            }
            Err(TrySendError::Closed(job)) => {
                warn!(
                    kind = %job.kind,
                    request_id = %job.request_id,
                    "Delivery dispatcher stopped, dropping notification"
                );
                false
            }
        }
    }
}

/// Handle to stop the dispatch loop
pub struct DispatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl DispatchHandle {
    /// Stop accepting jobs, push what is already queued, and wait for
    /// in-flight deliveries to finish
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

async fn run_dispatcher(
    delivery: Arc<dyn Delivery>,
    mut rx: mpsc::Receiver<DeliveryJob>,
    mut stop_rx: mpsc::Receiver<()>,
    max_in_flight: u32,
) {
    let permits = Arc::new(Semaphore::new(max_in_flight as usize));

    loop {
        let job = tokio::select! {
            job = rx.recv() => job,
            Some(()) = stop_rx.recv() => {
                rx.close();
                None
            }
        };

        let Some(job) = job else { break };
        spawn_delivery(&delivery, &permits, job).await;
    }

    // Drain anything queued before the stop
    while let Some(job) = rx.recv().await {
        spawn_delivery(&delivery, &permits, job).await;
    }

    // Every permit back means every delivery task has finished
    let _ = permits.acquire_many(max_in_flight).await;
    debug!("Delivery dispatcher stopped");
}

async fn spawn_delivery(delivery: &Arc<dyn Delivery>, permits: &Arc<Semaphore>, job: DeliveryJob) {
    let Ok(permit) = permits.clone().acquire_owned().await else {
        return;
    };
    let delivery = delivery.clone();

    tokio::spawn(async move {
        let _permit = permit;
        match delivery.deliver(&job.url, &job.payload).await {
            Ok(()) => info!(
                kind = %job.kind,
                request_id = %job.request_id,
                url = %job.url,
                "Notification delivered"
            ),
            Err(e) => warn!(
                kind = %job.kind,
                request_id = %job.request_id,
                url = %job.url,
                error = %e,
                "Notification delivery failed"
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DeliveryError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Mutex;

    /// Records every delivery; fails for URLs containing "fail"
    #[derive(Default)]
    struct RecordingDelivery {
        delivered: Mutex<Vec<(String, Value)>>,
    }

    #[async_trait]
    impl Delivery for RecordingDelivery {
        fn name(&self) -> &str {
            "recording"
        }

        async fn deliver(&self, url: &str, payload: &Value) -> Result<(), DeliveryError> {
            if url.contains("fail") {
                return Err(DeliveryError::Status {
                    url: url.to_string(),
                    status: 503,
                });
            }
            self.delivered
                .lock()
                .await
                .push((url.to_string(), payload.clone()));
            Ok(())
        }
    }

    fn job(request_id: &str, url: &str) -> DeliveryJob {
        DeliveryJob {
            kind: NotificationKind::RequestCreated,
            request_id: request_id.to_string(),
            url: url.to_string(),
            payload: json!({ "requestId": request_id }),
        }
    }

    #[tokio::test]
    async fn test_jobs_are_delivered_before_shutdown_returns() {
        let delivery = Arc::new(RecordingDelivery::default());
        let (dispatcher, handle) =
            DeliveryDispatcher::spawn(delivery.clone(), DispatchConfig::default());

        assert!(dispatcher.enqueue(job("REQ-1", "http://a/cb")));
        assert!(dispatcher.enqueue(job("REQ-2", "http://fail/cb")));
        assert!(dispatcher.enqueue(job("REQ-3", "http://b/cb")));
        handle.shutdown().await.unwrap();

        let delivered = delivery.delivered.lock().await;
        let mut ids: Vec<_> = delivered
            .iter()
            .map(|(_, p)| p["requestId"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["REQ-1", "REQ-3"]);
    }

    #[tokio::test]
    async fn test_full_queue_drops_instead_of_blocking() {
        let delivery = Arc::new(RecordingDelivery::default());
        let config = DispatchConfig {
            queue_capacity: 1,
            max_in_flight: 1,
        };
        let (dispatcher, handle) = DeliveryDispatcher::spawn(delivery.clone(), config);

        // Nothing has yielded to the dispatch loop yet, so the queue holds one job
        assert!(dispatcher.enqueue(job("REQ-1", "http://a/cb")));
        assert!(!dispatcher.enqueue(job("REQ-2", "http://a/cb")));

        handle.shutdown().await.unwrap();
        assert_eq!(delivery.delivered.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_enqueue_after_shutdown_is_rejected() {
        let delivery = Arc::new(RecordingDelivery::default());
        let (dispatcher, handle) = DeliveryDispatcher::spawn(delivery, DispatchConfig::default());

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .unwrap()
            .unwrap();
        assert!(!dispatcher.enqueue(job("REQ-1", "http://a/cb")));
    }

    #[test]
    fn test_limits_are_clamped() {
        let zero = DispatchConfig {
            queue_capacity: 0,
            max_in_flight: 0,
        }
        .bounded();
        assert_eq!(zero.queue_capacity, 1);
        assert_eq!(zero.max_in_flight, 1);

        let huge = DispatchConfig {
            queue_capacity: usize::MAX,
            max_in_flight: usize::MAX,
        }
        .bounded();
        assert_eq!(huge.queue_capacity, MAX_QUEUE_CAPACITY);
        assert_eq!(huge.max_in_flight, MAX_IN_FLIGHT);

        let default = DispatchConfig::default().bounded();
        assert_eq!(default.queue_capacity, 256);
        assert_eq!(default.max_in_flight, 8);
    }

    #[tokio::test]
    async fn test_oversized_limits_still_deliver() {
        let delivery = Arc::new(RecordingDelivery::default());
        let config = DispatchConfig {
            queue_capacity: usize::MAX,
            max_in_flight: usize::MAX,
        };
        let (dispatcher, handle) = DeliveryDispatcher::spawn(delivery.clone(), config);

        assert!(dispatcher.enqueue(job("REQ-1", "http://a/cb")));
        assert!(dispatcher.enqueue(job("REQ-2", "http://b/cb")));
        tokio::time::timeout(Duration::from_secs(5), handle.shutdown())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(delivery.delivered.lock().await.len(), 2);
    }
}
