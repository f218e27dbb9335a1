//! Request identifier generation.
//!
//! Ids have the form `REQ-<YYYYMMDD>-<seq>` where `seq` is zero-padded to
//! four digits. The sequence lives in the `sequences` collection and is
//! bumped under the collection lock, so ids stay unique across restarts
//! and across concurrent creators.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::store::{CollectionStore, StoreError};

pub const COLLECTION: &str = "sequences";

const REQUEST_SEQUENCE: &str = "patientRequest";

/// A named, persisted counter
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sequence {
    name: String,
    value: u64,
}

/// Issues request ids backed by a persisted sequence
#[derive(Clone)]
pub struct RequestIdGenerator {
    store: Arc<CollectionStore>,
}

impl RequestIdGenerator {
    pub fn new(store: Arc<CollectionStore>) -> Self {
        Self { store }
    }

    /// Reserve the next sequence number and format it for `now`
    pub async fn next(&self, now: DateTime<Utc>) -> Result<String, StoreError> {
        let seq = self
            .store
            .update(COLLECTION, |sequences: &mut Vec<Sequence>| {
                let value = match sequences.iter_mut().find(|s| s.name == REQUEST_SEQUENCE) {
                    Some(sequence) => {
                        sequence.value += 1;
                        sequence.value
                    }
                    None => {
                        sequences.push(Sequence {
                            name: REQUEST_SEQUENCE.to_string(),
                            value: 1,
                        });
                        1
                    }
                };
                Ok::<_, StoreError>(value)
            })
            .await?;

        Ok(format_request_id(now, seq))
    }
}

/// Format a request id for the UTC date of `at`
pub fn format_request_id(at: DateTime<Utc>, seq: u64) -> String {
    format!("REQ-{}-{:04}", at.format("%Y%m%d"), seq)
}
