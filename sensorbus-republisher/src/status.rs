//! Service status reporting.

use serde::{Deserialize, Serialize};

use crate::error::PublishError;
use crate::publisher::{Publish, Topics};

/// Status published to `<prefix>/<instance>/@/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub service: String,
    pub version: String,
    /// "running" or "offline".
    pub status: String,
    pub instance: String,
}

impl ServiceStatus {
    pub fn running(instance: impl Into<String>) -> Self {
        Self::with_state(instance, "running")
    }

    pub fn offline(instance: impl Into<String>) -> Self {
        Self::with_state(instance, "offline")
    }

    fn with_state(instance: impl Into<String>, status: &str) -> Self {
        Self {
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: status.to_string(),
            instance: instance.into(),
        }
    }

    /// Publish as JSON.
    pub async fn publish<P: Publish>(
        &self,
        publisher: &mut P,
        topics: &Topics,
    ) -> Result<(), PublishError> {
        let key = topics.status_key();
        let payload = serde_json::to_vec(self).map_err(|e| PublishError::Failed {
            key: key.clone(),
            message: e.to_string(),
        })?;
        publisher.publish(&key, payload).await
    }
}
