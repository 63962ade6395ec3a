//! Reading publication.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use sensorbus_common::{SensorRecord, encode};
use zenoh::key_expr::KeyExpr;

use crate::config::{PayloadFormat, TopicConfig};
use crate::error::{PublishError, Result};

/// Builds the keys readings and status are published to.
///
/// Keys follow the pattern `<prefix>/<instance>/<sensor>`.
#[derive(Debug, Clone)]
pub struct Topics {
    base: String,
    instance: String,
}

impl Topics {
    pub fn new(config: &TopicConfig) -> Self {
        Self {
            base: format!(
                "{}/{}",
                config.prefix.trim_end_matches('/'),
                config.instance
            ),
            instance: config.instance.clone(),
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// `<prefix>/<instance>`.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Key for one sensor's readings.
    pub fn sensor_key(&self, sensor: &str) -> String {
        format!("{}/{}", self.base, sensor)
    }

    /// Key for service status.
    pub fn status_key(&self) -> String {
        format!("{}/@/status", self.base)
    }
}

/// Encode a row for the wire.
pub fn encode_payload(record: &SensorRecord, format: PayloadFormat) -> Result<Vec<u8>> {
    match format.structured() {
        None => Ok(record.value.as_bytes().to_vec()),
        Some(format) => Ok(encode(record, format)?),
    }
}

/// Parse a key, rejecting anything that is not a valid key expression.
pub fn key_expr(key: &str) -> std::result::Result<KeyExpr<'static>, PublishError> {
    KeyExpr::try_from(key.to_string()).map_err(|e| PublishError::InvalidKey {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Something readings can be published to.
pub trait Publish: Send {
    fn publish(
        &mut self,
        key: &str,
        payload: Vec<u8>,
    ) -> impl Future<Output = std::result::Result<(), PublishError>> + Send;
}

/// Publishes through a Zenoh session.
#[derive(Clone)]
pub struct ZenohPublisher {
    session: Arc<zenoh::Session>,
}

impl ZenohPublisher {
    pub fn new(session: Arc<zenoh::Session>) -> Self {
        Self { session }
    }
}

impl Publish for ZenohPublisher {
    async fn publish(
        &mut self,
        key: &str,
        payload: Vec<u8>,
    ) -> std::result::Result<(), PublishError> {
        self.session
            .put(key_expr(key)?, payload)
            .await
            .map_err(|e| PublishError::Failed {
                key: key.to_string(),
                message: e.to_string(),
            })
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    published: Vec<(String, Vec<u8>)>,
    failures: usize,
}

/// Keeps everything published in memory.
///
/// Keys are validated the same way [`ZenohPublisher`] does.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` publishes fail.
    pub fn fail_next(&self, count: usize) {
        self.lock().failures = count;
    }

    /// Every successful publish, in order.
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.lock().published.clone()
    }

    /// Keys and payloads as text.
    pub fn published_text(&self) -> Vec<(String, String)> {
        self.lock()
            .published
            .iter()
            .map(|(key, payload)| (key.clone(), String::from_utf8_lossy(payload).into_owned()))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Publish for MemoryPublisher {
    async fn publish(
        &mut self,
        key: &str,
        payload: Vec<u8>,
    ) -> std::result::Result<(), PublishError> {
        key_expr(key)?;

        let mut state = self.lock();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(PublishError::Failed {
                key: key.to_string(),
                message: "simulated failure".to_string(),
            });
        }
        state.published.push((key.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sensorbus_common::{Format, decode};

    fn record() -> SensorRecord {
        SensorRecord::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            "tempA",
            "21.5",
        )
    }

    #[test]
    fn test_topics() {
        let topics = Topics::new(&TopicConfig {
            prefix: "site/greenhouse/".to_string(),
            instance: "pi01".to_string(),
        });

        assert_eq!(topics.sensor_key("tempA"), "site/greenhouse/pi01/tempA");
        assert_eq!(topics.status_key(), "site/greenhouse/pi01/@/status");
    }

    #[test]
    fn test_raw_payload_is_value() {
        assert_eq!(encode_payload(&record(), PayloadFormat::Raw).unwrap(), b"21.5");
    }

    #[test]
    fn test_structured_payloads() {
        let json = encode_payload(&record(), PayloadFormat::Json).unwrap();
        let decoded: SensorRecord = decode(&json, Format::Json).unwrap();
        assert_eq!(decoded, record());

        let cbor = encode_payload(&record(), PayloadFormat::Cbor).unwrap();
        let decoded: SensorRecord = decode(&cbor, Format::Cbor).unwrap();
        assert_eq!(decoded, record());
    }

    #[tokio::test]
    async fn test_memory_publisher_failures() {
        let mut publisher = MemoryPublisher::new();
        publisher.fail_next(1);

        assert!(publisher.publish("a/b", b"1".to_vec()).await.is_err());
        publisher.publish("a/b", b"2".to_vec()).await.unwrap();

        assert_eq!(
            publisher.published_text(),
            vec![("a/b".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn test_key_expr() {
        assert!(key_expr("sensorbus/pi01/tempA").is_ok());
        assert!(key_expr("sensorbus/pi01/@/status").is_ok());

        for key in ["sensorbus/pi01/a//b", "sensorbus/pi01/", ""] {
            assert!(
                matches!(key_expr(key), Err(PublishError::InvalidKey { .. })),
                "{key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_memory_publisher_rejects_invalid_key() {
        let mut publisher = MemoryPublisher::new();
        publisher.fail_next(1);

        let result = publisher.publish("a//b", b"1".to_vec()).await;
        assert!(matches!(result, Err(PublishError::InvalidKey { .. })));

        // Rejected keys do not use up injected failures.
        assert!(publisher.publish("a/b", b"2".to_vec()).await.is_err());
        assert!(publisher.published().is_empty());
    }
}
