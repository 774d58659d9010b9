// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification sink that records every publish for assertions.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chatfleet_core::{FleetError, NotificationSink};
use serde_json::Value;

/// Captures `(topic, payload)` pairs. Can be switched to fail every publish.
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(String, Value)>>,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent publishes fail (without recording) until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<(String, Value)> {
        lock(&self.published).clone()
    }

    pub fn topics(&self) -> Vec<String> {
        lock(&self.published).iter().map(|(t, _)| t.clone()).collect()
    }

    pub fn count(&self) -> usize {
        lock(&self.published).len()
    }

    /// Payloads whose `event` field equals `event`.
    pub fn events(&self, event: &str) -> Vec<Value> {
        lock(&self.published)
            .iter()
            .filter(|(_, p)| p.get("event").and_then(Value::as_str) == Some(event))
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn clear(&self) {
        lock(&self.published).clear();
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn publish(&self, topic: &str, payload: Value) -> Result<(), FleetError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FleetError::Internal("recording sink set to fail".into()));
        }
        lock(&self.published).push((topic.to_string(), payload));
        Ok(())
    }
}

pub(crate) fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_and_fails_on_demand() {
        let sink = RecordingSink::new();
        sink.publish("t:c", json!({"event": "message"})).await.unwrap();
        assert_eq!(sink.topics(), vec!["t:c".to_string()]);
        assert_eq!(sink.events("message").len(), 1);

        sink.set_failing(true);
        assert!(sink.publish("t:c", json!({})).await.is_err());
        assert_eq!(sink.count(), 1);
    }
}
