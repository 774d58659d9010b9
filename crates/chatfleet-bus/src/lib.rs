// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process realtime bus.
//!
//! [`EventBus`] implements [`NotificationSink`] on top of a bounded
//! `tokio::sync::broadcast` channel. Subscribers that fall behind lose the
//! oldest notifications; publishers never block.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use chatfleet_core::{AdapterType, FleetError, HealthStatus, NotificationSink, PluginAdapter};

/// One published update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    /// `tenantId:conversationId`.
    pub topic: String,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl Notification {
    /// Tenant part of the topic.
    pub fn tenant_id(&self) -> &str {
        self.topic
            .split_once(':')
            .map(|(tenant, _)| tenant)
            .unwrap_or(&self.topic)
    }
}

pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receives every notification.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Receives notifications for one tenant (`"t1"`) or one exact topic (`"t1:c9"`).
    pub fn subscribe_topic(&self, filter: impl Into<String>) -> TopicSubscription {
        TopicSubscription {
            filter: filter.into(),
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl NotificationSink for EventBus {
    async fn publish(&self, topic: &str, payload: serde_json::Value) -> Result<(), FleetError> {
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            payload,
            published_at: Utc::now(),
        };
        // No subscribers is not a failure.
        match self.tx.send(notification) {
            Ok(receivers) => debug!(topic, receivers, "notification published"),
            Err(_) => debug!(topic, "notification dropped, no subscribers"),
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for EventBus {
    fn name(&self) -> &str {
        "event-bus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Notification
    }

    async fn health_check(&self) -> Result<HealthStatus, FleetError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FleetError> {
        Ok(())
    }
}

/// A filtered view of the bus.
pub struct TopicSubscription {
    filter: String,
    rx: broadcast::Receiver<Notification>,
}

impl TopicSubscription {
    fn matches(&self, topic: &str) -> bool {
        if self.filter.contains(':') {
            topic == self.filter
        } else {
            topic
                .split_once(':')
                .is_some_and(|(tenant, _)| tenant == self.filter)
        }
    }

    /// Next matching notification, or `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Notification> {
        loop {
            match self.rx.recv().await {
                Ok(n) if self.matches(&n.topic) => return Some(n),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(filter = %self.filter, skipped, "subscriber lagged, notifications lost");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
