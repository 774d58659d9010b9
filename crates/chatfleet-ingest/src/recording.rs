// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers for the ingest path.
//!
//! Uses the metrics-rs facade; nothing is collected unless a recorder is
//! installed by the binary.

use metrics::describe_counter;

/// Register ingest metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "chatfleet_messages_total",
        "Inbound messages by persistence outcome"
    );
    describe_counter!(
        "chatfleet_messages_dropped_total",
        "Inbound events dropped before persistence"
    );
    describe_counter!(
        "chatfleet_notifications_failed_total",
        "Notifications the realtime sink rejected"
    );
}

/// Record a persisted message (`inserted`, `merged`, `already_observed`).
pub fn record_message(outcome: &'static str) {
    metrics::counter!("chatfleet_messages_total", "outcome" => outcome).increment(1);
}

/// Record a dropped event.
pub fn record_dropped(reason: &'static str) {
    metrics::counter!("chatfleet_messages_dropped_total", "reason" => reason).increment(1);
}

pub fn record_notification_failure() {
    metrics::counter!("chatfleet_notifications_failed_total").increment(1);
}
