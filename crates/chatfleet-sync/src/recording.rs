// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync metric registration and recording helpers.

use metrics::describe_counter;

pub fn register_metrics() {
    describe_counter!(
        "chatfleet_sync_items_total",
        "Synced contacts and groups by phase and outcome"
    );
    describe_counter!(
        "chatfleet_sync_batches_failed_total",
        "Remote fetch batches that failed during sync"
    );
}

/// Record one synced item. `outcome` is `created`, `upgraded`, `refreshed` or `failed`.
pub fn record_item(phase: &'static str, outcome: &'static str) {
    metrics::counter!("chatfleet_sync_items_total", "phase" => phase, "outcome" => outcome)
        .increment(1);
}

pub fn record_batch_failure(phase: &'static str) {
    metrics::counter!("chatfleet_sync_batches_failed_total", "phase" => phase).increment(1);
}
