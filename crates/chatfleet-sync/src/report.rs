// SPDX-FileCopyrightText: 2026 Chatfleet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync result types.

use serde::Serialize;

use chatfleet_core::{FleetError, UpsertChange};

/// A remote fetch that failed and was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncBatchFailure {
    /// Zero-based batch index within the phase.
    pub batch: usize,
    pub ids: Vec<String>,
    pub message: String,
}

impl SyncBatchFailure {
    pub fn to_error(&self) -> FleetError {
        FleetError::SyncBatch {
            batch: self.batch,
            message: self.message.clone(),
        }
    }
}

/// Outcome counts for one phase (contacts or groups).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseReport {
    pub created: usize,
    pub upgraded: usize,
    pub refreshed: usize,
    /// Items whose write failed individually.
    pub failed_items: usize,
    pub failed_batches: Vec<SyncBatchFailure>,
    /// The tenant was stopped before the phase finished.
    pub cancelled: bool,
}

impl PhaseReport {
    pub fn record(&mut self, change: UpsertChange) {
        match change {
            UpsertChange::Created => self.created += 1,
            UpsertChange::Upgraded => self.upgraded += 1,
            UpsertChange::Refreshed => self.refreshed += 1,
        }
    }

    /// Items written successfully.
    pub fn applied(&self) -> usize {
        self.created + self.upgraded + self.refreshed
    }

    pub fn is_clean(&self) -> bool {
        self.failed_items == 0 && self.failed_batches.is_empty() && !self.cancelled
    }
}

/// Result of one tenant sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub tenant_id: String,
    pub contacts: PhaseReport,
    pub groups: PhaseReport,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.contacts.is_clean() && self.groups.is_clean()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_counts_by_change() {
        let mut phase = PhaseReport::default();
        phase.record(UpsertChange::Created);
        phase.record(UpsertChange::Upgraded);
        phase.record(UpsertChange::Refreshed);
        phase.record(UpsertChange::Refreshed);
        assert_eq!(phase.applied(), 4);
        assert_eq!(phase.refreshed, 2);
        assert!(phase.is_clean());

        phase.failed_batches.push(SyncBatchFailure {
            batch: 1,
            ids: vec!["g1".into()],
            message: "boom".into(),
        });
        assert!(!phase.is_clean());
        assert!(matches!(
            phase.failed_batches[0].to_error(),
            FleetError::SyncBatch { batch: 1, .. }
        ));
    }
}
