//! Best-effort audit trail
//!
//! Records are queued on a bounded channel and written by a background task,
//! so auditing never blocks or fails the request that produced the record.

use crate::db::TerminologyStore;
use crate::models::AuditRecord;
use std::sync::Arc;
use tokio::sync::mpsc;

const QUEUE_CAPACITY: usize = 2048;

#[derive(Clone)]
pub struct AuditService {
    enabled: bool,
    sender: mpsc::Sender<AuditRecord>,
}

impl AuditService {
    /// Spawn the drain task; needs a running Tokio runtime
    pub fn new(store: Arc<dyn TerminologyStore>, enabled: bool) -> Self {
        Self::with_capacity(store, enabled, QUEUE_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn TerminologyStore>, enabled: bool, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel::<AuditRecord>(capacity.max(1));

        tokio::spawn(async move {
            while let Some(record) = receiver.recv().await {
                if let Err(e) = store.append_audit(&record).await {
                    tracing::warn!(
                        action = %record.action,
                        error = %e,
                        "failed to persist audit record"
                    );
                }
            }
        });

        if enabled {
            tracing::info!(capacity, "audit logging initialized");
        }

        Self { enabled, sender }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Queue a record; drops it with a warning when the queue is full
    pub fn record(&self, record: AuditRecord) {
        if !self.enabled {
            return;
        }
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(record)) => {
                crate::metrics::AUDIT_EVENTS_DROPPED_TOTAL.inc();
                tracing::warn!(action = %record.action, "audit queue full; dropping record");
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                crate::metrics::AUDIT_EVENTS_DROPPED_TOTAL.inc();
                tracing::warn!(action = %record.action, "audit queue closed; dropping record");
            }
        }
    }
}
