use super::event::BroadcastEvent;
use super::registry::BroadcastRegistry;
use crate::model::{CallLogRecord, CallbackLogRecord};
use crate::store::LogStore;
use std::sync::Arc;
use tracing::warn;

/// Persist-then-push for call and callback records.
///
/// Persistence failures are logged and swallowed: the HTTP response they
/// describe is already decided.
pub struct EventRecorder {
    log_store: Arc<dyn LogStore>,
    registry: Arc<BroadcastRegistry>,
}

impl EventRecorder {
    pub fn new(log_store: Arc<dyn LogStore>, registry: Arc<BroadcastRegistry>) -> Self {
        Self {
            log_store,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }

    pub async fn record_call(&self, record: CallLogRecord, audience: Vec<String>) {
        if let Err(e) = self.log_store.insert_call_log(&record).await {
            warn!("Failed to persist call log {}: {}", record.id, e);
        }
        self.registry.broadcast(&BroadcastEvent::call(&record, audience));
    }

    pub async fn record_callback(&self, record: CallbackLogRecord, audience: Vec<String>) {
        if let Err(e) = self.log_store.insert_callback_log(&record).await {
            warn!("Failed to persist callback log {}: {}", record.id, e);
        }
        self.registry
            .broadcast(&BroadcastEvent::callback(&record, audience));
    }

    /// Push-only event (no persistence), e.g. proxy failure notifications.
    pub fn notify(&self, event: BroadcastEvent) {
        self.registry.broadcast(&event);
    }
}
