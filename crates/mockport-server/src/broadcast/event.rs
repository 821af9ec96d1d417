use crate::model::{CallLogRecord, CallbackLogRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Connected,
    Heartbeat,
    Call,
    Callback,
    Notification,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Connected => "connected",
            EventKind::Heartbeat => "heartbeat",
            EventKind::Call => "call",
            EventKind::Callback => "callback",
            EventKind::Notification => "notification",
        }
    }
}

/// A normalized event pushed to live subscribers.
///
/// Built with [`BroadcastEvent::new`] and enriched with the `with_*` methods.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition_id: Option<String>,
    /// Users the event concerns (project maintainers); matched by user filters.
    #[serde(skip)]
    pub audience: Vec<String>,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
}

impl BroadcastEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            project_id: None,
            definition_id: None,
            audience: Vec::new(),
            data: Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_definition(mut self, definition_id: Option<String>) -> Self {
        self.definition_id = definition_id;
        self
    }

    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn connected(client_id: &str) -> Self {
        Self::new(EventKind::Connected).with_data(serde_json::json!({ "clientId": client_id }))
    }

    pub fn heartbeat() -> Self {
        Self::new(EventKind::Heartbeat)
    }

    pub fn call(record: &CallLogRecord, audience: Vec<String>) -> Self {
        Self::new(EventKind::Call)
            .with_project(record.project_id.clone())
            .with_definition(record.definition_id.clone())
            .with_audience(audience)
            .with_data(serde_json::to_value(record).unwrap_or(Value::Null))
    }

    pub fn callback(record: &CallbackLogRecord, audience: Vec<String>) -> Self {
        Self::new(EventKind::Callback)
            .with_project(record.project_id.clone())
            .with_definition(Some(record.definition_id.clone()))
            .with_audience(audience)
            .with_data(serde_json::to_value(record).unwrap_or(Value::Null))
    }

    /// Server-sent events framing: `event:` line, one `data:` line, blank line.
    pub fn to_sse(&self) -> String {
        let data = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("event: {}\ndata: {}\n\n", self.kind.as_str(), data)
    }
}
