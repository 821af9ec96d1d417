//! Process-local subscription registry.

use super::event::{BroadcastEvent, EventKind};
use crate::config::BroadcastConfig;
use crate::metrics;
use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Which events a subscription wants. Every filter that is set must match;
/// with no filter set the subscription receives no call events at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionFilter {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub definition_id: Option<String>,
}

impl SubscriptionFilter {
    pub fn is_empty(&self) -> bool {
        self.project_id.is_none() && self.user_id.is_none() && self.definition_id.is_none()
    }

    pub fn matches(&self, event: &BroadcastEvent) -> bool {
        if self.is_empty() {
            return false;
        }
        let project_ok = self
            .project_id
            .as_ref()
            .map_or(true, |p| event.project_id.as_ref() == Some(p));
        let definition_ok = self
            .definition_id
            .as_ref()
            .map_or(true, |d| event.definition_id.as_ref() == Some(d));
        let user_ok = self
            .user_id
            .as_ref()
            .map_or(true, |u| event.audience.iter().any(|a| a == u));
        project_ok && definition_ok && user_ok
    }
}

/// Receiving half handed to the transport.
#[derive(Debug)]
pub struct Subscription {
    pub client_id: String,
    pub receiver: mpsc::Receiver<BroadcastEvent>,
}

struct Subscriber {
    filter: SubscriptionFilter,
    sender: mpsc::Sender<BroadcastEvent>,
}

pub struct BroadcastRegistry {
    subscribers: RwLock<HashMap<String, Subscriber>>,
    channel_capacity: usize,
    heartbeat_interval: Duration,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
}

impl BroadcastRegistry {
    pub fn new(config: &BroadcastConfig) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            channel_capacity: config.channel_capacity.max(1),
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs.max(1)),
            heartbeat_task: Mutex::new(None),
        }
    }

    /// Register a subscription; its first event is `connected`.
    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        let client_id = uuid::Uuid::new_v4().to_string();
        let (sender, receiver) = mpsc::channel(self.channel_capacity);

        // Fresh channel with capacity >= 1, cannot fail.
        let _ = sender.try_send(BroadcastEvent::connected(&client_id));

        let count = {
            let mut subscribers = self.subscribers.write();
            subscribers.insert(client_id.clone(), Subscriber { filter, sender });
            subscribers.len()
        };
        metrics::set_active_subscriptions(count);
        debug!("Subscriber {} connected ({} open)", client_id, count);

        Subscription {
            client_id,
            receiver,
        }
    }

    pub fn unsubscribe(&self, client_id: &str) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.write();
            let removed = subscribers.remove(client_id).is_some();
            (removed, subscribers.len())
        };
        if removed {
            metrics::set_active_subscriptions(count);
            debug!("Subscriber {} removed ({} open)", client_id, count);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Push an event to every subscription whose filter matches. Returns the
    /// number of deliveries.
    pub fn broadcast(&self, event: &BroadcastEvent) -> usize {
        self.deliver(event, |filter| filter.matches(event))
    }

    /// Push a heartbeat to every open subscription.
    pub fn send_heartbeat(&self) -> usize {
        self.deliver(&BroadcastEvent::heartbeat(), |_| true)
    }

    fn deliver(&self, event: &BroadcastEvent, wanted: impl Fn(&SubscriptionFilter) -> bool) -> usize {
        let targets: Vec<(String, mpsc::Sender<BroadcastEvent>)> = self
            .subscribers
            .read()
            .iter()
            .filter(|(_, s)| wanted(&s.filter))
            .map(|(id, s)| (id.clone(), s.sender.clone()))
            .collect();

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, sender) in targets {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    debug!("Subscriber {} is not keeping up, dropping it", id);
                    failed.push(id);
                }
                Err(TrySendError::Closed(_)) => failed.push(id),
            }
        }

        for id in failed {
            self.unsubscribe(&id);
        }
        if event.kind != EventKind::Heartbeat {
            debug!("{} event delivered to {} subscriber(s)", event.kind.as_str(), delivered);
        }
        delivered
    }

    /// Start the heartbeat timer. The task holds only a weak reference.
    pub fn start(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.heartbeat_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick is immediate
            loop {
                ticker.tick().await;
                let Some(registry) = weak.upgrade() else {
                    break;
                };
                registry.send_heartbeat();
            }
        });

        if let Some(previous) = self.heartbeat_task.lock().replace(handle) {
            previous.abort();
        }
        info!("Broadcast heartbeat every {:?}", interval);
    }

    /// Stop the heartbeat and close every subscription.
    pub fn shutdown(&self) {
        if let Some(handle) = self.heartbeat_task.lock().take() {
            handle.abort();
        }
        let closed = {
            let mut subscribers = self.subscribers.write();
            let n = subscribers.len();
            subscribers.clear();
            n
        };
        metrics::set_active_subscriptions(0);
        info!("Broadcast registry shut down ({} subscriptions closed)", closed);
    }
}

impl Drop for BroadcastRegistry {
    fn drop(&mut self) {
        if let Some(handle) = self.heartbeat_task.get_mut().take() {
            handle.abort();
        }
    }
}
