//! Server-sent events body for a subscription.

use super::registry::{BroadcastRegistry, Subscription};
use bytes::Bytes;
use futures::stream;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use std::convert::Infallible;
use std::sync::{Arc, Weak};

/// Removes the subscription when the response body is dropped
/// (client disconnect or server shutdown).
struct SubscriptionGuard {
    registry: Weak<BroadcastRegistry>,
    client_id: String,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unsubscribe(&self.client_id);
        }
    }
}

/// Stream a subscription as an SSE body. Ends when the registry drops the
/// sending half.
pub fn sse_body(
    registry: &Arc<BroadcastRegistry>,
    subscription: Subscription,
) -> UnsyncBoxBody<Bytes, Infallible> {
    let guard = SubscriptionGuard {
        registry: Arc::downgrade(registry),
        client_id: subscription.client_id,
    };

    let events = stream::unfold(
        (subscription.receiver, guard),
        |(mut receiver, guard)| async move {
            let event = receiver.recv().await?;
            let frame = Frame::data(Bytes::from(event.to_sse()));
            Some((Ok::<_, Infallible>(frame), (receiver, guard)))
        },
    );

    StreamBody::new(events).boxed_unsync()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::SubscriptionFilter;
    use crate::config::BroadcastConfig;

    #[tokio::test]
    async fn test_sse_body_streams_connected_then_heartbeat() {
        let registry = Arc::new(BroadcastRegistry::new(&BroadcastConfig::default()));
        let sub = registry.subscribe(SubscriptionFilter::default());
        let mut body = sse_body(&registry, sub);

        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert!(String::from_utf8_lossy(&first).starts_with("event: connected\n"));

        registry.send_heartbeat();
        let second = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert!(String::from_utf8_lossy(&second).starts_with("event: heartbeat\n"));
    }

    #[tokio::test]
    async fn test_dropping_body_unsubscribes() {
        let registry = Arc::new(BroadcastRegistry::new(&BroadcastConfig::default()));
        let sub = registry.subscribe(SubscriptionFilter::default());
        let body = sse_body(&registry, sub);
        assert_eq!(registry.subscriber_count(), 1);
        drop(body);
        assert_eq!(registry.subscriber_count(), 0);
    }
}
