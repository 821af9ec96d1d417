//! Log/event broadcaster.
//!
//! Call and callback records are persisted through the [`LogStore`] and then
//! pushed to every live subscription whose filter matches. Subscriptions are
//! process-local, receive a `connected` acknowledgement on subscribe and a
//! periodic heartbeat, and are torn down on the first failed send.
//!
//! [`LogStore`]: crate::store::LogStore

mod event;
mod recorder;
mod registry;
mod sse;

pub use event::{BroadcastEvent, EventKind};
pub use recorder::EventRecorder;
pub use registry::{BroadcastRegistry, Subscription, SubscriptionFilter};
pub use sse::sse_body;
