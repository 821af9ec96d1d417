//! The mock serving engine: process-scoped state plus the `/mock/...` listener.
//!
//! [`MockEngine`] is built once at startup from the [`Config`] and a store.
//! [`MockEngine::start`] launches the background queue workers and the
//! broadcast heartbeat; [`MockEngine::shutdown`] stops them.
//!
//! Call logs and callbacks run on separate queues, so slow or delayed
//! callbacks never hold back call logging.

mod body;
mod handler;
pub mod response;
mod server;

pub use body::{Delivered, ResponseBody, CHUNK_SIZE};
pub use handler::parse_mock_path;
pub use server::MockServer;

use crate::background::TaskQueue;
use crate::broadcast::{BroadcastRegistry, EventRecorder};
use crate::cache::{create_route_cache, CacheInvalidator, RouteCache};
use crate::callbacks::CallbackDispatcher;
use crate::config::Config;
use crate::matcher::RouteMatcher;
use crate::proxy::ProxyForwarder;
use crate::rules::RuleExecutor;
use crate::store::{ConfigStore, InMemoryStore, LogStore};
use crate::template::TemplateSynthesizer;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// How long shutdown waits for queued side effects.
const DRAIN_GRACE: Duration = Duration::from_secs(10);

pub struct MockEngine {
    config: Arc<Config>,
    store: Arc<InMemoryStore>,
    cache: Arc<dyn RouteCache>,
    matcher: RouteMatcher,
    rules: RuleExecutor,
    synthesizer: TemplateSynthesizer,
    forwarder: ProxyForwarder,
    registry: Arc<BroadcastRegistry>,
    recorder: Arc<EventRecorder>,
    dispatcher: Arc<CallbackDispatcher>,
    queue: TaskQueue,
    callback_queue: Arc<TaskQueue>,
}

impl MockEngine {
    pub fn new(config: Config, store: Arc<InMemoryStore>) -> Result<Self, anyhow::Error> {
        let cache = create_route_cache(&config.cache)?;
        store.set_invalidator(Arc::new(CacheInvalidator::new(Arc::clone(&cache))));

        let config_store: Arc<dyn ConfigStore> = store.clone();
        let log_store: Arc<dyn LogStore> = store.clone();

        let registry = Arc::new(BroadcastRegistry::new(&config.broadcast));
        let recorder = Arc::new(EventRecorder::new(log_store, Arc::clone(&registry)));
        let dispatcher = Arc::new(CallbackDispatcher::new(
            Arc::clone(&config_store),
            Arc::clone(&recorder),
            &config.callbacks,
        )?);

        Ok(Self {
            matcher: RouteMatcher::new(Arc::clone(&config_store), Arc::clone(&cache)),
            rules: RuleExecutor::new(config_store),
            synthesizer: TemplateSynthesizer::new(config.templating.max_repeat),
            forwarder: ProxyForwarder::new(&config.proxy),
            queue: TaskQueue::new("events", &config.background.events),
            callback_queue: Arc::new(TaskQueue::new("callbacks", &config.background.callbacks)),
            config: Arc::new(config),
            store,
            cache,
            registry,
            recorder,
            dispatcher,
        })
    }

    /// Launch the background workers and the heartbeat. Needs a tokio runtime.
    pub fn start(&self) {
        self.queue.start();
        self.callback_queue.start();
        self.registry.start();
        info!(
            "Mock engine started (route cache: {})",
            self.cache.backend_name()
        );
    }

    /// Stop the heartbeat, drop subscriptions and drain queued side effects.
    pub async fn shutdown(&self) {
        info!("Shutting down mock engine");
        self.registry.shutdown();
        tokio::join!(
            self.queue.shutdown(DRAIN_GRACE),
            self.callback_queue.shutdown(DRAIN_GRACE)
        );
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn RouteCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<BroadcastRegistry> {
        &self.registry
    }
}
