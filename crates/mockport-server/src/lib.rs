//! Mockport mock serving engine.
//!
//! Serves `/mock/{shortId}/{...path}`: route matching with a cache, conditional
//! rules, synthetic data templating, backend proxying, post-response callbacks
//! and a live event stream of every call.

pub mod admin_api;
pub mod background;
pub mod broadcast;
pub mod cache;
pub mod callbacks;
pub mod config;
pub mod engine;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod model;
pub mod proxy;
pub mod rules;
pub mod store;
pub mod template;

pub use engine::{MockEngine, MockServer};
pub use error::EngineError;
