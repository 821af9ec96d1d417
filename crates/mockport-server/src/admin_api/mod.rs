//! Admin REST API: health, metrics, live event stream, cache hooks and
//! call-log queries.
//!
//! The API listens on its own port (default: 2525).

mod handlers;
mod router;
mod server;
mod types;

pub use router::route_request;
pub use server::AdminApiServer;
pub use types::AdminBody;
