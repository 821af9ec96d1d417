//! Callback dispatcher: outbound HTTP side effects fired after a response.

mod dispatcher;
mod substitution;

pub use dispatcher::{ordered_callbacks, CallbackDispatcher, CallbackError};
pub use substitution::{ResponseContext, Substitution};
