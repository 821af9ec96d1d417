//! Template synthesizer.
//!
//! Walks a JSON response template and expands:
//!
//! - `{"_repeat_N": value}` into an array of `N` independently expanded copies
//! - `{"_range_MIN_MAX": ...}` into a uniform integer in `[MIN, MAX]`
//! - `{{namespace.name}}` / `{{namespace.name(args)}}` inside strings, where
//!   `args` is the body of a JSON array literal
//! - `{{request.<ns>.<path>}}` from the current request
//!
//! # Example
//!
//! ```
//! use mockport_server::template::TemplateSynthesizer;
//! use serde_json::json;
//!
//! let synth = TemplateSynthesizer::new(100);
//! let out = synth.synthesize(&json!({"_repeat_2": {"id": "{{string.uuid}}"}}), true, None);
//! assert_eq!(out.as_array().unwrap().len(), 2);
//! ```

mod delay;
mod expression;
mod generators;
mod synthesizer;

pub use delay::{apply_delay, resolve_delay};
pub use expression::{expression_regex, parse_args, Expression};
pub use generators::{GeneratorFn, GeneratorRegistry};
pub use synthesizer::TemplateSynthesizer;

/// Template expansion anomalies. Never surfaced to clients.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown generator '{0}'")]
    UnknownGenerator(String),
    #[error("Invalid arguments for '{generator}': {reason}")]
    InvalidArguments { generator: String, reason: String },
    #[error("Unresolved request field '{0}'")]
    UnresolvedField(String),
}
