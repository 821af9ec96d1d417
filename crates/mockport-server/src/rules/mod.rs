//! Rule executor: conditional overrides of a definition's default response.

mod condition;
mod context;
mod executor;

pub use condition::{apply_operator, evaluate_condition, evaluate_group, stringify, to_number};
pub use context::{parse_query, walk, BodyKind, RequestContext};
pub use executor::{ordered_rules, select_from, RuleExecutor};
