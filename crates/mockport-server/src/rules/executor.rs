use super::condition::evaluate_group;
use super::context::RequestContext;
use crate::model::Rule;
use crate::store::{ConfigStore, StoreError};
use std::sync::Arc;
use tracing::debug;

/// Picks the first matching rule of a definition.
pub struct RuleExecutor {
    store: Arc<dyn ConfigStore>,
}

impl RuleExecutor {
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self { store }
    }

    pub async fn select_rule(
        &self,
        definition_id: &str,
        ctx: &RequestContext,
    ) -> Result<Option<Rule>, StoreError> {
        let rules = self.store.rules(definition_id).await?;
        let selected = select_from(rules, ctx);
        if let Some(rule) = &selected {
            debug!("Rule '{}' matched for definition {}", rule.id, definition_id);
        }
        Ok(selected)
    }
}

/// Enabled rules in precedence order: ascending priority, then creation time,
/// then declaration order.
pub fn ordered_rules(rules: Vec<Rule>) -> Vec<Rule> {
    let mut enabled: Vec<Rule> = rules.into_iter().filter(|r| r.enabled).collect();
    // Stable sort keeps declaration order for full ties.
    enabled.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    enabled
}

pub fn select_from(rules: Vec<Rule>, ctx: &RequestContext) -> Option<Rule> {
    ordered_rules(rules)
        .into_iter()
        .find(|rule| evaluate_group(&rule.conditions, ctx))
}
