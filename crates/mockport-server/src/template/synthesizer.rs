use super::expression::{expression_regex, single_expression, Expression};
use super::generators::GeneratorRegistry;
use super::TemplateError;
use crate::rules::{stringify, RequestContext};
use rand::Rng;
use serde_json::{Map, Value};
use tracing::warn;

const REPEAT_PREFIX: &str = "_repeat_";
const RANGE_PREFIX: &str = "_range_";

/// Expands response-body templates into concrete JSON.
pub struct TemplateSynthesizer {
    registry: GeneratorRegistry,
    max_repeat: usize,
}

impl TemplateSynthesizer {
    pub fn new(max_repeat: usize) -> Self {
        Self::with_registry(GeneratorRegistry::new(), max_repeat)
    }

    pub fn with_registry(registry: GeneratorRegistry, max_repeat: usize) -> Self {
        Self {
            registry,
            max_repeat,
        }
    }

    /// Returns the template unchanged when templating is off. Never fails:
    /// expressions that cannot be evaluated stay in the output verbatim.
    pub fn synthesize(
        &self,
        template: &Value,
        use_templating: bool,
        request: Option<&RequestContext>,
    ) -> Value {
        if !use_templating {
            return template.clone();
        }
        self.expand(template, request)
    }

    fn expand(&self, value: &Value, request: Option<&RequestContext>) -> Value {
        match value {
            Value::Object(map) => self.expand_object(map, request),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.expand(item, request))
                    .collect(),
            ),
            Value::String(s) => self.render_string(s, request),
            other => other.clone(),
        }
    }

    fn expand_object(&self, map: &Map<String, Value>, request: Option<&RequestContext>) -> Value {
        for (key, inner) in map {
            if let Some(count) = parse_repeat(key) {
                if map.len() > 1 {
                    warn!("Keys next to '{}' are ignored", key);
                }
                let count = if count > self.max_repeat {
                    warn!("'{}' capped at {} items", key, self.max_repeat);
                    self.max_repeat
                } else {
                    count
                };
                return Value::Array((0..count).map(|_| self.expand(inner, request)).collect());
            }
            if let Some((min, max)) = parse_range(key) {
                if map.len() > 1 {
                    warn!("Keys next to '{}' are ignored", key);
                }
                return Value::from(rand::thread_rng().gen_range(min..=max));
            }
        }

        Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), self.expand(v, request)))
                .collect(),
        )
    }

    /// Render every expression in a string. A string that is exactly one
    /// expression keeps the evaluated value's type.
    pub fn render_string(&self, s: &str, request: Option<&RequestContext>) -> Value {
        if !s.contains("{{") {
            return Value::String(s.to_string());
        }

        if let Some(caps) = single_expression(s) {
            return match self.evaluate(&caps, request) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Template expression '{}' left as-is: {}", s.trim(), e);
                    Value::String(s.to_string())
                }
            };
        }

        let rendered = expression_regex().replace_all(s, |caps: &regex::Captures| {
            match self.evaluate(caps, request) {
                Ok(value) => stringify(&value),
                Err(e) => {
                    warn!("Template expression '{}' left as-is: {}", &caps[0], e);
                    caps[0].to_string()
                }
            }
        });
        Value::String(rendered.into_owned())
    }

    fn evaluate(
        &self,
        caps: &regex::Captures<'_>,
        request: Option<&RequestContext>,
    ) -> Result<Value, TemplateError> {
        let expr = Expression::from_captures(caps)?;
        if expr.namespace() == "request" {
            let field = expr.path();
            return request
                .and_then(|ctx| ctx.resolve(field))
                .ok_or_else(|| TemplateError::UnresolvedField(expr.name.clone()));
        }
        self.registry.generate(&expr.name, &expr.args)
    }
}

fn parse_repeat(key: &str) -> Option<usize> {
    key.strip_prefix(REPEAT_PREFIX)?.parse().ok()
}

/// `_range_<min>_<max>`, bounds swapped if reversed. Negative bounds allowed.
fn parse_range(key: &str) -> Option<(i64, i64)> {
    let rest = key.strip_prefix(RANGE_PREFIX)?;
    // Split after the first character so a leading '-' stays with `min`.
    let split = rest
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '_')
        .map(|(i, _)| i)?;
    let min: i64 = rest[..split].parse().ok()?;
    let max: i64 = rest[split + 1..].parse().ok()?;
    Some(if min > max { (max, min) } else { (min, max) })
}
