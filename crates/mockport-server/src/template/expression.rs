use super::TemplateError;
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// `{{namespace.path}}` or `{{namespace.path(args)}}`. The argument list
/// ends at the first `)` followed by `}}`, so `)` may appear inside strings.
static EXPRESSION_REGEX: OnceLock<Regex> = OnceLock::new();

pub fn expression_regex() -> &'static Regex {
    EXPRESSION_REGEX.get_or_init(|| {
        Regex::new(
            r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_\-]+)+)\s*(?:\((.*?)\)\s*\}\}|\}\})",
        )
        .unwrap()
    })
}

/// A parsed template expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    /// Full dotted name, e.g. `person.firstName`
    pub name: String,
    pub args: Vec<Value>,
}

impl Expression {
    pub fn namespace(&self) -> &str {
        self.name.split('.').next().unwrap_or_default()
    }

    /// Everything after the namespace.
    pub fn path(&self) -> &str {
        self.name
            .split_once('.')
            .map(|(_, rest)| rest)
            .unwrap_or_default()
    }

    pub fn from_captures(caps: &regex::Captures<'_>) -> Result<Self, TemplateError> {
        let name = caps[1].to_string();
        let args = match caps.get(2) {
            Some(raw) => parse_args(&name, raw.as_str())?,
            None => Vec::new(),
        };
        Ok(Self { name, args })
    }
}

/// Arguments are the body of a JSON array literal.
pub fn parse_args(name: &str, raw: &str) -> Result<Vec<Value>, TemplateError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Vec<Value>>(&format!("[{raw}]")).map_err(|e| {
        TemplateError::InvalidArguments {
            generator: name.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Whether the string is exactly one expression (ignoring surrounding space).
pub fn single_expression(s: &str) -> Option<regex::Captures<'_>> {
    let trimmed = s.trim();
    expression_regex()
        .captures(trimmed)
        .filter(|caps| caps.get(0).map(|m| m.as_str().len()) == Some(trimmed.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(s: &str) -> Expression {
        let caps = expression_regex().captures(s).unwrap();
        Expression::from_captures(&caps).unwrap()
    }

    #[test]
    fn test_plain_expression() {
        let expr = parse("{{person.firstName}}");
        assert_eq!(expr.name, "person.firstName");
        assert_eq!(expr.namespace(), "person");
        assert_eq!(expr.path(), "firstName");
        assert!(expr.args.is_empty());
    }

    #[test]
    fn test_expression_with_args() {
        let expr = parse(r#"{{ number.int(1, 10) }}"#);
        assert_eq!(expr.args, vec![json!(1), json!(10)]);

        let expr = parse(r#"{{helpers.arrayElement(["a", "b"])}}"#);
        assert_eq!(expr.args, vec![json!(["a", "b"])]);

        let expr = parse(r#"{{number.int({"min": 2, "max": 4})}}"#);
        assert_eq!(expr.args, vec![json!({"min": 2, "max": 4})]);
    }

    #[test]
    fn test_parenthesis_inside_string_argument() {
        let expr = parse(r#"{{helpers.arrayElement(["a)", "b"])}}"#);
        assert_eq!(expr.name, "helpers.arrayElement");
        assert_eq!(expr.args, vec![json!(["a)", "b"])]);

        let expr = parse(r#"{{ helpers.arrayElement(["(x)", ")"]) }}"#);
        assert_eq!(expr.args, vec![json!(["(x)", ")"])]);
    }

    #[test]
    fn test_adjacent_expressions_match_separately() {
        let text = r#"{{number.int(1, 2)}}-{{helpers.arrayElement(["a)"])}}-{{string.uuid}}"#;
        let names: Vec<&str> = expression_regex()
            .captures_iter(text)
            .map(|caps| caps.get(1).unwrap().as_str())
            .collect();
        assert_eq!(names, vec!["number.int", "helpers.arrayElement", "string.uuid"]);

        let caps: Vec<_> = expression_regex().captures_iter(text).collect();
        assert_eq!(caps[0].get(2).unwrap().as_str(), "1, 2");
        assert!(caps[2].get(2).is_none());
    }

    #[test]
    fn test_deep_request_path() {
        let expr = parse("{{request.body.user.name}}");
        assert_eq!(expr.namespace(), "request");
        assert_eq!(expr.path(), "body.user.name");
    }

    #[test]
    fn test_bad_args() {
        let caps = expression_regex()
            .captures("{{number.int(1,,)}}")
            .unwrap();
        assert!(Expression::from_captures(&caps).is_err());
    }

    #[test]
    fn test_single_expression_detection() {
        assert!(single_expression("{{string.uuid}}").is_some());
        assert!(single_expression("  {{number.int(1,2)}} ").is_some());
        assert!(single_expression("id-{{string.uuid}}").is_none());
        assert!(single_expression("{{a.b}}{{c.d}}").is_none());
    }

    #[test]
    fn test_no_namespace_is_not_an_expression() {
        assert!(expression_regex().captures("{{name}}").is_none());
    }
}
