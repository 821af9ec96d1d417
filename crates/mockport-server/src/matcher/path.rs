use std::collections::HashMap;

/// Strip leading/trailing slashes and collapse empty segments.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// `:name` parameter or `*` wildcard.
pub fn is_pattern_segment(segment: &str) -> bool {
    segment == "*" || (segment.len() > 1 && segment.starts_with(':'))
}

/// Structural match of a normalized request path against a normalized pattern.
///
/// Segment counts must be equal and every literal segment must be equal.
/// Parameter and wildcard segments match any single segment; parameters are
/// returned by name.
///
/// ```
/// use mockport_server::matcher::match_pattern;
///
/// let params = match_pattern("users/:id", "users/42").unwrap();
/// assert_eq!(params["id"], "42");
/// assert!(match_pattern("users/:id", "users/42/posts").is_none());
/// ```
pub fn match_pattern(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let pattern_parts: Vec<&str> = split_segments(pattern);
    let path_parts: Vec<&str> = split_segments(path);

    if pattern_parts.len() != path_parts.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (pattern_part, path_part) in pattern_parts.iter().zip(path_parts.iter()) {
        if *pattern_part == "*" {
            continue;
        }
        if let Some(name) = pattern_part.strip_prefix(':').filter(|n| !n.is_empty()) {
            params.insert(name.to_string(), decode_segment(path_part));
        } else if pattern_part != path_part {
            return None;
        }
    }

    Some(params)
}

fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}
