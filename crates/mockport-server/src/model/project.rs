//! Project: the tenant a set of mock definitions belongs to.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a project. Only active projects are served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    #[default]
    Active,
    Archived,
    Disabled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Archived => "archived",
            ProjectStatus::Disabled => "disabled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    /// Human-readable code used in `/mock/{shortId}/...` URLs.
    pub short_id: String,
    /// Default backend base URL used for proxying.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default)]
    pub status: ProjectStatus,
    /// User ids notified about proxy failures and scoped into live events.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub maintainers: Vec<String>,
}

impl Project {
    pub fn is_active(&self) -> bool {
        self.status == ProjectStatus::Active
    }

    /// The configured backend, ignoring blank values.
    pub fn proxy_base(&self) -> Option<&str> {
        self.proxy_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_defaults_from_json() {
        let project: Project =
            serde_json::from_str(r#"{"id": "p1", "shortId": "shop"}"#).unwrap();
        assert!(project.is_active());
        assert!(project.proxy_base().is_none());
        assert!(project.maintainers.is_empty());
    }

    #[test]
    fn test_blank_proxy_url_is_ignored() {
        let project = Project {
            id: "p1".to_string(),
            short_id: "shop".to_string(),
            proxy_url: Some("  ".to_string()),
            status: ProjectStatus::Active,
            maintainers: vec![],
        };
        assert!(project.proxy_base().is_none());
    }

    #[test]
    fn test_status_round_trip_names() {
        let status: ProjectStatus = serde_json::from_str(r#""archived""#).unwrap();
        assert_eq!(status, ProjectStatus::Archived);
        assert_eq!(status.as_str(), "archived");
    }
}
