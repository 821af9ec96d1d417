//! Fixtures file format for seeding the in-memory store.
//!
//! ```yaml
//! projects:
//!   - id: p1
//!     shortId: shop
//!     proxyUrl: http://localhost:9000
//!     maintainers: [u1]
//!     definitions:
//!       - id: d1
//!         path: /users/:id
//!         method: GET
//!         body: { id: "{{request.params.id}}", name: "{{person.fullName}}" }
//!         useTemplating: true
//!         rules:
//!           - id: r1
//!             priority: 10
//!             conditions:
//!               operator: AND
//!               conditions:
//!                 - { field: params.id, operator: equals, value: "0" }
//!             statusCode: 404
//!             body: { error: not found }
//!         callbacks:
//!           - id: c1
//!             url: http://localhost:9100/hook
//!             body: { user: "{{request.params.id}}" }
//! ```

use crate::model::{Callback, MockDefinition, Project, Rule};
use serde::Deserialize;
use std::path::Path;

use super::StoreError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Fixtures {
    #[serde(default)]
    pub projects: Vec<ProjectFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectFixture {
    #[serde(flatten)]
    pub project: Project,
    #[serde(default)]
    pub definitions: Vec<DefinitionFixture>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionFixture {
    #[serde(flatten)]
    pub definition: MockDefinition,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub callbacks: Vec<Callback>,
}

impl Fixtures {
    /// Parse a fixtures document. YAML is a superset of JSON, so both work.
    pub fn parse(contents: &str) -> Result<Self, StoreError> {
        serde_yaml::from_str(contents).map_err(|e| StoreError::Fixtures(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Fixtures(format!("{}: {e}", path.display())))?;
        Self::parse(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ServingMode;

    #[test]
    fn test_parse_yaml_fixtures() {
        let yaml = r#"
projects:
  - id: p1
    shortId: shop
    definitions:
      - id: d1
        path: /orders
        method: POST
        mode: AUTO
        rules:
          - id: r1
            priority: 1
        callbacks:
          - id: c1
            url: http://hooks.local/orders
"#;
        let fixtures = Fixtures::parse(yaml).unwrap();
        assert_eq!(fixtures.projects.len(), 1);
        let project = &fixtures.projects[0];
        assert_eq!(project.project.short_id, "shop");
        let def = &project.definitions[0];
        assert_eq!(def.definition.mode, ServingMode::Auto);
        assert_eq!(def.definition.method, "POST");
        assert_eq!(def.rules.len(), 1);
        assert_eq!(def.callbacks[0].method, "POST");
    }

    #[test]
    fn test_parse_json_fixtures() {
        let json = r#"{"projects": [{"id": "p1", "shortId": "a", "definitions": []}]}"#;
        let fixtures = Fixtures::parse(json).unwrap();
        assert_eq!(fixtures.projects[0].project.id, "p1");
    }

    #[test]
    fn test_invalid_fixtures() {
        let err = Fixtures::parse("projects: [{shortId: 1").unwrap_err();
        assert!(matches!(err, StoreError::Fixtures(_)));
    }
}
