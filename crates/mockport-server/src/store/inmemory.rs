use super::{ConfigStore, Fixtures, LogStore, StoreError};
use crate::cache::RouteInvalidator;
use crate::model::{
    CallLogRecord, Callback, CallbackLogRecord, MockDefinition, Project, Rule,
    MAX_CALLBACKS_PER_DEFINITION, MAX_CONDITIONS_PER_GROUP, MAX_RULES_PER_DEFINITION,
};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Default)]
struct StoreData {
    projects: Vec<Project>,
    definitions: Vec<MockDefinition>,
    rules: Vec<Rule>,
    callbacks: Vec<Callback>,
}

impl StoreData {
    fn from_fixtures(fixtures: Fixtures) -> Result<Self, StoreError> {
        let mut data = StoreData::default();
        for project_fixture in fixtures.projects {
            let project = project_fixture.project;
            for def_fixture in project_fixture.definitions {
                let mut definition = def_fixture.definition;
                definition.project_id = project.id.clone();
                definition.method = definition.method.to_ascii_uppercase();

                if def_fixture.rules.len() > MAX_RULES_PER_DEFINITION {
                    return Err(StoreError::RuleLimit(
                        definition.id,
                        MAX_RULES_PER_DEFINITION,
                    ));
                }
                if def_fixture.callbacks.len() > MAX_CALLBACKS_PER_DEFINITION {
                    return Err(StoreError::CallbackLimit(
                        definition.id,
                        MAX_CALLBACKS_PER_DEFINITION,
                    ));
                }

                for mut rule in def_fixture.rules {
                    check_condition_limit(&rule)?;
                    rule.definition_id = definition.id.clone();
                    data.rules.push(rule);
                }
                for mut callback in def_fixture.callbacks {
                    callback.definition_id = definition.id.clone();
                    data.callbacks.push(callback);
                }
                data.definitions.push(definition);
            }
            data.projects.push(project);
        }
        Ok(data)
    }

    fn project_ids(&self) -> HashSet<String> {
        self.projects.iter().map(|p| p.id.clone()).collect()
    }
}

fn check_condition_limit(rule: &Rule) -> Result<(), StoreError> {
    if rule.conditions.conditions.len() > MAX_CONDITIONS_PER_GROUP {
        return Err(StoreError::ConditionLimit(
            rule.id.clone(),
            MAX_CONDITIONS_PER_GROUP,
        ));
    }
    Ok(())
}

/// In-memory configuration and log store.
///
/// Stands in for the external relational store: it serves configuration to
/// the engine, enforces the per-definition rule/callback limits on writes and
/// calls the [`RouteInvalidator`] on every definition change. Call and
/// callback logs are kept in bounded ring buffers.
pub struct InMemoryStore {
    data: RwLock<StoreData>,
    call_logs: Mutex<VecDeque<CallLogRecord>>,
    callback_logs: Mutex<VecDeque<CallbackLogRecord>>,
    log_capacity: usize,
    invalidator: RwLock<Option<Arc<dyn RouteInvalidator>>>,
}

impl InMemoryStore {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            call_logs: Mutex::new(VecDeque::new()),
            callback_logs: Mutex::new(VecDeque::new()),
            log_capacity: log_capacity.max(1),
            invalidator: RwLock::new(None),
        }
    }

    pub fn from_fixtures(fixtures: Fixtures, log_capacity: usize) -> Result<Self, StoreError> {
        let store = Self::new(log_capacity);
        *store.data.write() = StoreData::from_fixtures(fixtures)?;
        Ok(store)
    }

    /// Attach the route cache invalidation hook.
    pub fn set_invalidator(&self, invalidator: Arc<dyn RouteInvalidator>) {
        *self.invalidator.write() = Some(invalidator);
    }

    /// Replace every entity with the fixtures' content. Every project present
    /// before or after the swap is invalidated.
    pub fn replace_all(&self, fixtures: Fixtures) -> Result<(), StoreError> {
        let new_data = StoreData::from_fixtures(fixtures)?;
        let mut affected = new_data.project_ids();
        {
            let mut data = self.data.write();
            affected.extend(data.project_ids());
            *data = new_data;
        }
        for project_id in &affected {
            self.invalidate_project(project_id);
        }
        info!("Store reloaded ({} projects affected)", affected.len());
        Ok(())
    }

    pub fn upsert_project(&self, project: Project) {
        let project_id = project.id.clone();
        {
            let mut data = self.data.write();
            match data.projects.iter_mut().find(|p| p.id == project.id) {
                Some(existing) => *existing = project,
                None => data.projects.push(project),
            }
        }
        self.invalidate_project(&project_id);
    }

    /// Create or update a definition, keeping its declaration position on update.
    pub fn upsert_definition(&self, mut definition: MockDefinition) -> Result<(), StoreError> {
        definition.method = definition.method.to_ascii_uppercase();
        let previous = {
            let mut data = self.data.write();
            if !data.projects.iter().any(|p| p.id == definition.project_id) {
                return Err(StoreError::ProjectNotFound(definition.project_id));
            }
            match data.definitions.iter_mut().find(|d| d.id == definition.id) {
                Some(existing) => Some(std::mem::replace(existing, definition.clone())),
                None => {
                    data.definitions.push(definition.clone());
                    None
                }
            }
        };

        if let Some(previous) = previous {
            self.invalidate_definition(&previous);
        }
        self.invalidate_definition(&definition);
        Ok(())
    }

    /// Delete a definition together with its rules and callbacks.
    pub fn remove_definition(&self, id: &str) -> Result<MockDefinition, StoreError> {
        let removed = {
            let mut data = self.data.write();
            let index = data
                .definitions
                .iter()
                .position(|d| d.id == id)
                .ok_or_else(|| StoreError::DefinitionNotFound(id.to_string()))?;
            data.rules.retain(|r| r.definition_id != id);
            data.callbacks.retain(|c| c.definition_id != id);
            data.definitions.remove(index)
        };
        self.invalidate_definition(&removed);
        Ok(removed)
    }

    pub fn set_definition_enabled(&self, id: &str, enabled: bool) -> Result<(), StoreError> {
        let definition = {
            let mut data = self.data.write();
            let definition = data
                .definitions
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| StoreError::DefinitionNotFound(id.to_string()))?;
            definition.enabled = enabled;
            definition.clone()
        };
        self.invalidate_definition(&definition);
        Ok(())
    }

    /// Add a rule, enforcing the per-definition and per-group limits.
    pub fn add_rule(&self, rule: Rule) -> Result<(), StoreError> {
        check_condition_limit(&rule)?;
        let mut data = self.data.write();
        if !data.definitions.iter().any(|d| d.id == rule.definition_id) {
            return Err(StoreError::DefinitionNotFound(rule.definition_id));
        }
        let count = data
            .rules
            .iter()
            .filter(|r| r.definition_id == rule.definition_id)
            .count();
        if count >= MAX_RULES_PER_DEFINITION {
            return Err(StoreError::RuleLimit(
                rule.definition_id,
                MAX_RULES_PER_DEFINITION,
            ));
        }
        data.rules.push(rule);
        Ok(())
    }

    /// Add a callback, enforcing the per-definition limit.
    pub fn add_callback(&self, callback: Callback) -> Result<(), StoreError> {
        let mut data = self.data.write();
        if !data
            .definitions
            .iter()
            .any(|d| d.id == callback.definition_id)
        {
            return Err(StoreError::DefinitionNotFound(callback.definition_id));
        }
        let count = data
            .callbacks
            .iter()
            .filter(|c| c.definition_id == callback.definition_id)
            .count();
        if count >= MAX_CALLBACKS_PER_DEFINITION {
            return Err(StoreError::CallbackLimit(
                callback.definition_id,
                MAX_CALLBACKS_PER_DEFINITION,
            ));
        }
        data.callbacks.push(callback);
        Ok(())
    }

    /// Most recent call records first, optionally scoped to a project.
    pub fn recent_calls(&self, project_id: Option<&str>, limit: usize) -> Vec<CallLogRecord> {
        self.call_logs
            .lock()
            .iter()
            .rev()
            .filter(|r| project_id.map_or(true, |id| r.project_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Most recent callback records first, optionally scoped to a definition.
    pub fn recent_callback_logs(
        &self,
        definition_id: Option<&str>,
        limit: usize,
    ) -> Vec<CallbackLogRecord> {
        self.callback_logs
            .lock()
            .iter()
            .rev()
            .filter(|r| definition_id.map_or(true, |id| r.definition_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    fn invalidate_definition(&self, definition: &MockDefinition) {
        let invalidator = self.invalidator.read().clone();
        if let Some(invalidator) = invalidator {
            if definition.is_pattern() {
                invalidator.invalidate_project(&definition.project_id);
            } else {
                invalidator.invalidate_route(
                    &definition.project_id,
                    &definition.path,
                    &definition.method,
                );
            }
        }
    }

    fn invalidate_project(&self, project_id: &str) {
        let invalidator = self.invalidator.read().clone();
        if let Some(invalidator) = invalidator {
            invalidator.invalidate_project(project_id);
        }
    }
}

fn push_bounded<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    while buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

#[async_trait]
impl ConfigStore for InMemoryStore {
    async fn project_by_short_id(&self, short_id: &str) -> Result<Option<Project>, StoreError> {
        Ok(self
            .data
            .read()
            .projects
            .iter()
            .find(|p| p.short_id == short_id)
            .cloned())
    }

    async fn definitions(
        &self,
        project_id: &str,
        method: &str,
    ) -> Result<Vec<MockDefinition>, StoreError> {
        Ok(self
            .data
            .read()
            .definitions
            .iter()
            .filter(|d| d.project_id == project_id && d.method_matches(method))
            .cloned()
            .collect())
    }

    async fn definition(&self, id: &str) -> Result<Option<MockDefinition>, StoreError> {
        Ok(self
            .data
            .read()
            .definitions
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn rules(&self, definition_id: &str) -> Result<Vec<Rule>, StoreError> {
        Ok(self
            .data
            .read()
            .rules
            .iter()
            .filter(|r| r.definition_id == definition_id)
            .cloned()
            .collect())
    }

    async fn callbacks(&self, definition_id: &str) -> Result<Vec<Callback>, StoreError> {
        Ok(self
            .data
            .read()
            .callbacks
            .iter()
            .filter(|c| c.definition_id == definition_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LogStore for InMemoryStore {
    async fn insert_call_log(&self, record: &CallLogRecord) -> Result<(), StoreError> {
        push_bounded(
            &mut self.call_logs.lock(),
            record.clone(),
            self.log_capacity,
        );
        Ok(())
    }

    async fn insert_callback_log(&self, record: &CallbackLogRecord) -> Result<(), StoreError> {
        push_bounded(
            &mut self.callback_logs.lock(),
            record.clone(),
            self.log_capacity,
        );
        Ok(())
    }
}
