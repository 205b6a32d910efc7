//! The resource collections the server exposes and their constraint tables.

use std::{collections::HashMap, sync::Arc};

use crate::error::ServerError;
use crate::repository::{InMemoryRepository, Repository};
use crate::validation::{FieldDefault, FieldRule};

pub const TASK_FIELDS: &[FieldRule] = &[
    FieldRule::text("name", 1, 30).unique(),
    FieldRule::boolean("done").with_default(FieldDefault::Bool(false)),
];

pub const POST_FIELDS: &[FieldRule] = &[
    FieldRule::text("title", 1, 30),
    FieldRule::text("description", 1, 30),
    FieldRule::text("main_picture_url", 1, 2048)
        .nullable()
        .with_default(FieldDefault::Null),
];

/// One REST collection: its path segment, its rules, and where rows live.
#[derive(Clone)]
pub struct Resource {
    pub name: &'static str,
    pub rules: &'static [FieldRule],
    pub repository: Arc<dyn Repository>,
}

impl Resource {
    pub fn new(
        name: &'static str,
        rules: &'static [FieldRule],
        repository: Arc<dyn Repository>,
    ) -> Self {
        Self {
            name,
            rules,
            repository,
        }
    }

    /// Back the resource with an `InMemoryRepository` enforcing the rules'
    /// unique fields.
    pub fn in_memory(name: &'static str, rules: &'static [FieldRule]) -> Self {
        let unique_fields = rules
            .iter()
            .filter(|rule| rule.unique)
            .map(|rule| rule.name)
            .collect();
        Self::new(name, rules, Arc::new(InMemoryRepository::new(unique_fields)))
    }
}

#[derive(Clone, Default)]
pub struct Registry {
    resources: HashMap<&'static str, Resource>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `tasks` and `posts`, both in memory.
    pub fn standard() -> Self {
        Self::new()
            .with(Resource::in_memory("tasks", TASK_FIELDS))
            .with(Resource::in_memory("posts", POST_FIELDS))
    }

    pub fn with(mut self, resource: Resource) -> Self {
        self.resources.insert(resource.name, resource);
        self
    }

    pub fn resource(&self, name: &str) -> Result<&Resource, ServerError> {
        self.resources
            .get(name)
            .ok_or_else(|| ServerError::NotFound(format!("resource {name}")))
    }
}
