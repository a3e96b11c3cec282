//! Explicit model registry, passed to whatever needs to resolve models.

use crate::error::{CoreError, CoreResult};
use crate::model::ModelDescriptor;
use crate::model_name::ModelName;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Collection of model descriptors keyed by unique name.
///
/// Registration order is preserved so iteration is deterministic.
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: HashMap<ModelName, Arc<dyn ModelDescriptor>>,
    order: Vec<ModelName>,
}

impl ModelRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, rejecting duplicate names
    pub fn register(&mut self, model: Arc<dyn ModelDescriptor>) -> CoreResult<()> {
        let name = model.unique_name().clone();
        if self.models.contains_key(&name) {
            return Err(CoreError::DuplicateModel {
                name: name.to_string(),
            });
        }
        self.order.push(name.clone());
        self.models.insert(name, model);
        Ok(())
    }

    /// Look up a model by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ModelDescriptor>> {
        self.models.get(name)
    }

    /// Resolve the model a compiled artifact belongs to, by file stem
    pub fn resolve_artifact(&self, path: &Path) -> CoreResult<Arc<dyn ModelDescriptor>> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        self.get(stem)
            .cloned()
            .ok_or_else(|| CoreError::ModelNotFound {
                name: stem.to_string(),
            })
    }

    /// Models in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ModelDescriptor>> {
        self.order.iter().filter_map(|name| self.models.get(name))
    }

    /// Model names in registration order
    pub fn names(&self) -> &[ModelName] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
