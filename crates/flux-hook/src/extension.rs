//! Extensions: named, dependency-ordered bundles of hooks.

use crate::HookRef;
use serde::{Deserialize, Serialize};

/// A named bundle of hooks.
///
/// An extension may only be registered once every id in
/// `dependencies` is already registered. Cycles therefore surface as
/// a missing dependency: neither side can go first.
#[derive(Clone)]
pub struct Extension {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Ids that must be registered first.
    pub dependencies: Vec<String>,
    /// Hooks registered with the extension.
    pub hooks: Vec<HookRef>,
}

impl Extension {
    /// Creates an extension with no hooks and no dependencies.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            dependencies: Vec::new(),
            hooks: Vec::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Adds a dependency.
    #[must_use]
    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Adds a hook.
    #[must_use]
    pub fn with_hook(mut self, hook: HookRef) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Returns the serializable description of this extension.
    #[must_use]
    pub fn info(&self) -> ExtensionInfo {
        ExtensionInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            dependencies: self.dependencies.clone(),
            hook_ids: self.hooks.iter().map(|h| h.id().to_string()).collect(),
        }
    }
}

impl std::fmt::Debug for Extension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extension")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

/// Registered-extension metadata, without the hook objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Declared dependencies.
    pub dependencies: Vec<String>,
    /// Ids of the extension's hooks.
    pub hook_ids: Vec<String>,
}
