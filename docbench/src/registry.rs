//! Explicit registration of host modules.
//!
//! The host's bootstrap sequence creates a [`ModuleRegistry`], registers each
//! module's capability object under its import path, and hands the registry to
//! the script runtime. Nothing is registered implicitly, so registration order
//! is whatever the bootstrap code says it is.
//!
//! ```ignore
//! use docbench::{module::MongoModule, registry::ModuleRegistry};
//!
//! let mut registry = ModuleRegistry::new();
//! registry.register(MongoModule::new(Default::default())?)?;
//!
//! let mongo = registry.get::<MongoModule>("k6/x/mongodb").unwrap();
//! ```

use std::{any::Any, collections::BTreeMap, sync::Arc};

use crate::error::{ModuleError, ModuleResult};

/// A capability object a host exposes to scripts under an import path.
pub trait HostModule: Send + Sync + 'static {
    /// The import path scripts use, e.g. `k6/x/mongodb`.
    fn name(&self) -> &str;

    /// Returns the module as `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

impl dyn HostModule {
    /// Attempts to downcast to a concrete module type.
    pub fn downcast_ref<M: HostModule>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }
}

#[derive(Default)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<dyn HostModule>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `module` under its own name.
    ///
    /// # Errors
    ///
    /// Returns [`ModuleError::Duplicate`] if the name is already taken; the
    /// existing registration is kept.
    pub fn register<M: HostModule>(&mut self, module: M) -> ModuleResult<()> {
        let name = module.name().to_string();

        if self.modules.contains_key(&name) {
            return Err(ModuleError::Duplicate(name));
        }

        tracing::debug!(target: "docbench::registry", module = %name, "Module registered");
        self.modules.insert(name, Arc::new(module));

        Ok(())
    }

    /// Looks up a module by name and concrete type.
    pub fn get<M: HostModule>(&self, name: &str) -> Option<&M> {
        self.modules.get(name)?.downcast_ref::<M>()
    }

    /// Looks up a module by name without knowing its type.
    pub fn get_dyn(&self, name: &str) -> Option<Arc<dyn HostModule>> {
        self.modules.get(name).cloned()
    }

    /// Registered import paths, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl HostModule for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct Other;

    impl HostModule for Other {
        fn name(&self) -> &str {
            "k6/x/other"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = ModuleRegistry::new();
        registry.register(Named("k6/x/b")).unwrap();
        registry.register(Named("k6/x/a")).unwrap();

        assert_eq!(registry.get::<Named>("k6/x/a").map(|m| m.0), Some("k6/x/a"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["k6/x/a", "k6/x/b"]);
        assert!(registry.get::<Named>("k6/x/missing").is_none());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut registry = ModuleRegistry::new();
        registry.register(Named("k6/x/a")).unwrap();

        let err = registry.register(Named("k6/x/a")).unwrap_err();
        assert!(matches!(err, ModuleError::Duplicate(ref name) if name == "k6/x/a"));
    }

    #[test]
    fn test_get_with_wrong_type_is_none() {
        let mut registry = ModuleRegistry::new();
        registry.register(Other).unwrap();

        assert!(registry.get::<Named>("k6/x/other").is_none());
        assert!(registry.get::<Other>("k6/x/other").is_some());
        assert_eq!(registry.get_dyn("k6/x/other").map(|m| m.name().to_string()).as_deref(), Some("k6/x/other"));
    }
}
