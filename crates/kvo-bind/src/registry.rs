#![forbid(unsafe_code)]

//! Named transformer lookup.
//!
//! A [`TransformerRegistry`] maps case-insensitive names to shared
//! transformer instances, plus case-sensitive type names to factories that
//! build a fresh instance per lookup. Registries are cheap handles: clones
//! share the same table. Each thread has a default registry reachable via
//! [`TransformerRegistry::global`]; code that wants isolation (tests, embedded
//! models) creates its own and passes it in.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;
use kvo_core::{KvoError, Result};

use crate::transformer::{FirstObject, Not, SharedTransformer, StringsToObjects, Truncated, ValueTransformer};

/// Builds a transformer on demand.
pub type TransformerFactory = Rc<dyn Fn() -> SharedTransformer>;

#[derive(Default)]
struct Tables {
    instances: AHashMap<String, SharedTransformer>,
    factories: AHashMap<String, TransformerFactory>,
}

#[derive(Clone, Default)]
pub struct TransformerRegistry {
    tables: Rc<RefCell<Tables>>,
}

thread_local! {
    static GLOBAL: TransformerRegistry = TransformerRegistry::with_builtins();
}

impl TransformerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in instances (`not`, `truncated`,
    /// `StringsToObjects`) and factories for the zero-argument transformer
    /// types (`Not`, `Truncated`, `StringsToObjects`, `FirstObject`).
    #[must_use]
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(Not, "not");
        registry.register(Truncated::new(Truncated::DEFAULT_MAX), "truncated");
        registry.register(StringsToObjects::default(), "StringsToObjects");
        registry.register_factory("Not", || Rc::new(Not));
        registry.register_factory("Truncated", || Rc::new(Truncated::default()));
        registry.register_factory("StringsToObjects", || Rc::new(StringsToObjects::default()));
        registry.register_factory("FirstObject", || Rc::new(FirstObject));
        registry
    }

    /// This thread's default registry.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.with(Clone::clone)
    }

    /// Register an instance under `name` (case-insensitive), replacing any
    /// previous registration.
    pub fn register(&self, transformer: impl ValueTransformer + 'static, name: &str) {
        self.register_shared(Rc::new(transformer), name);
    }

    pub fn register_shared(&self, transformer: SharedTransformer, name: &str) {
        self.tables
            .borrow_mut()
            .instances
            .insert(name.to_lowercase(), transformer);
    }

    /// Register a factory under a type name. Factories are consulted when no
    /// instance matches, with an exact (case-sensitive) name match.
    pub fn register_factory(&self, type_name: &str, factory: impl Fn() -> SharedTransformer + 'static) {
        self.tables
            .borrow_mut()
            .factories
            .insert(type_name.to_owned(), Rc::new(factory));
    }

    /// Look up a transformer by name.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if neither an instance nor a factory matches.
    pub fn find(&self, name: &str) -> Result<SharedTransformer> {
        let factory = {
            let tables = self.tables.borrow();
            if let Some(found) = tables.instances.get(&name.to_lowercase()) {
                return Ok(Rc::clone(found));
            }
            tables.factories.get(name).cloned()
        };
        match factory {
            Some(build) => Ok(build()),
            None => Err(KvoError::invalid(format!(
                "`{name}` does not name a registered value transformer"
            ))),
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let tables = self.tables.borrow();
        tables.instances.contains_key(&name.to_lowercase()) || tables.factories.contains_key(name)
    }

    /// Remove the instance registered under `name`, returning it.
    pub fn unregister(&self, name: &str) -> Option<SharedTransformer> {
        self.tables.borrow_mut().instances.remove(&name.to_lowercase())
    }

    /// Registered instance names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.borrow().instances.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TransformerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tables = self.tables.borrow();
        let mut factories: Vec<&String> = tables.factories.keys().collect();
        factories.sort_unstable();
        f.debug_struct("TransformerRegistry")
            .field("instances", &self.names())
            .field("factories", &factories)
            .finish()
    }
}

/// Register `transformer` under `name` in this thread's default registry.
pub fn register_transformer_with_name(transformer: impl ValueTransformer + 'static, name: &str) {
    TransformerRegistry::global().register(transformer, name);
}

/// Look `name` up in this thread's default registry.
pub fn find_transformer_with_name(name: &str) -> Result<SharedTransformer> {
    TransformerRegistry::global().find(name)
}
