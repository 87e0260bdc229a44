#![forbid(unsafe_code)]

//! Per-type property declarations.
//!
//! An [`ObjectClass`] is declared once and shared by every object of that
//! type. It lists the properties that need custom accessors, the dependent
//! keys that re-notify when their triggers change, and named comparators
//! that sort descriptors can refer to. Keys that are not declared behave as
//! plain stored data, unless the class supplies a fallback property.
//!
//! ```ignore
//! let person = ObjectClass::builder("Person")
//!     .property("fullName", PropertyDescriptor::computed(|p| {
//!         format!("{} {}", p.primitive_value("first"), p.primitive_value("last")).into()
//!     }))
//!     .dependent_key("fullName", ["first", "last"])
//!     .build()?;
//! let ann = KvoObject::with_class(&person);
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::compare::Comparator;
use crate::error::{KvoError, Result};
use crate::key_info::PropertyDescriptor;
use crate::observer::ALL_PROPERTIES_KEY;
use crate::value::Value;

/// Builds the descriptor for a key the class does not declare.
pub type FallbackProperty = Rc<dyn Fn(&str) -> PropertyDescriptor>;

/// Declared shape of an observable type.
pub struct ObjectClass {
    name: String,
    properties: AHashMap<String, PropertyDescriptor>,
    dependents: Vec<(String, Vec<String>)>,
    comparators: AHashMap<String, Comparator>,
    fallback: Option<FallbackProperty>,
}

impl ObjectClass {
    pub fn builder(name: impl Into<String>) -> ObjectClassBuilder {
        ObjectClassBuilder {
            name: name.into(),
            properties: AHashMap::new(),
            dependents: Vec::new(),
            comparators: AHashMap::new(),
            fallback: None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn property(&self, key: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(key)
    }

    /// The declared descriptor for `key`, or the fallback's.
    #[must_use]
    pub fn descriptor_for(&self, key: &str) -> Option<PropertyDescriptor> {
        match self.properties.get(key) {
            Some(descriptor) => Some(descriptor.clone()),
            None => self.fallback.as_ref().map(|fallback| fallback(key)),
        }
    }

    /// Declared property names, sorted.
    #[must_use]
    pub fn property_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// `(dependent, triggers)` pairs in declaration order.
    #[must_use]
    pub fn dependent_keys(&self) -> &[(String, Vec<String>)] {
        &self.dependents
    }

    #[must_use]
    pub fn comparator(&self, name: &str) -> Option<Comparator> {
        self.comparators.get(name).cloned()
    }
}

impl fmt::Debug for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectClass")
            .field("name", &self.name)
            .field("properties", &self.property_names())
            .field("dependents", &self.dependents)
            .field("fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ObjectClass`]. Validation happens in [`build`](Self::build).
pub struct ObjectClassBuilder {
    name: String,
    properties: AHashMap<String, PropertyDescriptor>,
    dependents: Vec<(String, Vec<String>)>,
    comparators: AHashMap<String, Comparator>,
    fallback: Option<FallbackProperty>,
}

impl ObjectClassBuilder {
    #[must_use]
    pub fn property(mut self, key: impl Into<String>, descriptor: PropertyDescriptor) -> Self {
        self.properties.insert(key.into(), descriptor);
        self
    }

    /// Declare that `dependent` changes whenever any of `triggers` changes.
    #[must_use]
    pub fn dependent_key<I, S>(mut self, dependent: impl Into<String>, triggers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependents
            .push((dependent.into(), triggers.into_iter().map(Into::into).collect()));
        self
    }

    #[must_use]
    pub fn comparator(
        mut self,
        name: impl Into<String>,
        compare: impl Fn(&Value, &Value) -> Ordering + 'static,
    ) -> Self {
        self.comparators.insert(name.into(), Rc::new(compare));
        self
    }

    /// Descriptor for every key that is not declared with
    /// [`property`](Self::property). It is asked once per key per object,
    /// when the key's info is created.
    #[must_use]
    pub fn fallback_property(mut self, fallback: impl Fn(&str) -> PropertyDescriptor + 'static) -> Self {
        self.fallback = Some(Rc::new(fallback));
        self
    }

    pub fn build(self) -> Result<Rc<ObjectClass>> {
        for key in self.properties.keys() {
            check_key(key)?;
        }
        for (dependent, triggers) in &self.dependents {
            check_dependency(dependent, triggers.iter().map(String::as_str))?;
        }
        Ok(Rc::new(ObjectClass {
            name: self.name,
            properties: self.properties,
            dependents: self.dependents,
            comparators: self.comparators,
            fallback: self.fallback,
        }))
    }
}

pub(crate) fn check_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(KvoError::invalid("key may not be empty"));
    }
    if key == ALL_PROPERTIES_KEY {
        return Err(KvoError::invalid("`*` is reserved for whole-object observation"));
    }
    Ok(())
}

pub(crate) fn check_dependency<'a>(
    dependent: &str,
    triggers: impl ExactSizeIterator<Item = &'a str>,
) -> Result<()> {
    if dependent.is_empty() {
        return Err(KvoError::invalid("dependent key may not be empty"));
    }
    if dependent.contains('.') {
        return Err(KvoError::invalid(format!(
            "dependent key `{dependent}` must be a single key, not a key path"
        )));
    }
    if triggers.len() == 0 {
        return Err(KvoError::invalid(format!(
            "dependent key `{dependent}` needs at least one trigger key"
        )));
    }
    for (i, trigger) in triggers.enumerate() {
        if check_key(trigger).is_err() {
            return Err(KvoError::invalid(format!(
                "trigger key `{trigger}` at index {i} is not a valid key"
            )));
        }
    }
    Ok(())
}
