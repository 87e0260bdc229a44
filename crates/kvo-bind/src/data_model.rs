#![forbid(unsafe_code)]

//! Named model objects that bindings resolve absolute key paths against.

use kvo_core::{KeyValueCoding, KvoObject, Result, Value};

/// A root object whose keys are the registered model names.
///
/// Registering and unregistering go through `set_value_for_key`, so bindings
/// already observing `name.some.path` pick the change up.
#[derive(Clone, Debug, Default)]
pub struct DataModel {
    root: KvoObject,
}

thread_local! {
    static GLOBAL: DataModel = DataModel::new();
}

impl DataModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// This thread's default model context.
    #[must_use]
    pub fn global() -> Self {
        GLOBAL.with(Clone::clone)
    }

    #[must_use]
    pub fn root(&self) -> &KvoObject {
        &self.root
    }

    /// Make `model` available to bindings as `name`, replacing any previous
    /// model of that name.
    pub fn register_model_with_name(&self, model: impl Into<Value>, name: &str) -> Result<()> {
        self.root.set_value_for_key(model.into(), name)
    }

    /// Remove the model called `name`; bindings through it see null.
    pub fn unregister_model_with_name(&self, name: &str) -> Result<()> {
        self.root.set_value_for_key(Value::Null, name)
    }

    /// The model registered as `name`, or null.
    pub fn model_with_name(&self, name: &str) -> Result<Value> {
        self.root.value_for_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_unregister() {
        let models = DataModel::new();
        let user = KvoObject::new().with("email", "ann@example.com");
        models.register_model_with_name(user.clone(), "user").unwrap();
        assert!(models.model_with_name("user").unwrap().same(&Value::from(user)));
        assert_eq!(
            models.root().value_for_key_path("user.email").unwrap().into_value(),
            Value::from("ann@example.com")
        );

        models.unregister_model_with_name("user").unwrap();
        assert!(models.model_with_name("user").unwrap().is_null());
        assert!(models.register_model_with_name(1, "").is_err());
    }

    #[test]
    fn clones_share_the_root() {
        let models = DataModel::new();
        models.clone().register_model_with_name("x", "flag").unwrap();
        assert_eq!(models.model_with_name("flag").unwrap(), Value::from("x"));
        assert!(DataModel::global().root().ptr_eq(DataModel::global().root()));
    }
}
