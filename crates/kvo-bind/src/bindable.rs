#![forbid(unsafe_code)]

//! Objects that expose named bindings.
//!
//! A [`Bindable`] owns a [`KvoObject`] for its own properties and keeps one
//! [`Binding`] per exposed binding name. Binding strings resolve against the
//! bindable's [`DataModel`], or, when they start with `*.`, against a
//! relative source object.
//!
//! Without a custom observer function, a binding named `value` writes every
//! `setting` change into the bindable's own `value` key, so a consumer only
//! needs to observe its own object.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use kvo_core::{
    ChangeKind, ChangeRecord, KeyValueCoding, KvoError, KvoObject, MarkerType, Node, ObserverError,
    Result,
};

use crate::binding::{Binding, BindingObserverFn, BindingSettings, Placeholder, PlaceholderSource};
use crate::binding_string::parse_binding_string;
use crate::data_model::DataModel;
use crate::registry::TransformerRegistry;

const RELATIVE_PREFIX: &str = "*.";
const BINDING_PARAMETER_SUFFIX: &str = "Binding";

struct BindableInner {
    object: KvoObject,
    exposed: Vec<String>,
    placeholders: AHashMap<String, AHashMap<MarkerType, Placeholder>>,
    observers: AHashMap<String, BindingObserverFn>,
    relative_source: Option<Node>,
    data_model: DataModel,
    registry: TransformerRegistry,
    bindings: RefCell<AHashMap<String, Rc<Binding>>>,
}

impl PlaceholderSource for BindableInner {
    fn default_placeholder_for_marker_with_binding(
        &self,
        marker: MarkerType,
        binding: &str,
    ) -> Option<Placeholder> {
        self.placeholders.get(binding)?.get(&marker).cloned()
    }
}

/// Holds a set of named bindings and the object they write into.
#[derive(Clone)]
pub struct Bindable {
    inner: Rc<BindableInner>,
}

/// Configures a [`Bindable`].
#[derive(Default)]
pub struct BindableBuilder {
    object: Option<KvoObject>,
    exposed: Vec<String>,
    placeholders: AHashMap<String, AHashMap<MarkerType, Placeholder>>,
    observers: AHashMap<String, BindingObserverFn>,
    relative_source: Option<Node>,
    data_model: Option<DataModel>,
    registry: Option<TransformerRegistry>,
}

impl BindableBuilder {
    /// Use an existing object for the bindable's own properties.
    #[must_use]
    pub fn object(mut self, object: KvoObject) -> Self {
        self.object = Some(object);
        self
    }

    /// Expose a binding name. Bindings are set up and updated in the order
    /// they are exposed.
    #[must_use]
    pub fn expose(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.exposed.contains(&name) {
            self.exposed.push(name);
        }
        self
    }

    /// Placeholder used by the `binding` binding when it sees `marker` and
    /// configures none of its own.
    #[must_use]
    pub fn default_placeholder(
        mut self,
        binding: impl Into<String>,
        marker: MarkerType,
        placeholder: impl Into<Placeholder>,
    ) -> Self {
        self.placeholders
            .entry(binding.into())
            .or_default()
            .insert(marker, placeholder.into());
        self
    }

    /// Custom observer function for the `binding` binding, replacing the
    /// synthesized one.
    #[must_use]
    pub fn observer(
        mut self,
        binding: impl Into<String>,
        observer: impl Fn(&ChangeRecord, &str) -> std::result::Result<(), ObserverError> + 'static,
    ) -> Self {
        self.observers.insert(binding.into(), Rc::new(observer));
        self
    }

    /// Object that `*.`-prefixed key paths resolve against during
    /// [`Bindable::setup_bindings`].
    #[must_use]
    pub fn relative_source(mut self, source: impl Into<Node>) -> Self {
        self.relative_source = Some(source.into());
        self
    }

    #[must_use]
    pub fn data_model(mut self, data_model: DataModel) -> Self {
        self.data_model = Some(data_model);
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: TransformerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn build(self) -> Bindable {
        Bindable {
            inner: Rc::new(BindableInner {
                object: self.object.unwrap_or_default(),
                exposed: self.exposed,
                placeholders: self.placeholders,
                observers: self.observers,
                relative_source: self.relative_source,
                data_model: self.data_model.unwrap_or_else(DataModel::global),
                registry: self.registry.unwrap_or_else(TransformerRegistry::global),
                bindings: RefCell::default(),
            }),
        }
    }
}

impl Bindable {
    #[must_use]
    pub fn builder() -> BindableBuilder {
        BindableBuilder::default()
    }

    /// The object holding this bindable's own properties.
    #[must_use]
    pub fn object(&self) -> &KvoObject {
        &self.inner.object
    }

    #[must_use]
    pub fn exposed_bindings(&self) -> &[String] {
        &self.inner.exposed
    }

    #[must_use]
    pub fn data_model(&self) -> &DataModel {
        &self.inner.data_model
    }

    /// Default placeholder registered for `binding` and `marker`.
    #[must_use]
    pub fn default_placeholder_for_marker_with_binding(
        &self,
        marker: MarkerType,
        binding: &str,
    ) -> Option<Placeholder> {
        self.inner
            .default_placeholder_for_marker_with_binding(marker, binding)
    }

    /// The active binding called `name`.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<Rc<Binding>> {
        self.inner.bindings.borrow().get(name).cloned()
    }

    /// Bind `name` to the key path (and optional transformer) in
    /// `binding_string`, replacing any previous binding of that name.
    ///
    /// Paths starting with `*.` resolve against `relative_source`, or a
    /// fresh empty object when there is none; other paths resolve against
    /// the data model.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a malformed binding string or an unknown
    /// transformer name.
    pub fn bind_name_to_key_path(
        &self,
        name: &str,
        binding_string: &str,
        relative_source: Option<&Node>,
    ) -> Result<()> {
        let info = parse_binding_string(binding_string)?;
        let observer = self
            .inner
            .observers
            .get(name)
            .cloned()
            .unwrap_or_else(|| self.synthesized_observer(name, &info.key_path));

        // Unbind the old binding before the new one starts observing.
        let previous = self.inner.bindings.borrow_mut().remove(name);
        if let Some(previous) = previous {
            previous.unbind();
        }

        let (context, key_path): (Node, &str) = match info.key_path.strip_prefix(RELATIVE_PREFIX) {
            Some(rest) => (
                relative_source
                    .cloned()
                    .unwrap_or_else(|| Node::from(KvoObject::new())),
                rest,
            ),
            None => (Node::from(self.inner.data_model.root()), info.key_path.as_str()),
        };

        let defaults: Weak<dyn PlaceholderSource> = Rc::downgrade(&self.inner) as Weak<dyn PlaceholderSource>;
        let mut settings = BindingSettings::new(name, context, key_path)
            .shared_observer_fn(observer)
            .placeholder_source(defaults)
            .registry(self.inner.registry.clone());
        if let Some(transformer) = info.transformer {
            settings = settings.transformer_named(transformer);
        }

        let binding = Binding::new(settings)?;
        binding.bind()?;
        tracing::debug!(binding = name, key_path, "bound");
        self.inner
            .bindings
            .borrow_mut()
            .insert(name.to_owned(), Rc::new(binding));
        Ok(())
    }

    /// Bind every exposed name that has a `"<name>Binding"` entry in
    /// `parameters`, using the builder's relative source.
    pub fn setup_bindings<'a, I>(&self, parameters: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let parameters: AHashMap<&str, &str> = parameters.into_iter().collect();
        let relative_source = self.inner.relative_source.clone();
        for name in &self.inner.exposed {
            let key = format!("{name}{BINDING_PARAMETER_SUFFIX}");
            let Some(binding_string) = parameters.get(key.as_str()) else {
                continue;
            };
            self.bind_name_to_key_path(name, binding_string, relative_source.as_ref())?;
        }
        Ok(())
    }

    /// Push each binding's current value to its observer, in exposed order.
    pub fn update_bindings(&self) {
        for name in &self.inner.exposed {
            if let Some(binding) = self.binding(name) {
                binding.update();
            }
        }
    }

    /// Release every binding.
    pub fn unbind(&self) {
        let bindings: Vec<Rc<Binding>> = self.inner.bindings.borrow().values().cloned().collect();
        for binding in bindings {
            binding.unbind();
        }
    }

    /// Observer function that copies `setting` changes into this bindable's
    /// own key called `name`.
    fn synthesized_observer(&self, name: &str, key_path: &str) -> BindingObserverFn {
        let owner = Rc::downgrade(&self.inner);
        let name = name.to_owned();
        let key_path = key_path.to_owned();
        Rc::new(move |change: &ChangeRecord, _: &str| -> std::result::Result<(), ObserverError> {
            if change.kind() != ChangeKind::Setting {
                return Err(KvoError::invalid(format!(
                    "synthesized binding observer received a {} change (name=`{name}` key_path=`{key_path}`)",
                    change.kind()
                ))
                .into());
            }
            let Some(owner) = owner.upgrade() else {
                return Ok(());
            };
            owner.object.set_value_for_key(change.new_value().clone(), &name)?;
            Ok(())
        })
    }
}

impl fmt::Debug for Bindable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut bound: Vec<String> = self.inner.bindings.borrow().keys().cloned().collect();
        bound.sort_unstable();
        f.debug_struct("Bindable")
            .field("exposed", &self.inner.exposed)
            .field("bound", &bound)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kvo_core::{Marker, Value};

    fn models_with_user() -> (DataModel, KvoObject) {
        let models = DataModel::new();
        let user = KvoObject::new().with("email", "ann@example.com").with("active", true);
        models.register_model_with_name(user.clone(), "user").unwrap();
        (models, user)
    }

    fn field(models: &DataModel) -> Bindable {
        Bindable::builder()
            .expose("value")
            .expose("enabled")
            .default_placeholder("value", MarkerType::NullValue, "No value")
            .default_placeholder("value", MarkerType::MultipleValues, "Mixed")
            .data_model(models.clone())
            .registry(TransformerRegistry::with_builtins())
            .build()
    }

    #[test]
    fn synthesized_observers_copy_into_own_keys() {
        let (models, user) = models_with_user();
        let field = field(&models);
        field.bind_name_to_key_path("value", "user.email", None).unwrap();
        field.update_bindings();
        assert_eq!(field.object().value_for_key("value").unwrap(), Value::from("ann@example.com"));

        user.set_value_for_key(Value::from("bea@example.com"), "email").unwrap();
        assert_eq!(field.object().value_for_key("value").unwrap(), Value::from("bea@example.com"));
    }

    #[test]
    fn default_placeholders_fill_markers() {
        let (models, user) = models_with_user();
        let field = field(&models);
        field.bind_name_to_key_path("value", "user.email", None).unwrap();

        user.set_value_for_key(Value::Null, "email").unwrap();
        assert_eq!(field.object().value_for_key("value").unwrap(), Value::from("No value"));

        user.set_value_for_key(Value::Marker(Marker::MultipleValues), "email").unwrap();
        assert_eq!(field.object().value_for_key("value").unwrap(), Value::from("Mixed"));

        assert!(
            field
                .default_placeholder_for_marker_with_binding(MarkerType::NoSelection, "value")
                .is_none()
        );
    }

    #[test]
    fn transformers_come_from_the_binding_string() {
        let (models, user) = models_with_user();
        let field = field(&models);
        field.bind_name_to_key_path("enabled", "user.active(not)", None).unwrap();
        let binding = field.binding("enabled").unwrap();
        assert_eq!(binding.value(), Value::from(false));

        binding.set_value(Value::from(true)).unwrap();
        assert_eq!(user.value_for_key("active").unwrap(), Value::from(false));

        assert!(field.bind_name_to_key_path("enabled", "user.active(nope)", None).is_err());
        assert!(field.bind_name_to_key_path("enabled", "user.active(not", None).is_err());
    }

    #[test]
    fn relative_paths_use_the_relative_source() {
        let (models, _) = models_with_user();
        let row = KvoObject::new().with("title", "Row 1");
        let field = field(&models);
        field
            .bind_name_to_key_path("value", "*.title", Some(&Node::from(&row)))
            .unwrap();
        field.update_bindings();
        assert_eq!(field.object().value_for_key("value").unwrap(), Value::from("Row 1"));

        field.bind_name_to_key_path("value", "*.title", None).unwrap();
        field.update_bindings();
        assert_eq!(field.object().value_for_key("value").unwrap(), Value::from("No value"));
    }

    #[test]
    fn rebinding_replaces_the_previous_binding() {
        let (models, user) = models_with_user();
        let field = field(&models);
        field.bind_name_to_key_path("value", "user.email", None).unwrap();
        field.bind_name_to_key_path("value", "user.active", None).unwrap();
        field.update_bindings();
        assert_eq!(field.object().value_for_key("value").unwrap(), Value::from(true));

        user.set_value_for_key(Value::from("x@example.com"), "email").unwrap();
        assert_eq!(field.object().value_for_key("value").unwrap(), Value::from(true));
    }

    #[test]
    fn setup_bindings_reads_parameters_and_updates_in_order() {
        let (models, _) = models_with_user();
        let order: Rc<RefCell<Vec<String>>> = Rc::default();
        let (first, second) = (Rc::clone(&order), Rc::clone(&order));
        let widget = Bindable::builder()
            .expose("enabled")
            .expose("value")
            .expose("hidden")
            .observer("enabled", move |_, _| {
                first.borrow_mut().push("enabled".into());
                Ok(())
            })
            .observer("value", move |_, _| {
                second.borrow_mut().push("value".into());
                Ok(())
            })
            .data_model(models)
            .registry(TransformerRegistry::with_builtins())
            .build();
        widget
            .setup_bindings([
                ("valueBinding", "user.email"),
                ("enabledBinding", "user.active"),
                ("title", "ignored"),
            ])
            .unwrap();
        assert!(widget.binding("hidden").is_none());
        widget.update_bindings();
        assert_eq!(*order.borrow(), ["enabled", "value"]);

        widget.unbind();
        assert!(!widget.binding("value").unwrap().is_bound());
    }

    #[test]
    fn synthesized_observers_reject_array_changes() {
        let (models, user) = models_with_user();
        let tags = kvo_core::KvoArray::from_values(vec![Value::from("a")]);
        user.set_value_for_key(Value::from(tags.clone()), "tags").unwrap();
        let field = field(&models);
        field.bind_name_to_key_path("value", "user.tags", None).unwrap();
        field.update_bindings();
        let before = field.object().value_for_key("value").unwrap();

        tags.add_object("b");
        assert!(field.object().value_for_key("value").unwrap().same(&before));
    }
}
