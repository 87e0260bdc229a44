#![forbid(unsafe_code)]

//! Bindings: a transformable, marker-aware view of one key path.
//!
//! A [`Binding`] watches `key_path` on a source node. Each change is run
//! through the binding's transformer (or replaced by a placeholder when the
//! new value is a marker) and handed to the binding's observer function.
//! Writes through [`Binding::set_value`] go the other way: reverse
//! transformation, then `set_value_for_key_path` on the source.
//!
//! # Lifecycle
//!
//! `new` (unbound, value cached) → [`bind`](Binding::bind) →
//! [`unbind`](Binding::unbind). Binding and unbinding are idempotent, and
//! dropping a `Binding` unbinds it.
//!
//! # Invariants
//!
//! 1. A binding's own write never echoes back to its observer function.
//! 2. Marker values never reach the transformer.
//! 3. A failing or panicking observer function is logged and swallowed.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use kvo_core::{
    ChangeKind, ChangeRecord, KeyValueCoding, KvoError, Lookup, MarkerType, Node, ObserverError,
    ObserverId, Result, Validation, Value, call_isolated, marker_type_from_value,
};

use crate::registry::TransformerRegistry;
use crate::transformer::SharedTransformer;

/// Receives transformed changes: the change record and the key path.
pub type BindingObserverFn = Rc<dyn Fn(&ChangeRecord, &str) -> std::result::Result<(), ObserverError>>;

/// Value shown in place of a marker.
#[derive(Clone)]
pub enum Placeholder {
    Value(Value),
    /// Evaluated against the binding's source node each time it is needed.
    Computed(Rc<dyn Fn(&Node) -> Value>),
}

impl Placeholder {
    pub fn computed(compute: impl Fn(&Node) -> Value + 'static) -> Self {
        Self::Computed(Rc::new(compute))
    }

    #[must_use]
    pub fn resolve(&self, source: &Node) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Computed(compute) => compute(source),
        }
    }
}

macro_rules! placeholder_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Placeholder {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

placeholder_from!(&str, String, bool, f64, i32);

impl From<Value> for Placeholder {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Supplies default placeholders for bindings that configure none.
pub trait PlaceholderSource {
    fn default_placeholder_for_marker_with_binding(
        &self,
        marker: MarkerType,
        binding: &str,
    ) -> Option<Placeholder>;
}

/// Where a binding gets its transformer from.
#[derive(Clone)]
pub enum TransformerSource {
    /// Looked up in the settings' registry (or the thread's default).
    Named(String),
    Instance(SharedTransformer),
    Factory(Rc<dyn Fn() -> SharedTransformer>),
}

impl fmt::Debug for TransformerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Instance(_) => f.write_str("Instance(..)"),
            Self::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Construction parameters for a [`Binding`].
#[derive(Clone, Default)]
pub struct BindingSettings {
    name: String,
    object: Option<Node>,
    key_path: String,
    transformer: Option<TransformerSource>,
    observer_fn: Option<BindingObserverFn>,
    placeholder_source: Option<Weak<dyn PlaceholderSource>>,
    null_value_placeholder: Option<Placeholder>,
    multiple_values_placeholder: Option<Placeholder>,
    no_selection_placeholder: Option<Placeholder>,
    registry: Option<TransformerRegistry>,
}

impl BindingSettings {
    pub fn new(name: impl Into<String>, object: impl Into<Node>, key_path: impl Into<String>) -> Self {
        Self::default().name(name).object(object).key_path(key_path)
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn object(mut self, object: impl Into<Node>) -> Self {
        self.object = Some(object.into());
        self
    }

    #[must_use]
    pub fn key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = key_path.into();
        self
    }

    #[must_use]
    pub fn transformer_named(mut self, name: impl Into<String>) -> Self {
        self.transformer = Some(TransformerSource::Named(name.into()));
        self
    }

    #[must_use]
    pub fn transformer(mut self, transformer: SharedTransformer) -> Self {
        self.transformer = Some(TransformerSource::Instance(transformer));
        self
    }

    #[must_use]
    pub fn transformer_factory(mut self, factory: impl Fn() -> SharedTransformer + 'static) -> Self {
        self.transformer = Some(TransformerSource::Factory(Rc::new(factory)));
        self
    }

    #[must_use]
    pub fn observer_fn(
        mut self,
        observer: impl Fn(&ChangeRecord, &str) -> std::result::Result<(), ObserverError> + 'static,
    ) -> Self {
        self.observer_fn = Some(Rc::new(observer));
        self
    }

    #[must_use]
    pub fn shared_observer_fn(mut self, observer: BindingObserverFn) -> Self {
        self.observer_fn = Some(observer);
        self
    }

    #[must_use]
    pub fn placeholder_source(mut self, source: Weak<dyn PlaceholderSource>) -> Self {
        self.placeholder_source = Some(source);
        self
    }

    #[must_use]
    pub fn placeholder(mut self, marker: MarkerType, placeholder: impl Into<Placeholder>) -> Self {
        let slot = match marker {
            MarkerType::NullValue => &mut self.null_value_placeholder,
            MarkerType::MultipleValues => &mut self.multiple_values_placeholder,
            MarkerType::NoSelection => &mut self.no_selection_placeholder,
        };
        *slot = Some(placeholder.into());
        self
    }

    #[must_use]
    pub fn registry(mut self, registry: TransformerRegistry) -> Self {
        self.registry = Some(registry);
        self
    }
}

impl fmt::Debug for BindingSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSettings")
            .field("name", &self.name)
            .field("object", &self.object)
            .field("key_path", &self.key_path)
            .field("transformer", &self.transformer)
            .field("observer_fn", &self.observer_fn.is_some())
            .finish_non_exhaustive()
    }
}

struct BindingInner {
    id: ObserverId,
    name: String,
    object: Node,
    key_path: String,
    transformer: Option<SharedTransformer>,
    observer_fn: RefCell<Option<BindingObserverFn>>,
    placeholder_source: Option<Weak<dyn PlaceholderSource>>,
    null_value_placeholder: Option<Placeholder>,
    multiple_values_placeholder: Option<Placeholder>,
    no_selection_placeholder: Option<Placeholder>,
    cached_value: RefCell<Value>,
    cached_original_value: RefCell<Value>,
    marker: Cell<Option<MarkerType>>,
    updating: Cell<bool>,
    bound: Cell<bool>,
}

/// Keeps a consumer in sync with the value at a key path.
pub struct Binding {
    inner: Rc<BindingInner>,
}

impl Binding {
    /// Resolve the transformer and prime the cached value. The binding starts
    /// unbound.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for a missing object, an empty key path or an
    /// unknown transformer name.
    pub fn new(settings: BindingSettings) -> Result<Self> {
        let BindingSettings {
            name,
            object,
            key_path,
            transformer,
            observer_fn,
            placeholder_source,
            null_value_placeholder,
            multiple_values_placeholder,
            no_selection_placeholder,
            registry,
        } = settings;
        let object = object.ok_or_else(|| KvoError::invalid(format!("binding `{name}` has no object")))?;
        if key_path.is_empty() {
            return Err(KvoError::invalid(format!("binding `{name}` has an empty key path")));
        }
        let transformer = match transformer {
            None => None,
            Some(TransformerSource::Instance(t)) => Some(t),
            Some(TransformerSource::Factory(build)) => Some(build()),
            Some(TransformerSource::Named(transformer_name)) => Some(
                registry
                    .unwrap_or_else(TransformerRegistry::global)
                    .find(&transformer_name)?,
            ),
        };
        let binding = Self {
            inner: Rc::new(BindingInner {
                id: ObserverId::new(),
                name,
                object,
                key_path,
                transformer,
                observer_fn: RefCell::new(observer_fn),
                placeholder_source,
                null_value_placeholder,
                multiple_values_placeholder,
                no_selection_placeholder,
                cached_value: RefCell::default(),
                cached_original_value: RefCell::default(),
                marker: Cell::new(None),
                updating: Cell::new(false),
                bound: Cell::new(false),
            }),
        };
        binding.refresh()?;
        Ok(binding)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn key_path(&self) -> &str {
        &self.inner.key_path
    }

    #[must_use]
    pub fn object(&self) -> &Node {
        &self.inner.object
    }

    #[must_use]
    pub fn transformer(&self) -> Option<&SharedTransformer> {
        self.inner.transformer.as_ref()
    }

    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.inner.bound.get()
    }

    /// Marker type of the last value seen, if it was a marker.
    #[must_use]
    pub fn marker_type(&self) -> Option<MarkerType> {
        self.inner.marker.get()
    }

    /// Identity this binding observes its source under.
    #[must_use]
    pub fn observer_id(&self) -> ObserverId {
        self.inner.id
    }

    pub fn set_observer_fn(
        &self,
        observer: impl Fn(&ChangeRecord, &str) -> std::result::Result<(), ObserverError> + 'static,
    ) {
        *self.inner.observer_fn.borrow_mut() = Some(Rc::new(observer));
    }

    /// Re-read the source and recompute the cached value without notifying.
    pub fn refresh(&self) -> Result<()> {
        let raw = match self.inner.object.value_for_key_path(&self.inner.key_path)? {
            Lookup::Found(value) => value,
            Lookup::Unresolved => Value::Null,
        };
        *self.inner.cached_original_value.borrow_mut() = raw.clone();
        let presented = self.inner.present(&raw);
        *self.inner.cached_value.borrow_mut() = presented;
        Ok(())
    }

    /// Start observing the source. Idempotent.
    pub fn bind(&self) -> Result<()> {
        if self.inner.bound.get() {
            return Ok(());
        }
        let weak = Rc::downgrade(&self.inner);
        self.inner.object.add_observer(
            self.inner.id,
            Rc::new(move |change: &ChangeRecord, key_path: &str, _context: &Value| -> std::result::Result<(), ObserverError> {
                if let Some(inner) = weak.upgrade() {
                    inner.observe_change_for_key_path(change, key_path);
                }
                Ok(())
            }),
            &self.inner.key_path,
            Value::Null,
        )?;
        self.inner.bound.set(true);
        Ok(())
    }

    /// Stop observing the source. Idempotent.
    pub fn unbind(&self) {
        self.inner.unbind();
    }

    /// Forward path: deliver `change` to the observer function with its new
    /// value transformed (or replaced by a placeholder).
    pub fn observe_change_for_key_path(&self, change: &ChangeRecord, key_path: &str) {
        self.inner.observe_change_for_key_path(change, key_path);
    }

    /// Reverse path: write a presented value back to the source.
    ///
    /// Does nothing if `value` is the cached value, or if the transformer is
    /// forward-only.
    pub fn set_value(&self, value: Value) -> Result<()> {
        let inner = &self.inner;
        if inner.cached_value.borrow().same(&value) {
            return Ok(());
        }
        inner.marker.set(marker_type_from_value(&value));
        *inner.cached_value.borrow_mut() = value.clone();
        let model_value = match &inner.transformer {
            None => value,
            Some(transformer) => {
                if !transformer.allows_reverse_transformation() {
                    return Ok(());
                }
                match transformer.reverse_transformed_value(&value) {
                    Some(reversed) => reversed,
                    None => return Ok(()),
                }
            }
        };
        *inner.cached_original_value.borrow_mut() = model_value.clone();
        let was_updating = inner.updating.replace(true);
        let written = inner
            .object
            .set_value_for_key_path(model_value, &inner.key_path);
        inner.updating.set(was_updating);
        written
    }

    /// Reverse-transform `value` and validate it against the source.
    /// Accepted values come back forward-transformed.
    ///
    /// # Errors
    ///
    /// `IrreversibleTransformer` if the transformer cannot reverse.
    pub fn validate_proposed_value(&self, value: Value) -> Result<Validation> {
        let inner = &self.inner;
        let proposed = match &inner.transformer {
            None => value,
            Some(transformer) => {
                let reversed = transformer
                    .allows_reverse_transformation()
                    .then(|| transformer.reverse_transformed_value(&value))
                    .flatten();
                reversed.ok_or_else(|| KvoError::IrreversibleTransformer {
                    binding: inner.name.clone(),
                })?
            }
        };
        let outcome = inner
            .object
            .validate_value_for_key_path(proposed, &inner.key_path)?;
        Ok(match outcome {
            Validation::Accepted(valid) => Validation::Accepted(inner.transformed_value(&valid)),
            rejected @ Validation::Rejected(_) => rejected,
        })
    }

    /// Whether [`set_value`](Self::set_value) can reach the source.
    #[must_use]
    pub fn mutable(&self) -> bool {
        if let Some(transformer) = &self.inner.transformer {
            if !transformer.allows_reverse_transformation() {
                return false;
            }
        }
        matches!(
            self.inner.object.info_for_key_path(&self.inner.key_path),
            Ok(Some(info)) if info.is_mutable()
        )
    }

    /// The cached presented value.
    #[must_use]
    pub fn value(&self) -> Value {
        self.inner.cached_value.borrow().clone()
    }

    /// Push the cached value to the observer function as a setting change.
    pub fn update(&self) {
        let inner = &self.inner;
        let change = ChangeRecord::setting(inner.object.clone(), self.value(), Value::Null);
        let was_updating = inner.updating.replace(true);
        inner.deliver(&change, &inner.key_path);
        inner.updating.set(was_updating);
    }

    /// Apply the transformer's forward direction, if any.
    #[must_use]
    pub fn transformed_value(&self, value: &Value) -> Value {
        self.inner.transformed_value(value)
    }

    /// Placeholder for the current marker type.
    #[must_use]
    pub fn placeholder_value(&self) -> Value {
        self.inner.placeholder_value()
    }
}

impl BindingInner {
    fn transformed_value(&self, value: &Value) -> Value {
        match &self.transformer {
            Some(transformer) => transformer.transformed_value(value),
            None => value.clone(),
        }
    }

    /// Record the marker type of `raw` and compute what the consumer sees.
    fn present(&self, raw: &Value) -> Value {
        let marker = marker_type_from_value(raw);
        self.marker.set(marker);
        match marker {
            Some(_) => self.placeholder_value(),
            None => self.transformed_value(raw),
        }
    }

    fn placeholder_value(&self) -> Value {
        let Some(marker) = self.marker.get() else {
            return Value::Null;
        };
        let explicit = match marker {
            MarkerType::NullValue => self.null_value_placeholder.clone(),
            MarkerType::MultipleValues => self.multiple_values_placeholder.clone(),
            MarkerType::NoSelection => self.no_selection_placeholder.clone(),
        };
        explicit
            .or_else(|| {
                self.placeholder_source
                    .as_ref()
                    .and_then(Weak::upgrade)
                    .and_then(|source| {
                        source.default_placeholder_for_marker_with_binding(marker, &self.name)
                    })
            })
            .map(|placeholder| placeholder.resolve(&self.object))
            .unwrap_or_default()
    }

    fn observe_change_for_key_path(&self, change: &ChangeRecord, key_path: &str) {
        if self.updating.get() && change.new_value().same(&self.cached_original_value.borrow()) {
            tracing::trace!(binding = %self.name, key_path, "suppressing echo of own write");
            return;
        }
        *self.cached_original_value.borrow_mut() = change.new_value().clone();
        let presented = self.present(change.new_value());
        if change.kind() == ChangeKind::Setting {
            *self.cached_value.borrow_mut() = presented.clone();
        }
        let transformed = change.clone().with_new_value(presented);
        let was_updating = self.updating.replace(true);
        self.deliver(&transformed, key_path);
        self.updating.set(was_updating);
    }

    fn deliver(&self, change: &ChangeRecord, key_path: &str) {
        let Some(observer) = self.observer_fn.borrow().clone() else {
            return;
        };
        let span = tracing::debug_span!("binding.deliver", binding = %self.name, key_path);
        let _entered = span.enter();
        if let Err(failure) = call_isolated(|| observer(change, key_path)) {
            tracing::warn!(
                binding = %self.name,
                key_path,
                error = %failure,
                "binding observer failed"
            );
        }
    }

    fn unbind(&self) {
        if !self.bound.replace(false) {
            return;
        }
        if let Err(err) = self.object.remove_observer(self.id, &self.key_path) {
            tracing::debug!(binding = %self.name, error = %err, "unbind failed");
        }
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.inner.unbind();
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("name", &self.inner.name)
            .field("key_path", &self.inner.key_path)
            .field("bound", &self.inner.bound.get())
            .field("value", &self.inner.cached_value.borrow())
            .field("marker", &self.inner.marker.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::{Matches, Not};
    use kvo_core::{KvoObject, ObjectClass, PropertyDescriptor, ValidationError};

    type Seen = Rc<RefCell<Vec<(ChangeKind, Value)>>>;

    fn recorder() -> (Seen, impl Fn(&ChangeRecord, &str) -> std::result::Result<(), ObserverError>) {
        let seen: Seen = Rc::default();
        let sink = Rc::clone(&seen);
        (seen, move |change: &ChangeRecord, _: &str| -> std::result::Result<(), ObserverError> {
            sink.borrow_mut().push((change.kind(), change.new_value().clone()));
            Ok(())
        })
    }

    #[test]
    fn missing_intermediate_shows_the_placeholder() {
        let model = KvoObject::new().with("user", Value::Null);
        let binding = Binding::new(
            BindingSettings::new("value", &model, "user.email")
                .placeholder(MarkerType::NullValue, "No email"),
        )
        .unwrap();
        assert_eq!(binding.value(), Value::from("No email"));
        assert_eq!(binding.marker_type(), Some(MarkerType::NullValue));
    }

    #[test]
    fn forward_changes_are_transformed() {
        let model = KvoObject::new().with("done", false);
        let (seen, observer) = recorder();
        let binding = Binding::new(
            BindingSettings::new("hidden", &model, "done")
                .transformer(Rc::new(Not))
                .observer_fn(observer),
        )
        .unwrap();
        assert_eq!(binding.value(), Value::from(true));
        binding.bind().unwrap();

        model.set_value_for_key(Value::from(true), "done").unwrap();
        assert_eq!(*seen.borrow(), [(ChangeKind::Setting, Value::from(false))]);
        assert_eq!(binding.value(), Value::from(false));
    }

    #[test]
    fn own_writes_do_not_echo() {
        let model = KvoObject::new().with("name", "Ann");
        let (seen, observer) = recorder();
        let binding = Binding::new(BindingSettings::new("value", &model, "name").observer_fn(observer)).unwrap();
        binding.bind().unwrap();

        binding.set_value(Value::from("Bea")).unwrap();
        assert_eq!(model.value_for_key("name").unwrap(), Value::from("Bea"));
        assert!(seen.borrow().is_empty());

        model.set_value_for_key(Value::from("Cy"), "name").unwrap();
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn forward_only_transformers_make_one_way_bindings() {
        let model = KvoObject::new().with("code", "123");
        let binding = Binding::new(
            BindingSettings::new("valid", &model, "code").transformer(Rc::new(Matches::new(r"^\d+$").unwrap())),
        )
        .unwrap();
        assert!(!binding.mutable());
        binding.set_value(Value::from(false)).unwrap();
        assert_eq!(model.value_for_key("code").unwrap(), Value::from("123"));
        assert!(matches!(
            binding.validate_proposed_value(Value::from(true)),
            Err(KvoError::IrreversibleTransformer { .. })
        ));
    }

    #[test]
    fn mutability_follows_the_key() {
        let class = ObjectClass::builder("Doc")
            .property("title", PropertyDescriptor::computed(|_| Value::from("fixed")))
            .build()
            .unwrap();
        let doc = KvoObject::with_class(&class).with("body", "text");
        let title = Binding::new(BindingSettings::new("t", &doc, "title")).unwrap();
        let body = Binding::new(BindingSettings::new("b", &doc, "body").transformer(Rc::new(Not))).unwrap();
        assert!(!title.mutable());
        assert!(body.mutable());
    }

    #[test]
    fn validation_round_trips_through_the_transformer() {
        let class = ObjectClass::builder("Flags")
            .property(
                "enabled",
                PropertyDescriptor::stored().validator(|_, proposed| match proposed {
                    Value::Bool(_) => Validation::Accepted(proposed),
                    _ => Validation::Rejected(ValidationError::new("enabled", "not a flag")),
                }),
            )
            .build()
            .unwrap();
        let flags = KvoObject::with_class(&class).with("enabled", true);
        let binding = Binding::new(BindingSettings::new("disabled", &flags, "enabled").transformer(Rc::new(Not))).unwrap();
        assert_eq!(
            binding.validate_proposed_value(Value::from(true)).unwrap(),
            Validation::Accepted(Value::from(true))
        );
    }

    #[test]
    fn placeholders_fall_back_to_the_source_and_may_be_computed() {
        struct Defaults;
        impl PlaceholderSource for Defaults {
            fn default_placeholder_for_marker_with_binding(
                &self,
                marker: MarkerType,
                binding: &str,
            ) -> Option<Placeholder> {
                (marker == MarkerType::MultipleValues).then(|| {
                    let binding = binding.to_owned();
                    Placeholder::computed(move |_| Value::from(format!("{binding}: mixed")))
                })
            }
        }
        let defaults: Rc<dyn PlaceholderSource> = Rc::new(Defaults);
        let model = KvoObject::new().with("color", Value::Marker(kvo_core::Marker::MultipleValues));
        let binding = Binding::new(
            BindingSettings::new("color", &model, "color").placeholder_source(Rc::downgrade(&defaults)),
        )
        .unwrap();
        assert_eq!(binding.value(), Value::from("color: mixed"));

        model.set_value_for_key(Value::from(""), "color").unwrap();
        binding.refresh().unwrap();
        assert_eq!(binding.value(), Value::Null);
    }

    #[test]
    fn failing_observer_functions_are_swallowed() {
        let model = KvoObject::new().with("n", 1);
        let binding = Binding::new(
            BindingSettings::new("n", &model, "n").observer_fn(|_, _| Err("broken view".into())),
        )
        .unwrap();
        binding.bind().unwrap();
        model.set_value_for_key(Value::from(2), "n").unwrap();
        binding.update();
        assert_eq!(binding.value(), Value::from(2));
    }

    #[test]
    fn bind_and_unbind_are_idempotent_and_drop_unbinds() {
        let model = KvoObject::new().with("n", 1);
        let node = Node::from(&model);
        let binding = Binding::new(BindingSettings::new("n", &model, "n")).unwrap();
        binding.bind().unwrap();
        binding.bind().unwrap();
        assert_eq!(node.observer_count("n"), 1);
        binding.unbind();
        binding.unbind();
        assert_eq!(node.observer_count("n"), 0);

        binding.bind().unwrap();
        drop(binding);
        assert_eq!(node.observer_count("n"), 0);
    }

    #[test]
    fn unknown_transformer_names_fail_construction() {
        let model = KvoObject::new();
        let err = Binding::new(
            BindingSettings::new("x", &model, "x")
                .transformer_named("nope")
                .registry(TransformerRegistry::with_builtins()),
        )
        .unwrap_err();
        assert!(matches!(err, KvoError::InvalidArgument { .. }));
        assert!(Binding::new(BindingSettings::default().name("x")).is_err());
    }

    #[test]
    fn update_pushes_the_cached_value() {
        let model = KvoObject::new().with("n", 5);
        let (seen, observer) = recorder();
        let binding = Binding::new(BindingSettings::new("n", &model, "n").observer_fn(observer)).unwrap();
        binding.update();
        assert_eq!(*seen.borrow(), [(ChangeKind::Setting, Value::from(5))]);
    }
}
