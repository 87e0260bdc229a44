#![forbid(unsafe_code)]

//! Controllers: bindable objects that manage content for a view.
//!
//! A controller is a [`Bindable`] whose own object carries the keys views
//! bind to. Every controller has:
//!
//! | key               | meaning                                              |
//! |-------------------|------------------------------------------------------|
//! | `content`         | what the controller manages; bindable                |
//! | `editable`        | whether edits are accepted; bindable                 |
//! | `selectedObjects` | the selected objects, read-only                      |
//! | `selection`       | a [`SelectionProxy`] over `selectedObjects`          |
//!
//! An [`ObjectController`] manages one object, which is also its whole
//! selection. [`ArrayController`](crate::ArrayController) manages a list.
//!
//! While `content` is bound, the controller is editable only if the bound
//! key path accepts writes.

use std::cell::{Cell, OnceCell};
use std::fmt;
use std::rc::{Rc, Weak};

use kvo_core::{
    ChangeKind, ChangeRecord, KeyValueCoding, KvoArray, KvoObject, ObjectClass, ObjectClassBuilder,
    ObserverError, PropertyDescriptor, Result, Value,
};

use crate::bindable::Bindable;
use crate::binding::Binding;
use crate::data_model::DataModel;
use crate::registry::TransformerRegistry;
use crate::selection::{SelectionProxy, SelectionSource};

pub(crate) const CONTENT: &str = "content";
pub(crate) const EDITABLE: &str = "editable";
pub(crate) const SELECTED_OBJECTS: &str = "selectedObjects";
pub(crate) const SELECTION: &str = "selection";

/// Late-bound back reference from a controller's class to its state.
pub(crate) type Slot<T> = Rc<OnceCell<Weak<T>>>;

pub(crate) fn upgrade<T>(slot: &Slot<T>) -> Option<Rc<T>> {
    slot.get().and_then(Weak::upgrade)
}

/// Configuration shared by every controller.
#[derive(Clone, Default)]
pub struct ControllerSettings {
    pub(crate) data_model: Option<DataModel>,
    pub(crate) registry: Option<TransformerRegistry>,
    pub(crate) object_class: Option<Rc<ObjectClass>>,
    pub(crate) avoids_empty_selection: bool,
    pub(crate) selects_inserted_objects: bool,
}

impl ControllerSettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Where absolute binding key paths and `register_with_name` resolve.
    /// Defaults to [`DataModel::global`].
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

    /// Class of the objects an array controller's `add` creates.
    #[must_use]
    pub fn object_class(mut self, class: Rc<ObjectClass>) -> Self {
        self.object_class = Some(class);
        self
    }

    /// Keep at least one object selected whenever there is one to select.
    #[must_use]
    pub fn avoids_empty_selection(mut self, avoids: bool) -> Self {
        self.avoids_empty_selection = avoids;
        self
    }

    /// Add objects inserted into the content to the selection.
    #[must_use]
    pub fn selects_inserted_objects(mut self, selects: bool) -> Self {
        self.selects_inserted_objects = selects;
        self
    }
}

/// Controller state that owns a [`ControllerCore`].
pub(crate) trait Controlled {
    fn core(&self) -> &ControllerCore;
}

/// The part every controller shares: its bindable, its selection proxy and
/// its editable flag.
pub(crate) struct ControllerCore {
    bindable: Bindable,
    selection: SelectionProxy,
    editable: Cell<bool>,
    object_class: Option<Rc<ObjectClass>>,
}

impl ControllerCore {
    /// Build the controller object from `class` with `content` as its
    /// initial content. `exposed` lists bindings beyond `editable` and
    /// `content`.
    pub(crate) fn new<S: Controlled + 'static>(
        class: &Rc<ObjectClass>,
        settings: &ControllerSettings,
        exposed: &[&str],
        slot: &Slot<S>,
        content: Value,
    ) -> Result<Self> {
        let object = KvoObject::with_class(class);
        let selection = SelectionProxy::new()?;
        object.set_primitive_value(CONTENT, content);
        object.set_primitive_value(SELECTED_OBJECTS, KvoArray::new().into());
        object.set_primitive_value(SELECTION, selection.object().clone().into());

        let mut builder = Bindable::builder()
            .object(object)
            .expose(EDITABLE)
            .expose(CONTENT)
            .observer(CONTENT, content_observer(slot));
        for name in exposed {
            builder = builder.expose(*name);
        }
        if let Some(data_model) = &settings.data_model {
            builder = builder.data_model(data_model.clone());
        }
        if let Some(registry) = &settings.registry {
            builder = builder.registry(registry.clone());
        }
        Ok(Self {
            bindable: builder.build(),
            selection,
            editable: Cell::new(true),
            object_class: settings.object_class.clone(),
        })
    }

    /// Point the selection proxy at the finished controller state.
    pub(crate) fn attach<S: SelectionSource + 'static>(&self, state: &Rc<S>) {
        let source: Weak<dyn SelectionSource> = Rc::downgrade(state) as Weak<dyn SelectionSource>;
        self.selection.attach(source);
    }

    pub(crate) fn object(&self) -> &KvoObject {
        self.bindable.object()
    }

    pub(crate) fn bindable(&self) -> &Bindable {
        &self.bindable
    }

    pub(crate) fn selection(&self) -> &SelectionProxy {
        &self.selection
    }

    fn bound(&self, name: &str) -> Option<Rc<Binding>> {
        self.bindable.binding(name).filter(|binding| binding.is_bound())
    }

    /// Write `value` to the model behind the `name` binding, if bound.
    pub(crate) fn push_to_binding(&self, name: &str, value: &Value) {
        if let Some(binding) = self.bound(name) {
            if let Err(err) = binding.set_value(value.clone()) {
                tracing::warn!(binding = name, error = %err, "controller could not write to its binding");
            }
        }
    }

    pub(crate) fn register_with_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Ok(());
        }
        self.bindable
            .data_model()
            .register_model_with_name(self.object().clone(), name)
    }

    pub(crate) fn content(&self) -> Value {
        self.object().primitive_value(CONTENT)
    }

    pub(crate) fn set_content(&self, content: Value) -> Result<()> {
        self.push_to_binding(CONTENT, &content);
        self.object().set_value_for_key(content, CONTENT)
    }

    pub(crate) fn editable(&self) -> bool {
        self.editable.get() && self.bound(CONTENT).is_none_or(|content| content.mutable())
    }

    fn store_editable(&self, value: &Value) {
        let mut editable = value.truthy();
        if let Some(content) = self.bound(CONTENT) {
            editable &= content.mutable();
        }
        self.editable.set(editable);
    }

    pub(crate) fn set_editable(&self, editable: bool) -> Result<()> {
        let value = Value::from(editable);
        self.push_to_binding(EDITABLE, &value);
        self.object().set_value_for_key(value, EDITABLE)
    }

    pub(crate) fn selected_objects(&self) -> Vec<Value> {
        self.object()
            .primitive_value(SELECTED_OBJECTS)
            .as_array()
            .map(KvoArray::to_vec)
            .unwrap_or_default()
    }

    /// Raw write; callers bracket it.
    pub(crate) fn store_selected_objects(&self, objects: Vec<Value>) {
        self.object()
            .set_primitive_value(SELECTED_OBJECTS, KvoArray::from_values(objects).into());
    }

    /// The proxy object never changes identity, so a new selection is
    /// announced with a forced notification of `selection`.
    pub(crate) fn announce_selection(&self) -> Result<()> {
        self.selection.selection_did_change();
        self.object().force_change_notification_for_key(SELECTION)
    }

    pub(crate) fn new_object(&self) -> KvoObject {
        match &self.object_class {
            Some(class) => KvoObject::with_class(class),
            None => KvoObject::new(),
        }
    }
}

/// Class builder with the keys every controller has except `content`.
pub(crate) fn controller_class<S: Controlled + 'static>(name: &str, slot: &Slot<S>) -> ObjectClassBuilder {
    let (reader, writer) = (Rc::clone(slot), Rc::clone(slot));
    ObjectClass::builder(name)
        .property(
            EDITABLE,
            PropertyDescriptor::computed(move |_| {
                Value::from(upgrade(&reader).is_some_and(|state| state.core().editable()))
            })
            .setter(move |_, value| {
                if let Some(state) = upgrade(&writer) {
                    state.core().store_editable(&value);
                }
            }),
        )
        .property(SELECTED_OBJECTS, read_only(SELECTED_OBJECTS))
        .property(SELECTION, read_only(SELECTION))
}

/// A key only the controller itself writes, through raw storage.
pub(crate) fn read_only(key: &'static str) -> PropertyDescriptor {
    PropertyDescriptor::computed(move |object| object.primitive_value(key))
}

/// Observer for the `content` binding. Only settings are copied in; list
/// mutations reach the controller through its own `content` key.
fn content_observer<S: Controlled + 'static>(
    slot: &Slot<S>,
) -> impl Fn(&ChangeRecord, &str) -> std::result::Result<(), ObserverError> + 'static {
    let slot = Rc::clone(slot);
    move |change, _| {
        if change.kind() != ChangeKind::Setting {
            return Ok(());
        }
        if let Some(state) = upgrade(&slot) {
            state
                .core()
                .object()
                .set_value_for_key(change.new_value().clone(), CONTENT)?;
        }
        Ok(())
    }
}

struct ObjectState {
    core: ControllerCore,
}

impl Controlled for ObjectState {
    fn core(&self) -> &ControllerCore {
        &self.core
    }
}

impl SelectionSource for ObjectState {
    fn selected_objects(&self) -> Vec<Value> {
        self.core.selected_objects()
    }

    fn selection_is_editable(&self) -> bool {
        self.core.editable()
    }
}

impl ObjectState {
    /// Non-empty content is the whole selection.
    fn content_did_change(&self, content: &Value) -> Result<()> {
        let object = self.core.object();
        object.will_change_value_for_key(SELECTED_OBJECTS)?;
        let selected = if content.truthy() {
            vec![content.clone()]
        } else {
            Vec::new()
        };
        self.core.store_selected_objects(selected);
        object.did_change_value_for_key(SELECTED_OBJECTS)?;
        self.core.announce_selection()
    }
}

/// Manages a single object and presents it through `selection`.
///
/// ```
/// use kvo_bind::{ControllerSettings, DataModel, ObjectController};
/// use kvo_core::{KeyValueCoding, KvoObject, Marker, Value};
///
/// let controller = ObjectController::new(ControllerSettings::new().data_model(DataModel::new())).unwrap();
/// assert_eq!(
///     controller.object().value_for_key_path("selection.name").unwrap().into_value(),
///     Value::Marker(Marker::NoSelection)
/// );
///
/// controller.set_content(KvoObject::new().with("name", "Ann")).unwrap();
/// assert_eq!(
///     controller.object().value_for_key_path("selection.name").unwrap().into_value(),
///     Value::from("Ann")
/// );
/// ```
#[derive(Clone)]
pub struct ObjectController {
    state: Rc<ObjectState>,
}

impl ObjectController {
    /// # Errors
    ///
    /// Propagates class construction errors.
    pub fn new(settings: ControllerSettings) -> Result<Self> {
        let slot: Slot<ObjectState> = Rc::default();
        let writer = Rc::clone(&slot);
        let class = controller_class("ObjectController", &slot)
            .property(
                CONTENT,
                PropertyDescriptor::stored().setter(move |object, content| {
                    object.set_primitive_value(CONTENT, content.clone());
                    if let Some(state) = upgrade(&writer) {
                        if let Err(err) = state.content_did_change(&content) {
                            tracing::warn!(error = %err, "could not select the new content");
                        }
                    }
                }),
            )
            .build()?;
        let core = ControllerCore::new(&class, &settings, &[], &slot, Value::Null)?;
        let state = Rc::new(ObjectState { core });
        // A fresh cell always accepts its first value.
        let _ = slot.set(Rc::downgrade(&state));
        state.core.attach(&state);
        Ok(Self { state })
    }

    /// The object views bind to.
    #[must_use]
    pub fn object(&self) -> &KvoObject {
        self.state.core.object()
    }

    /// Bindings exposed: `editable` and `content`.
    #[must_use]
    pub fn bindable(&self) -> &Bindable {
        self.state.core.bindable()
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionProxy {
        self.state.core.selection()
    }

    /// Register the controller object in its data model as `name`. An empty
    /// name does nothing.
    pub fn register_with_name(&self, name: &str) -> Result<()> {
        self.state.core.register_with_name(name)
    }

    #[must_use]
    pub fn content(&self) -> Value {
        self.state.core.content()
    }

    /// Replace the content, writing it through the `content` binding too.
    pub fn set_content(&self, content: impl Into<Value>) -> Result<()> {
        self.state.core.set_content(content.into())
    }

    #[must_use]
    pub fn editable(&self) -> bool {
        self.state.core.editable()
    }

    pub fn set_editable(&self, editable: bool) -> Result<()> {
        self.state.core.set_editable(editable)
    }

    /// The content, or nothing when the content is empty.
    #[must_use]
    pub fn selected_objects(&self) -> Vec<Value> {
        self.state.core.selected_objects()
    }
}

impl fmt::Debug for ObjectController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectController")
            .field("content", &self.content())
            .field("editable", &self.editable())
            .finish_non_exhaustive()
    }
}
