#![forbid(unsafe_code)]

//! A controller for a list of objects.
//!
//! An [`ArrayController`] keeps `arrangedObjects`: the content filtered by
//! an optional predicate and sorted by [`SortDescriptor`]s. The selection is
//! a set of indexes into `arrangedObjects`.
//!
//! | key                | meaning                                          |
//! |--------------------|--------------------------------------------------|
//! | `arrangedObjects`  | filtered and sorted content, read-only           |
//! | `selectionIndexes` | ascending indexes into `arrangedObjects`         |
//! | `selectionIndex`   | first selected index, or -1                      |
//! | `hasSelection`     | whether anything is selected                     |
//! | `canAdd`           | whether [`ArrayController::add`] would add       |
//! | `canRemove`        | whether [`ArrayController::remove`] would remove |
//!
//! # Invariants
//!
//! 1. Every selected index is in range for `arrangedObjects`, and
//!    `selectedObjects` holds exactly the objects at those indexes.
//! 2. Rearranging keeps every selected object that is still arranged.
//! 3. Objects inserted into the content are merged into `arrangedObjects`
//!    at their sorted position without re-sorting the rest. Equal objects
//!    go after the ones already arranged.
//!
//! # Failure Modes
//!
//! - Content that is not an array is treated as empty.
//! - If arranging fails (an element without key-value coding, or an
//!   unresolvable named comparator) the failure is logged at warn level and
//!   `arrangedObjects` keeps its previous value.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use kvo_core::{
    ChangeKind, KeyValueCoding, KvoArray, KvoError, KvoObject, ObserverId, PropertyDescriptor, Result,
    SortDescriptor, Value, sort_values,
};

use crate::bindable::Bindable;
use crate::controller::{
    CONTENT, Controlled, ControllerCore, ControllerSettings, EDITABLE, SELECTED_OBJECTS, Slot,
    controller_class, read_only, upgrade,
};
use crate::selection::{SelectionProxy, SelectionSource};

const ARRANGED_OBJECTS: &str = "arrangedObjects";
const SELECTION_INDEXES: &str = "selectionIndexes";
const SELECTION_INDEX: &str = "selectionIndex";
const HAS_SELECTION: &str = "hasSelection";
const CAN_ADD: &str = "canAdd";
const CAN_REMOVE: &str = "canRemove";

/// Decides which content objects are arranged.
pub type FilterPredicate = Rc<dyn Fn(&Value) -> bool>;

struct ArrayState {
    core: ControllerCore,
    sort_descriptors: RefCell<Vec<SortDescriptor>>,
    filter: RefCell<Option<FilterPredicate>>,
    selection_indexes: RefCell<Vec<usize>>,
    avoids_empty_selection: Cell<bool>,
    selects_inserted_objects: Cell<bool>,
    content_observer: ObserverId,
}

impl Controlled for ArrayState {
    fn core(&self) -> &ControllerCore {
        &self.core
    }
}

impl SelectionSource for ArrayState {
    fn selected_objects(&self) -> Vec<Value> {
        self.core.selected_objects()
    }

    fn selection_is_editable(&self) -> bool {
        self.core.editable()
    }
}

impl ArrayState {
    fn content_array(&self) -> KvoArray {
        self.core
            .content()
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    fn arranged(&self) -> KvoArray {
        self.core
            .object()
            .primitive_value(ARRANGED_OBJECTS)
            .as_array()
            .cloned()
            .unwrap_or_default()
    }

    fn has_selection(&self) -> bool {
        !self.selection_indexes.borrow().is_empty()
    }

    /// Filter, then sort.
    fn arrange(&self, values: Vec<Value>) -> Result<Vec<Value>> {
        let filter = self.filter.borrow().clone();
        let mut values: Vec<Value> = match filter {
            Some(keep) => values.into_iter().filter(|value| keep(value)).collect(),
            None => values,
        };
        let descriptors = self.sort_descriptors.borrow().clone();
        sort_values(&mut values, &descriptors)?;
        Ok(values)
    }

    /// Indexes of `selected` in `arranged`, or the first row when empty
    /// selections are avoided.
    fn indexes_for(&self, arranged: &KvoArray, selected: &[Value]) -> Vec<usize> {
        let mut indexes = arranged.indexes_of_objects(selected);
        if indexes.is_empty() && self.avoids_empty_selection.get() && !arranged.is_empty() {
            indexes.push(0);
        }
        indexes
    }

    /// Rebuild `arrangedObjects` from the content and carry the selection
    /// over.
    fn rearrange(&self) -> Result<()> {
        let arranged = KvoArray::from_values(self.arrange(self.content_array().to_vec())?);
        let object = self.core.object();
        object.will_change_value_for_key(ARRANGED_OBJECTS)?;
        object.set_primitive_value(ARRANGED_OBJECTS, arranged.clone().into());
        object.did_change_value_for_key(ARRANGED_OBJECTS)?;
        let indexes = self.indexes_for(&arranged, &self.core.selected_objects());
        self.apply_selection_indexes(indexes, true, true)?;
        Ok(())
    }

    fn rearrange_or_warn(&self) {
        if let Err(err) = self.rearrange() {
            tracing::warn!(error = %err, "could not arrange the content");
        }
    }

    /// Merge objects inserted into the content into `arrangedObjects`.
    fn insert_into_arranged(&self, inserted: &Value) -> Result<()> {
        let Some(inserted) = inserted.as_array() else {
            return self.rearrange();
        };
        let incoming = self.arrange(inserted.to_vec())?;
        let arranged = self.arranged();
        let descriptors = self.sort_descriptors.borrow().clone();

        let mut merged: Vec<(Value, bool)> = arranged.to_vec().into_iter().map(|v| (v, false)).collect();
        let mut position = 0;
        for item in incoming {
            while position < merged.len() && !precedes(&descriptors, &item, &merged[position].0)? {
                position += 1;
            }
            merged.insert(position, (item, true));
            position += 1;
        }
        let (indexes, added): (Vec<usize>, Vec<Value>) = merged
            .into_iter()
            .enumerate()
            .filter(|(_, (_, new))| *new)
            .map(|(index, (value, _))| (index, value))
            .unzip();
        arranged.insert_objects_at_indexes(added.clone(), &indexes)?;

        let mut selected = self.core.selected_objects();
        if self.selects_inserted_objects.get() {
            selected.extend(added);
        }
        let indexes = self.indexes_for(&arranged, &selected);
        self.apply_selection_indexes(indexes, true, true)?;
        Ok(())
    }

    /// Select `indexes` of `arrangedObjects`. Returns whether anything was
    /// applied; an unchanged selection is skipped unless `force`d. `push`
    /// writes the new indexes through the `selectionIndexes` binding.
    fn apply_selection_indexes(&self, mut indexes: Vec<usize>, force: bool, push: bool) -> Result<bool> {
        indexes.sort_unstable();
        indexes.dedup();
        let selected = self.arranged().objects_at_indexes(&indexes)?;
        if !force && *self.selection_indexes.borrow() == indexes {
            return Ok(false);
        }
        let value: Value = indexes.iter().map(|&index| Value::from(index)).collect::<KvoArray>().into();
        if push {
            self.core.push_to_binding(SELECTION_INDEXES, &value);
        }
        let object = self.core.object();
        object.will_change_value_for_key(SELECTION_INDEXES)?;
        *self.selection_indexes.borrow_mut() = indexes;
        object.set_primitive_value(SELECTION_INDEXES, value);
        self.core.store_selected_objects(selected);
        object.did_change_value_for_key(SELECTION_INDEXES)?;
        self.core.announce_selection()?;
        Ok(true)
    }

    fn select_first_if_empty(&self) -> Result<()> {
        if self.avoids_empty_selection.get() && !self.has_selection() && !self.arranged().is_empty() {
            self.apply_selection_indexes(vec![0], false, true)?;
        }
        Ok(())
    }
}

/// Whether `a` sorts strictly before `b` under the descriptor chain.
fn precedes(descriptors: &[SortDescriptor], a: &Value, b: &Value) -> Result<bool> {
    for descriptor in descriptors {
        match descriptor.compare_objects(a, b)? {
            Ordering::Equal => {}
            ordering => return Ok(ordering.is_lt()),
        }
    }
    Ok(false)
}

/// Indexes from a `selectionIndexes` write: an array of indexes, a single
/// index, or null for none. Negative and fractional entries are dropped.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn indexes_from_value(value: &Value) -> Vec<usize> {
    let items = match value {
        Value::Null => return Vec::new(),
        Value::Array(items) => items.to_vec(),
        single => vec![single.clone()],
    };
    items
        .iter()
        .filter_map(|item| {
            let n = item.to_number();
            if n >= 0.0 && n.fract() == 0.0 && n.is_finite() {
                Some(n as usize)
            } else {
                tracing::debug!(index = %item, "ignoring selection index");
                None
            }
        })
        .collect()
}

/// Manages a list of objects: arranges it and tracks a selection in it.
///
/// ```
/// use kvo_bind::{ArrayController, ControllerSettings, DataModel};
/// use kvo_core::{KeyValueCoding, KvoArray, KvoObject, SortDescriptor, Value};
///
/// let people = ArrayController::new(ControllerSettings::new().data_model(DataModel::new())).unwrap();
/// let names = ["Cy", "Ann", "Bea"].map(|name| Value::from(KvoObject::new().with("name", name)));
/// people.set_content(KvoArray::from_values(names.to_vec())).unwrap();
/// people.set_sort_descriptors(vec![SortDescriptor::new("name", true)]).unwrap();
///
/// people.set_selection_indexes(&[0, 2]).unwrap();
/// assert_eq!(
///     people.object().value_for_key_path("selectedObjects.name").unwrap().into_value().to_string(),
///     "Ann,Cy"
/// );
/// ```
#[derive(Clone)]
pub struct ArrayController {
    state: Rc<ArrayState>,
}

impl ArrayController {
    /// # Errors
    ///
    /// Propagates class construction and observer registration errors.
    pub fn new(settings: ControllerSettings) -> Result<Self> {
        let slot: Slot<ArrayState> = Rc::default();
        let class = array_controller_class(&slot)?;
        let core = ControllerCore::new(
            &class,
            &settings,
            &[SELECTION_INDEXES],
            &slot,
            KvoArray::new().into(),
        )?;
        core.object()
            .set_primitive_value(ARRANGED_OBJECTS, KvoArray::new().into());
        core.object()
            .set_primitive_value(SELECTION_INDEXES, KvoArray::new().into());
        let state = Rc::new(ArrayState {
            core,
            sort_descriptors: RefCell::default(),
            filter: RefCell::default(),
            selection_indexes: RefCell::default(),
            avoids_empty_selection: Cell::new(settings.avoids_empty_selection),
            selects_inserted_objects: Cell::new(settings.selects_inserted_objects),
            content_observer: ObserverId::new(),
        });
        // A fresh cell always accepts its first value.
        let _ = slot.set(Rc::downgrade(&state));
        state.core.attach(&state);
        observe_content_mutations(&state)?;
        Ok(Self { state })
    }

    /// The object views bind to.
    #[must_use]
    pub fn object(&self) -> &KvoObject {
        self.state.core.object()
    }

    /// Bindings exposed: `editable`, `content` and `selectionIndexes`.
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
    pub fn content(&self) -> KvoArray {
        self.state.content_array()
    }

    /// Replace the content and rearrange. Null becomes an empty array.
    pub fn set_content(&self, content: impl Into<Value>) -> Result<()> {
        self.state.core.set_content(content.into())
    }

    #[must_use]
    pub fn arranged_objects(&self) -> KvoArray {
        self.state.arranged()
    }

    #[must_use]
    pub fn sort_descriptors(&self) -> Vec<SortDescriptor> {
        self.state.sort_descriptors.borrow().clone()
    }

    /// Sort by `descriptors` (earlier ones take precedence) and rearrange.
    ///
    /// # Errors
    ///
    /// Sorting errors; the previous descriptors are restored.
    pub fn set_sort_descriptors(&self, descriptors: Vec<SortDescriptor>) -> Result<()> {
        let previous = self.state.sort_descriptors.replace(descriptors);
        if let Err(err) = self.state.rearrange() {
            *self.state.sort_descriptors.borrow_mut() = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Arrange only the content objects `keep` accepts.
    pub fn set_filter_predicate(&self, keep: impl Fn(&Value) -> bool + 'static) -> Result<()> {
        *self.state.filter.borrow_mut() = Some(Rc::new(keep));
        self.state.rearrange()
    }

    pub fn clear_filter_predicate(&self) -> Result<()> {
        *self.state.filter.borrow_mut() = None;
        self.state.rearrange()
    }

    /// Re-filter and re-sort, for when arranged objects changed in ways the
    /// controller does not observe (a sort key edited in place).
    pub fn rearrange_objects(&self) -> Result<()> {
        self.state.rearrange()
    }

    #[must_use]
    pub fn selection_indexes(&self) -> Vec<usize> {
        self.state.selection_indexes.borrow().clone()
    }

    /// Select `indexes` of the arranged objects. Returns whether the
    /// selection changed.
    ///
    /// # Errors
    ///
    /// `Range` if an index is past the end of `arrangedObjects`.
    pub fn set_selection_indexes(&self, indexes: &[usize]) -> Result<bool> {
        self.state.apply_selection_indexes(indexes.to_vec(), false, true)
    }

    /// The first selected index. Through key-value coding an empty
    /// selection reads as -1.
    #[must_use]
    pub fn selection_index(&self) -> Option<usize> {
        self.state.selection_indexes.borrow().first().copied()
    }

    pub fn set_selection_index(&self, index: usize) -> Result<bool> {
        self.set_selection_indexes(&[index])
    }

    #[must_use]
    pub fn selected_objects(&self) -> Vec<Value> {
        self.state.core.selected_objects()
    }

    /// Select the first arranged occurrence of each of `objects`; objects
    /// that are not arranged are skipped.
    pub fn set_selected_objects(&self, objects: &[Value]) -> Result<bool> {
        let indexes = self.state.arranged().indexes_of_objects(objects);
        self.state.apply_selection_indexes(indexes, false, true)
    }

    #[must_use]
    pub fn has_selection(&self) -> bool {
        self.state.has_selection()
    }

    #[must_use]
    pub fn avoids_empty_selection(&self) -> bool {
        self.state.avoids_empty_selection.get()
    }

    /// Turning this on selects the first arranged object if nothing is
    /// selected.
    pub fn set_avoids_empty_selection(&self, avoids: bool) -> Result<()> {
        self.state.avoids_empty_selection.set(avoids);
        self.state.select_first_if_empty()
    }

    #[must_use]
    pub fn selects_inserted_objects(&self) -> bool {
        self.state.selects_inserted_objects.get()
    }

    pub fn set_selects_inserted_objects(&self, selects: bool) {
        self.state.selects_inserted_objects.set(selects);
    }

    #[must_use]
    pub fn editable(&self) -> bool {
        self.state.core.editable()
    }

    pub fn set_editable(&self, editable: bool) -> Result<()> {
        self.state.core.set_editable(editable)
    }

    #[must_use]
    pub fn can_add(&self) -> bool {
        self.editable()
    }

    #[must_use]
    pub fn can_remove(&self) -> bool {
        self.editable() && self.has_selection()
    }

    /// Append a new object of the configured class to the content and
    /// return it.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the controller is not editable.
    pub fn add(&self) -> Result<Value> {
        if !self.can_add() {
            return Err(KvoError::invalid("controller is not editable"));
        }
        let added = Value::from(self.state.core.new_object());
        self.content().add_object(added.clone());
        Ok(added)
    }

    /// Remove the selected objects from the content.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the controller is not editable.
    pub fn remove(&self) -> Result<()> {
        if !self.editable() {
            return Err(KvoError::invalid("controller is not editable"));
        }
        self.content().remove_objects(&self.selected_objects());
        Ok(())
    }
}

impl fmt::Debug for ArrayController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayController")
            .field("content", &self.content().len())
            .field("arranged", &self.arranged_objects().len())
            .field("selection_indexes", &self.selection_indexes())
            .field("sort_descriptors", &self.sort_descriptors())
            .finish_non_exhaustive()
    }
}

fn array_controller_class(slot: &Slot<ArrayState>) -> Result<Rc<kvo_core::ObjectClass>> {
    let content = Rc::clone(slot);
    let (selection_indexes, selection_index) = (Rc::clone(slot), Rc::clone(slot));
    let (index_reader, has_selection) = (Rc::clone(slot), Rc::clone(slot));
    let (can_add, can_remove) = (Rc::clone(slot), Rc::clone(slot));
    controller_class("ArrayController", slot)
        .property(
            CONTENT,
            PropertyDescriptor::stored().setter(move |object, value| {
                let value = if value.is_null() { KvoArray::new().into() } else { value };
                object.set_primitive_value(CONTENT, value);
                if let Some(state) = upgrade(&content) {
                    state.rearrange_or_warn();
                }
            }),
        )
        .property(ARRANGED_OBJECTS, read_only(ARRANGED_OBJECTS))
        .property(
            SELECTION_INDEXES,
            read_only(SELECTION_INDEXES).setter(move |_, value| {
                if let Some(state) = upgrade(&selection_indexes) {
                    let indexes = indexes_from_value(&value);
                    if let Err(err) = state.apply_selection_indexes(indexes, false, false) {
                        tracing::warn!(error = %err, "could not apply selection indexes");
                    }
                }
            }),
        )
        .property(
            SELECTION_INDEX,
            PropertyDescriptor::computed(move |_| match upgrade(&index_reader) {
                Some(state) => match state.selection_indexes.borrow().first() {
                    Some(&index) => Value::from(index),
                    None => Value::from(-1),
                },
                None => Value::from(-1),
            })
            .setter(move |_, value| {
                if let Some(state) = upgrade(&selection_index) {
                    let indexes = indexes_from_value(&value);
                    if let Err(err) = state.apply_selection_indexes(indexes, false, true) {
                        tracing::warn!(error = %err, "could not apply selection index");
                    }
                }
            }),
        )
        .property(
            HAS_SELECTION,
            PropertyDescriptor::computed(move |_| {
                Value::from(upgrade(&has_selection).is_some_and(|state| state.has_selection()))
            }),
        )
        .property(
            CAN_ADD,
            PropertyDescriptor::computed(move |_| {
                Value::from(upgrade(&can_add).is_some_and(|state| state.core.editable()))
            }),
        )
        .property(
            CAN_REMOVE,
            PropertyDescriptor::computed(move |_| {
                Value::from(
                    upgrade(&can_remove).is_some_and(|state| state.core.editable() && state.has_selection()),
                )
            }),
        )
        .dependent_key(SELECTED_OBJECTS, [SELECTION_INDEXES])
        .dependent_key(SELECTION_INDEX, [SELECTION_INDEXES])
        .dependent_key(HAS_SELECTION, [SELECTION_INDEXES])
        .dependent_key(CAN_REMOVE, [EDITABLE, SELECTION_INDEXES])
        .dependent_key(CAN_ADD, [EDITABLE])
        .build()
}

/// Insertions, deletions and replacements inside the content array reach
/// the controller through its own `content` key.
fn observe_content_mutations(state: &Rc<ArrayState>) -> Result<()> {
    let weak = Rc::downgrade(state);
    state.core.object().add_observer_for_key_path(
        state.content_observer,
        move |change, _, _| {
            let Some(state) = weak.upgrade() else {
                return Ok(());
            };
            match change.kind() {
                ChangeKind::Setting => Ok(()),
                ChangeKind::Insertion => {
                    state.insert_into_arranged(change.new_value())?;
                    Ok(())
                }
                ChangeKind::Deletion | ChangeKind::Replacement => {
                    state.rearrange()?;
                    Ok(())
                }
            }
        },
        CONTENT,
        Value::Null,
    )
}

impl Drop for ArrayState {
    fn drop(&mut self) {
        if let Err(err) = self
            .core
            .object()
            .remove_observer_for_key_path(self.content_observer, CONTENT)
        {
            tracing::debug!(error = %err, "could not stop observing content");
        }
    }
}
