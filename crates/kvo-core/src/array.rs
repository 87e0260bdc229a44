#![forbid(unsafe_code)]

//! Observable arrays.
//!
//! Every mutation on a [`KvoArray`] emits exactly one change record on the
//! whole-object key `*`, which parents re-key to the property holding the
//! array. Elements that are themselves nodes are linked back to the array
//! (once the array is being observed) so their changes surface as
//! `replacement` records at the element's current index.
//!
//! # Invariants
//!
//! 1. Bad indexes or mismatched batch lengths are rejected before anything
//!    is mutated.
//! 2. Insertion and replacement records list indexes ascending. Deletion
//!    records list them descending (the splice order) with old values
//!    aligned to the indexes.
//! 3. An element keeps its link while another copy of it remains.
//! 4. Empty operations (removing nothing) emit nothing.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::change::{ChangeKind, ChangeRecord};
use crate::class::check_key;
use crate::error::{KvoError, Result, Validation};
use crate::key_info::KeyInfo;
use crate::keypath::KeyValueCoding;
use crate::links::{add_parent_link, remove_parent_link};
use crate::observer::{ALL_PROPERTIES_KEY, NodeCore};
use crate::value::{Node, Uid, Value};

const COUNT_KEY: &str = "@count";

/// Shared handle to an observable array.
#[derive(Clone)]
pub struct KvoArray {
    inner: Rc<ArrayInner>,
}

#[derive(Clone)]
pub(crate) struct WeakArray(Weak<ArrayInner>);

impl WeakArray {
    pub(crate) fn upgrade(&self) -> Option<KvoArray> {
        self.0.upgrade().map(|inner| KvoArray { inner })
    }
}

struct ArrayInner {
    core: NodeCore,
    items: RefCell<Vec<Value>>,
    observing: Cell<bool>,
}

impl KvoArray {
    #[must_use]
    pub fn new() -> Self {
        Self::from_values(Vec::new())
    }

    #[must_use]
    pub fn from_values(items: Vec<Value>) -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                core: NodeCore::default(),
                items: RefCell::new(items),
                observing: Cell::new(false),
            }),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[must_use]
    pub fn uid(&self) -> Uid {
        self.inner.core.uid()
    }

    pub(crate) fn core(&self) -> &NodeCore {
        &self.inner.core
    }

    pub(crate) fn downgrade(&self) -> WeakArray {
        WeakArray(Rc::downgrade(&self.inner))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.items.borrow().get(index).cloned()
    }

    /// Snapshot of the current elements.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner.items.borrow().clone()
    }

    #[must_use]
    pub fn index_of_object(&self, object: &Value) -> Option<usize> {
        self.inner.items.borrow().iter().position(|v| v.same(object))
    }

    #[must_use]
    pub fn contains_object(&self, object: &Value) -> bool {
        self.index_of_object(object).is_some()
    }

    /// Elements at `indexes`, in the order given.
    pub fn objects_at_indexes(&self, indexes: &[usize]) -> Result<Vec<Value>> {
        let items = self.inner.items.borrow();
        indexes
            .iter()
            .map(|&i| items.get(i).cloned().ok_or(KvoError::range(i, items.len())))
            .collect()
    }

    /// First index of each object that is present, ascending.
    #[must_use]
    pub fn indexes_of_objects(&self, objects: &[Value]) -> Vec<usize> {
        let mut indexes: Vec<usize> = objects
            .iter()
            .filter_map(|object| self.index_of_object(object))
            .collect();
        indexes.sort_unstable();
        indexes.dedup();
        indexes
    }

    pub fn add_object(&self, object: impl Into<Value>) {
        let object = object.into();
        let index = {
            let mut items = self.inner.items.borrow_mut();
            items.push(object.clone());
            items.len() - 1
        };
        self.link_element(&object);
        self.emit(ChangeKind::Insertion, vec![object], Vec::new(), vec![index]);
    }

    pub fn add_objects<I, V>(&self, objects: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let objects: Vec<Value> = objects.into_iter().map(Into::into).collect();
        if objects.is_empty() {
            return;
        }
        let indexes: Vec<usize> = {
            let mut items = self.inner.items.borrow_mut();
            let start = items.len();
            items.extend(objects.iter().cloned());
            (start..items.len()).collect()
        };
        for object in &objects {
            self.link_element(object);
        }
        self.emit(ChangeKind::Insertion, objects, Vec::new(), indexes);
    }

    /// Insert at `index`; `index == len()` appends.
    pub fn insert_object_at_index(&self, object: impl Into<Value>, index: usize) -> Result<()> {
        let object = object.into();
        {
            let mut items = self.inner.items.borrow_mut();
            if index > items.len() {
                return Err(KvoError::range(index, items.len()));
            }
            items.insert(index, object.clone());
        }
        self.link_element(&object);
        self.emit(ChangeKind::Insertion, vec![object], Vec::new(), vec![index]);
        Ok(())
    }

    /// Insert each object at its paired index. Pairs are applied in
    /// ascending index order; each index refers to the array as it grows.
    pub fn insert_objects_at_indexes(&self, objects: Vec<Value>, indexes: &[usize]) -> Result<()> {
        if objects.len() != indexes.len() {
            return Err(KvoError::invalid(format!(
                "{} objects but {} indexes",
                objects.len(),
                indexes.len()
            )));
        }
        let mut pairs: Vec<(usize, Value)> = indexes.iter().copied().zip(objects).collect();
        pairs.sort_by_key(|(index, _)| *index);
        let len = self.len();
        for (k, (index, _)) in pairs.iter().enumerate() {
            if *index > len + k {
                return Err(KvoError::range(*index, len + k));
            }
        }
        if pairs.is_empty() {
            return Ok(());
        }
        {
            let mut items = self.inner.items.borrow_mut();
            for (index, object) in &pairs {
                items.insert(*index, object.clone());
            }
        }
        let (indexes, objects): (Vec<usize>, Vec<Value>) = pairs.into_iter().unzip();
        for object in &objects {
            self.link_element(object);
        }
        self.emit(ChangeKind::Insertion, objects, Vec::new(), indexes);
        Ok(())
    }

    pub fn replace_object_at_index(&self, object: impl Into<Value>, index: usize) -> Result<()> {
        let object = object.into();
        let old = {
            let mut items = self.inner.items.borrow_mut();
            let len = items.len();
            let slot = items.get_mut(index).ok_or(KvoError::range(index, len))?;
            std::mem::replace(slot, object.clone())
        };
        self.unlink_element(&old);
        self.link_element(&object);
        self.emit(ChangeKind::Replacement, vec![object], vec![old], vec![index]);
        Ok(())
    }

    /// Replace the elements at `indexes`, reporting the replaced elements as
    /// old values. A repeated index is replaced once per occurrence.
    pub fn replace_objects_at_indexes(&self, objects: Vec<Value>, indexes: &[usize]) -> Result<()> {
        if objects.len() != indexes.len() {
            return Err(KvoError::invalid(format!(
                "{} objects but {} indexes",
                objects.len(),
                indexes.len()
            )));
        }
        let len = self.len();
        if let Some(&bad) = indexes.iter().find(|&&i| i >= len) {
            return Err(KvoError::range(bad, len));
        }
        if objects.is_empty() {
            return Ok(());
        }
        let mut pairs: Vec<(usize, Value)> = indexes.iter().copied().zip(objects).collect();
        pairs.sort_by_key(|(index, _)| *index);
        let olds: Vec<Value> = {
            let mut items = self.inner.items.borrow_mut();
            pairs
                .iter()
                .map(|(index, object)| std::mem::replace(&mut items[*index], object.clone()))
                .collect()
        };
        let (indexes, objects): (Vec<usize>, Vec<Value>) = pairs.into_iter().unzip();
        for old in &olds {
            self.unlink_element(old);
        }
        for object in &objects {
            self.link_element(object);
        }
        self.emit(ChangeKind::Replacement, objects, olds, indexes);
        Ok(())
    }

    /// Remove the first occurrence of `object`, if present.
    pub fn remove_object(&self, object: &Value) {
        if let Some(index) = self.index_of_object(object) {
            self.remove_sorted_descending(vec![index]);
        }
    }

    /// Remove the first occurrence of each object; absent objects are
    /// skipped. Emits one deletion record.
    pub fn remove_objects(&self, objects: &[Value]) {
        let mut taken: Vec<usize> = Vec::with_capacity(objects.len());
        {
            let items = self.inner.items.borrow();
            for object in objects {
                let found = items
                    .iter()
                    .enumerate()
                    .position(|(i, v)| v.same(object) && !taken.contains(&i));
                if let Some(i) = found {
                    taken.push(i);
                }
            }
        }
        taken.sort_unstable_by(|a, b| b.cmp(a));
        self.remove_sorted_descending(taken);
    }

    pub fn remove_object_at_index(&self, index: usize) -> Result<()> {
        let len = self.len();
        if index >= len {
            return Err(KvoError::range(index, len));
        }
        self.remove_sorted_descending(vec![index]);
        Ok(())
    }

    /// Remove the elements at `indexes` (interpreted against the array
    /// before removal). Duplicate indexes are removed once.
    pub fn remove_objects_at_indexes(&self, indexes: &[usize]) -> Result<()> {
        let len = self.len();
        if let Some(&bad) = indexes.iter().find(|&&i| i >= len) {
            return Err(KvoError::range(bad, len));
        }
        let mut sorted = indexes.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        self.remove_sorted_descending(sorted);
        Ok(())
    }

    pub fn remove_all_objects(&self) {
        let len = self.len();
        self.remove_sorted_descending((0..len).rev().collect());
    }

    fn remove_sorted_descending(&self, indexes: Vec<usize>) {
        if indexes.is_empty() {
            return;
        }
        let removed: Vec<Value> = {
            let mut items = self.inner.items.borrow_mut();
            indexes.iter().map(|&i| items.remove(i)).collect()
        };
        for old in &removed {
            self.unlink_element(old);
        }
        self.emit(ChangeKind::Deletion, Vec::new(), removed, indexes);
    }

    fn emit(&self, kind: ChangeKind, new: Vec<Value>, old: Vec<Value>, indexes: Vec<usize>) {
        let as_payload = |values: Vec<Value>| {
            if values.is_empty() {
                Value::Null
            } else {
                Value::Array(KvoArray::from_values(values))
            }
        };
        let node = self.as_node();
        let change = ChangeRecord::new(node.clone(), kind, as_payload(new), as_payload(old), Some(indexes));
        tracing::trace!(array = self.uid(), kind = %kind, "array mutation");
        node.notify(&change, ALL_PROPERTIES_KEY);
    }

    /// Link every current element. Runs once, the first time something
    /// links to this array.
    pub(crate) fn ensure_observing(&self) {
        if self.inner.observing.replace(true) {
            return;
        }
        let node = self.as_node();
        let uid = node.uid();
        for item in self.to_vec() {
            if let Some(child) = item.as_node() {
                add_parent_link(&child, &node, None, uid);
            }
        }
    }

    fn link_element(&self, element: &Value) {
        if !self.inner.observing.get() {
            return;
        }
        if let Some(child) = element.as_node() {
            let node = self.as_node();
            let uid = node.uid();
            add_parent_link(&child, &node, None, uid);
        }
    }

    fn unlink_element(&self, element: &Value) {
        let Some(child) = element.as_node() else {
            return;
        };
        if self.contains_object(element) {
            return;
        }
        remove_parent_link(&child, None, self.uid());
    }

    /// An element changed: re-emit as a replacement at its current index.
    pub(crate) fn observe_element_change(&self, change: &ChangeRecord, key_path: &str) {
        let element = change.object();
        let index = self
            .inner
            .items
            .borrow()
            .iter()
            .position(|v| v.as_node().is_some_and(|n| n.same(element)));
        let Some(index) = index else {
            tracing::debug!(array = self.uid(), element = element.uid(), "stale element link");
            remove_parent_link(element, None, self.uid());
            return;
        };
        let record = ChangeRecord::new(
            element.clone(),
            ChangeKind::Replacement,
            Value::Array(KvoArray::from_values(vec![change.new_value().clone()])),
            Value::Array(KvoArray::from_values(vec![change.old_value().clone()])),
            Some(vec![index]),
        )
        .inheriting_path(change);
        self.as_node().notify(&record, key_path);
    }
}

impl KeyValueCoding for KvoArray {
    fn as_node(&self) -> Node {
        Node::Array(self.clone())
    }

    fn info_for_key(&self, key: &str) -> Result<Rc<KeyInfo>> {
        check_key(key)?;
        Ok(Rc::new(KeyInfo::detached(key, !key.starts_with('@'))))
    }

    /// `@count` is the length; any other key is mapped over the elements,
    /// with primitives contributing null.
    fn value_for_key(&self, key: &str) -> Result<Value> {
        check_key(key)?;
        if key == COUNT_KEY {
            return Ok(Value::from(self.len()));
        }
        if key.starts_with('@') {
            return Err(KvoError::invalid(format!(
                "operator `{key}` must be followed by a key path"
            )));
        }
        let mut out = Vec::with_capacity(self.len());
        for item in self.to_vec() {
            out.push(match item.as_node() {
                Some(node) => node.value_for_key(key)?,
                None => Value::Null,
            });
        }
        Ok(Value::Array(KvoArray::from_values(out)))
    }

    /// Sets `key` on every element node.
    fn set_value_for_key(&self, value: Value, key: &str) -> Result<()> {
        check_key(key)?;
        if key.starts_with('@') {
            return Ok(());
        }
        for item in self.to_vec() {
            if let Some(node) = item.as_node() {
                node.set_value_for_key(value.clone(), key)?;
            }
        }
        Ok(())
    }

    fn validate_value_for_key(&self, value: Value, key: &str) -> Result<Validation> {
        check_key(key)?;
        Ok(Validation::Accepted(value))
    }
}

impl Default for KvoArray {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Into<Value>> FromIterator<V> for KvoArray {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Self::from_values(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for KvoArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = &self.inner.core;
        f.debug_struct("KvoArray")
            .field("uid", &core.is_active().then(|| core.uid()))
            .field("len", &self.len())
            .finish()
    }
}
