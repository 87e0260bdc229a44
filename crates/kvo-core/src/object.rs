#![forbid(unsafe_code)]

//! Observable objects.
//!
//! A [`KvoObject`] is a shared handle to a bag of named properties. Reads and
//! writes go through lazily created [`KeyInfo`] entries so every write is
//! bracketed by `will_change_value_for_key` / `did_change_value_for_key` and
//! every composite value read is linked back to the object.
//!
//! # Invariants
//!
//! 1. Only the outermost of nested will/did brackets on a key emits a change
//!    record, carrying the value from before the outermost `will` and the
//!    value after the outermost `did`.
//! 2. A bracket whose before and after values are the same (identity for
//!    composites) emits nothing.
//! 3. Dependent keys open and close their brackets inside their trigger's
//!    bracket, so they notify after the trigger.
//!
//! # Failure Modes
//!
//! - `did_change_value_for_key` without a matching `will`: logged at debug
//!   level and ignored.
//! - Writes to read-only keys are ignored silently.
//! - A getter or setter that panics during `set_value_for_key` closes the
//!   write's bracket without notifying.
//! - Cyclic dependent-key declarations leave brackets unbalanced; declare
//!   dependencies as a DAG.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::change::ChangeRecord;
use crate::class::{ObjectClass, check_dependency, check_key};
use crate::error::{Result, Validation};
use crate::key_info::KeyInfo;
use crate::keypath::KeyValueCoding;
use crate::links::{add_parent_link, remove_parent_link};
use crate::observer::NodeCore;
use crate::value::{Node, Uid, Value};

/// Shared handle to an observable object.
#[derive(Clone)]
pub struct KvoObject {
    inner: Rc<ObjectInner>,
}

#[derive(Clone)]
pub(crate) struct WeakObject(Weak<ObjectInner>);

impl WeakObject {
    pub(crate) fn upgrade(&self) -> Option<KvoObject> {
        self.0.upgrade().map(|inner| KvoObject { inner })
    }
}

struct ObjectInner {
    core: NodeCore,
    class: Option<Rc<ObjectClass>>,
    fields: RefCell<BTreeMap<String, Value>>,
    keys: RefCell<AHashMap<String, Rc<KeyInfo>>>,
    /// Trigger key to the keys that depend on it.
    dependents: RefCell<AHashMap<String, Vec<String>>>,
}

impl KvoObject {
    /// An object with no declared properties; every key is stored data.
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// An object whose keys follow `class`'s declarations.
    #[must_use]
    pub fn with_class(class: &Rc<ObjectClass>) -> Self {
        let object = Self::build(Some(Rc::clone(class)));
        for (dependent, triggers) in class.dependent_keys() {
            object.record_dependency(triggers, dependent);
        }
        object
    }

    fn build(class: Option<Rc<ObjectClass>>) -> Self {
        Self {
            inner: Rc::new(ObjectInner {
                core: NodeCore::default(),
                class,
                fields: RefCell::new(BTreeMap::new()),
                keys: RefCell::new(AHashMap::new()),
                dependents: RefCell::new(AHashMap::new()),
            }),
        }
    }

    /// Builder-style initial value. Stores directly, without notifying.
    #[must_use]
    pub fn with(self, key: &str, value: impl Into<Value>) -> Self {
        self.set_primitive_value(key, value.into());
        self
    }

    #[must_use]
    pub fn class(&self) -> Option<&Rc<ObjectClass>> {
        self.inner.class.as_ref()
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

    pub(crate) fn downgrade(&self) -> WeakObject {
        WeakObject(Rc::downgrade(&self.inner))
    }

    /// Raw storage read. Bypasses accessors, links and notifications; meant
    /// for custom getters and setters.
    #[must_use]
    pub fn primitive_value(&self, key: &str) -> Value {
        self.inner.fields.borrow().get(key).cloned().unwrap_or_default()
    }

    /// Raw storage write. Bypasses accessors, links and notifications.
    pub fn set_primitive_value(&self, key: &str, value: Value) {
        self.inner.fields.borrow_mut().insert(key.to_owned(), value);
    }

    /// Keys with stored values, sorted.
    #[must_use]
    pub fn stored_keys(&self) -> Vec<String> {
        self.inner.fields.borrow().keys().cloned().collect()
    }

    /// Stored keys plus declared properties that accept writes, sorted.
    #[must_use]
    pub fn mutable_keys(&self) -> Vec<String> {
        let mut keys: BTreeSet<String> = BTreeSet::new();
        for key in self.inner.fields.borrow().keys() {
            let writable = self
                .class()
                .and_then(|class| class.property(key))
                .is_none_or(|descriptor| descriptor.is_mutable());
            if writable {
                keys.insert(key.clone());
            }
        }
        if let Some(class) = self.class() {
            for name in class.property_names() {
                if class.property(name).is_some_and(|d| d.is_mutable()) {
                    keys.insert(name.to_owned());
                }
            }
        }
        keys.into_iter().collect()
    }

    /// Keys that re-notify whenever `key` changes.
    #[must_use]
    pub fn dependent_keys_for_key(&self, key: &str) -> Vec<String> {
        self.inner
            .dependents
            .borrow()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Declare that `dependent` changes whenever any key in `triggers`
    /// changes. Key infos for the triggers are created immediately.
    pub fn set_keys_trigger_change_notifications_for_dependent_key<I, S>(
        &self,
        triggers: I,
        dependent: &str,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let triggers: Vec<String> = triggers.into_iter().map(|t| t.as_ref().to_owned()).collect();
        check_dependency(dependent, triggers.iter().map(String::as_str))?;
        self.record_dependency(&triggers, dependent);
        for trigger in &triggers {
            self.info_for_key(trigger)?;
        }
        Ok(())
    }

    fn record_dependency(&self, triggers: &[String], dependent: &str) {
        let mut table = self.inner.dependents.borrow_mut();
        for trigger in triggers {
            let list = table.entry(trigger.clone()).or_default();
            if !list.iter().any(|d| d == dependent) {
                list.push(dependent.to_owned());
            }
        }
    }

    /// Open a change bracket on `key`.
    pub fn will_change_value_for_key(&self, key: &str) -> Result<()> {
        let info = self.info_for_key(key)?;
        self.begin_change(&info);
        Ok(())
    }

    /// Close a change bracket on `key`, notifying if it was the outermost.
    pub fn did_change_value_for_key(&self, key: &str) -> Result<()> {
        let info = self.info_for_key(key)?;
        self.end_change(&info, false);
        Ok(())
    }

    /// Notify observers of `key` even though its value kept its identity.
    ///
    /// Does nothing while a bracket on `key` is open; the bracket will
    /// notify when it closes. The delivered record has a null old value.
    pub fn force_change_notification_for_key(&self, key: &str) -> Result<()> {
        let info = self.info_for_key(key)?;
        if info.change_depth() != 0 {
            return Ok(());
        }
        info.enter();
        self.end_change(&info, true);
        Ok(())
    }

    /// Open the bracket on `info` and its dependents. Every depth is raised
    /// before any getter runs.
    fn begin_change(&self, info: &Rc<KeyInfo>) {
        let mut opened = Vec::new();
        self.open_brackets(info, &mut opened);
        for info in opened.iter().rev() {
            let previous = info.read(self);
            info.snapshot(previous);
        }
    }

    fn open_brackets(&self, info: &Rc<KeyInfo>, opened: &mut Vec<Rc<KeyInfo>>) {
        if !info.enter() {
            return;
        }
        opened.push(Rc::clone(info));
        for dependent in self.dependent_keys_for_key(info.key()) {
            match self.info_for_key(&dependent) {
                Ok(dep) => self.open_brackets(&dep, opened),
                Err(err) => tracing::debug!(key = %dependent, error = %err, "skipping dependent key"),
            }
        }
    }

    /// Close the bracket on `info` and its dependents without notifying.
    fn abandon_change(&self, info: &Rc<KeyInfo>) {
        if info.leave() != Some(true) {
            return;
        }
        info.take_snapshot();
        for dependent in self.dependent_keys_for_key(info.key()) {
            if let Ok(dep) = self.info_for_key(&dependent) {
                self.abandon_change(&dep);
            }
        }
    }

    fn end_change(&self, info: &Rc<KeyInfo>, forced: bool) {
        match info.leave() {
            None => {
                tracing::debug!(
                    key = info.key(),
                    "didChangeValueForKey without a matching willChangeValueForKey"
                );
                return;
            }
            Some(false) => return,
            Some(true) => {}
        }
        let new_value = info.read(self);
        let old_value = info.take_snapshot();
        if forced || !new_value.same(&old_value) {
            let node = self.as_node();
            let change = ChangeRecord::setting(node.clone(), new_value.clone(), old_value.clone());
            node.notify(&change, info.key());
            if let Some(old_child) = old_value.as_node() {
                remove_parent_link(&old_child, Some(info), info.uid());
            }
            if let Some(new_child) = new_value.as_node() {
                add_parent_link(&new_child, &node, Some(info), info.uid());
            }
        }
        for dependent in self.dependent_keys_for_key(info.key()) {
            match self.info_for_key(&dependent) {
                Ok(dep) => self.end_change(&dep, false),
                Err(err) => tracing::debug!(key = %dependent, error = %err, "skipping dependent key"),
            }
        }
    }
}

impl KeyValueCoding for KvoObject {
    fn as_node(&self) -> Node {
        Node::Object(self.clone())
    }

    /// Returns the key info for `key`, creating it on first use. A new key
    /// info links whatever composite value the key already holds.
    fn info_for_key(&self, key: &str) -> Result<Rc<KeyInfo>> {
        check_key(key)?;
        if let Some(info) = self.inner.keys.borrow().get(key) {
            return Ok(Rc::clone(info));
        }
        let descriptor = self.class().and_then(|class| class.descriptor_for(key));
        let info = Rc::new(KeyInfo::new(key, descriptor));
        self.inner
            .keys
            .borrow_mut()
            .insert(key.to_owned(), Rc::clone(&info));
        info.read(self);
        Ok(info)
    }

    fn value_for_key(&self, key: &str) -> Result<Value> {
        let info = self.info_for_key(key)?;
        Ok(info.read(self))
    }

    fn set_value_for_key(&self, value: Value, key: &str) -> Result<()> {
        let info = self.info_for_key(key)?;
        if !info.is_mutable() {
            tracing::debug!(key, "ignoring write to read-only key");
            return Ok(());
        }
        let bracket = WriteBracket::open(self, &info);
        info.store(self, value);
        bracket.close();
        Ok(())
    }

    fn validate_value_for_key(&self, value: Value, key: &str) -> Result<Validation> {
        let info = self.info_for_key(key)?;
        Ok(info.validate(self, value))
    }
}

/// A change bracket opened for one write. If the write unwinds out of a
/// getter or setter, dropping the bracket restores the key's depth so later
/// writes still notify.
struct WriteBracket<'a> {
    object: &'a KvoObject,
    info: Option<Rc<KeyInfo>>,
}

impl<'a> WriteBracket<'a> {
    fn open(object: &'a KvoObject, info: &Rc<KeyInfo>) -> Self {
        let bracket = Self {
            object,
            info: Some(Rc::clone(info)),
        };
        object.begin_change(info);
        bracket
    }

    fn close(mut self) {
        if let Some(info) = self.info.take() {
            self.object.end_change(&info, false);
        }
    }
}

impl Drop for WriteBracket<'_> {
    fn drop(&mut self) {
        if let Some(info) = self.info.take() {
            tracing::debug!(key = info.key(), "write unwound; closing its change bracket");
            self.object.abandon_change(&info);
        }
    }
}

impl Default for KvoObject {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FromIterator<(K, V)> for KvoObject
where
    K: AsRef<str>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let object = Self::new();
        for (key, value) in iter {
            object.set_primitive_value(key.as_ref(), value.into());
        }
        object
    }
}

impl fmt::Debug for KvoObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = &self.inner.core;
        f.debug_struct("KvoObject")
            .field("uid", &core.is_active().then(|| core.uid()))
            .field("class", &self.class().map(|c| c.name()))
            .field("keys", &self.stored_keys())
            .finish()
    }
}
