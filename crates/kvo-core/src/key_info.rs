#![forbid(unsafe_code)]

//! Key registry entries and property descriptors.
//!
//! Every key touched on an object gets one [`KeyInfo`], created lazily and
//! cached for the object's lifetime. It carries the accessors resolved from
//! the object's class, the nesting depth of pending change brackets, the
//! value snapshotted by the outermost `will_change`, and the child node the
//! key currently links to.
//!
//! # Invariants
//!
//! 1. `change_depth` returns to zero exactly once per balanced sequence of
//!    will/did calls; the snapshot is only meaningful while it is non-zero.
//! 2. A key is mutable iff it has a setter, or has neither getter nor setter.
//! 3. At most one child is linked through a key at a time.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::Validation;
use crate::links::{add_parent_link, remove_parent_link};
use crate::object::KvoObject;
use crate::value::{Node, Uid, Value, WeakNode, generate_uid};

/// Custom read accessor.
pub type Getter = Rc<dyn Fn(&KvoObject) -> Value>;
/// Custom write accessor. It stores the value itself, usually through
/// [`KvoObject::set_primitive_value`].
pub type Setter = Rc<dyn Fn(&KvoObject, Value)>;
/// Validation hook for proposed values.
pub type Validator = Rc<dyn Fn(&KvoObject, Value) -> Validation>;

/// How one property of a class is read, written and validated.
///
/// The default descriptor is plain stored data.
#[derive(Clone, Default)]
pub struct PropertyDescriptor {
    getter: Option<Getter>,
    setter: Option<Setter>,
    validator: Option<Validator>,
}

impl PropertyDescriptor {
    /// Stored, mutable, unvalidated.
    #[must_use]
    pub fn stored() -> Self {
        Self::default()
    }

    /// Read-only value computed by `getter`.
    pub fn computed(getter: impl Fn(&KvoObject) -> Value + 'static) -> Self {
        Self::default().getter(getter)
    }

    #[must_use]
    pub fn getter(mut self, getter: impl Fn(&KvoObject) -> Value + 'static) -> Self {
        self.getter = Some(Rc::new(getter));
        self
    }

    #[must_use]
    pub fn setter(mut self, setter: impl Fn(&KvoObject, Value) + 'static) -> Self {
        self.setter = Some(Rc::new(setter));
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: impl Fn(&KvoObject, Value) -> Validation + 'static) -> Self {
        self.validator = Some(Rc::new(validator));
        self
    }

    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.setter.is_some() || self.getter.is_none()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

/// Metadata for one key on one object.
pub struct KeyInfo {
    key: String,
    uid: Uid,
    reader: Option<Getter>,
    mutator: Option<Setter>,
    validator: Option<Validator>,
    mutable: bool,
    change_depth: Cell<usize>,
    previous: RefCell<Value>,
    linked: RefCell<Option<WeakNode>>,
}

impl KeyInfo {
    pub(crate) fn new(key: &str, descriptor: Option<PropertyDescriptor>) -> Self {
        let descriptor = descriptor.unwrap_or_default();
        let mutable = descriptor.is_mutable();
        Self {
            key: key.to_owned(),
            uid: generate_uid(),
            reader: descriptor.getter,
            mutator: descriptor.setter,
            validator: descriptor.validator,
            mutable,
            change_depth: Cell::new(0),
            previous: RefCell::new(Value::Null),
            linked: RefCell::new(None),
        }
    }

    /// A key info that is not attached to an object: array keys and
    /// operator segments.
    pub(crate) fn detached(key: &str, mutable: bool) -> Self {
        Self {
            mutable,
            ..Self::new(key, None)
        }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Slot uid used for the parent link this key maintains.
    #[must_use]
    pub fn uid(&self) -> Uid {
        self.uid
    }

    #[must_use]
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    #[must_use]
    pub fn has_validator(&self) -> bool {
        self.validator.is_some()
    }

    /// Number of open `will_change` brackets.
    #[must_use]
    pub fn change_depth(&self) -> usize {
        self.change_depth.get()
    }

    /// Read through the accessor and link the result to `owner`.
    pub(crate) fn read(&self, owner: &KvoObject) -> Value {
        let value = match &self.reader {
            Some(get) => get(owner),
            None => owner.primitive_value(&self.key),
        };
        match value.as_node() {
            Some(child) => add_parent_link(&child, &Node::Object(owner.clone()), Some(self), self.uid),
            None => self.unlink_parent_link(),
        }
        value
    }

    /// Write through the accessor. No notification happens here.
    pub(crate) fn store(&self, owner: &KvoObject, value: Value) {
        match &self.mutator {
            Some(set) => set(owner, value),
            None => owner.set_primitive_value(&self.key, value),
        }
    }

    pub(crate) fn validate(&self, owner: &KvoObject, value: Value) -> Validation {
        match &self.validator {
            Some(check) => check(owner, value),
            None => Validation::Accepted(value),
        }
    }

    /// Open a bracket; true on the outermost one.
    pub(crate) fn enter(&self) -> bool {
        let depth = self.change_depth.get() + 1;
        self.change_depth.set(depth);
        depth == 1
    }

    /// Close a bracket; `None` when no bracket was open, otherwise whether
    /// this closed the outermost one.
    pub(crate) fn leave(&self) -> Option<bool> {
        let depth = self.change_depth.get().checked_sub(1)?;
        self.change_depth.set(depth);
        Some(depth == 0)
    }

    pub(crate) fn snapshot(&self, value: Value) {
        *self.previous.borrow_mut() = value;
    }

    pub(crate) fn take_snapshot(&self) -> Value {
        self.previous.replace(Value::Null)
    }

    /// Make `child` the active link, dropping the link to the previous child.
    pub(crate) fn relink(&self, child: &Node) {
        let previous = self.linked.replace(Some(child.downgrade()));
        if let Some(previous) = previous.and_then(|weak| weak.upgrade()) {
            if !previous.same(child) {
                remove_parent_link(&previous, None, self.uid);
            }
        }
    }

    pub(crate) fn unlink_parent_link(&self) {
        let previous = self.linked.take();
        if let Some(previous) = previous.and_then(|weak| weak.upgrade()) {
            remove_parent_link(&previous, None, self.uid);
        }
    }

    pub(crate) fn clear_link_if(&self, child: &Node) {
        let mut linked = self.linked.borrow_mut();
        let matches = linked
            .as_ref()
            .and_then(WeakNode::upgrade)
            .is_some_and(|node| node.same(child));
        if matches {
            *linked = None;
        }
    }

    /// The child node currently linked through this key.
    #[must_use]
    pub fn linked_child(&self) -> Option<Node> {
        self.linked.borrow().as_ref().and_then(WeakNode::upgrade)
    }
}

impl fmt::Debug for KeyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyInfo")
            .field("key", &self.key)
            .field("uid", &self.uid)
            .field("mutable", &self.mutable)
            .field("change_depth", &self.change_depth.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutability_follows_accessors() {
        assert!(PropertyDescriptor::stored().is_mutable());
        assert!(!PropertyDescriptor::computed(|_| Value::Null).is_mutable());
        assert!(
            PropertyDescriptor::computed(|_| Value::Null)
                .setter(|_, _| {})
                .is_mutable()
        );
        assert!(PropertyDescriptor::stored().setter(|_, _| {}).is_mutable());
    }

    #[test]
    fn brackets_report_outermost_transitions() {
        let info = KeyInfo::new("name", None);
        assert_eq!(info.leave(), None);
        assert!(info.enter());
        assert!(!info.enter());
        assert_eq!(info.change_depth(), 2);
        assert_eq!(info.leave(), Some(false));
        assert_eq!(info.leave(), Some(true));
        assert_eq!(info.change_depth(), 0);
    }

    #[test]
    fn detached_infos_get_their_own_uid() {
        let a = KeyInfo::detached("@count", false);
        let b = KeyInfo::detached("@count", false);
        assert_ne!(a.uid(), b.uid());
        assert!(!a.is_mutable());
    }

    #[test]
    fn validator_defaults_to_accepting() {
        let owner = KvoObject::new();
        let info = KeyInfo::new("age", None);
        assert_eq!(info.validate(&owner, Value::from(3)), Validation::Accepted(Value::from(3)));
    }
}
