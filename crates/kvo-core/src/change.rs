#![forbid(unsafe_code)]

//! Change records.
//!
//! A [`ChangeRecord`] describes one property or array mutation. Records are
//! values: derived records (rescoped to a parent, transformed by a binding,
//! narrowed to a sub-key) are built with copy-with-override methods and the
//! original is never touched.
//!
//! # Invariants
//!
//! 1. `indexes` is `Some` only for array kinds.
//! 2. For [`ChangeKind::Deletion`] the indexes are in descending order and the
//!    old values are aligned with them; insertions and replacements are
//!    ascending.
//! 3. The visited list only grows while a record bubbles up the graph; a
//!    node present in it is never notified again for the same change.

use std::fmt;

use crate::value::{Node, Uid, Value};

/// What kind of mutation a record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Setting,
    Insertion,
    Deletion,
    Replacement,
}

impl ChangeKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Setting => "setting",
            Self::Insertion => "insertion",
            Self::Deletion => "deletion",
            Self::Replacement => "replacement",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One observed mutation.
#[derive(Clone, Debug)]
pub struct ChangeRecord {
    object: Node,
    kind: ChangeKind,
    new_value: Value,
    old_value: Value,
    indexes: Option<Vec<usize>>,
    visited: Vec<Uid>,
}

impl ChangeRecord {
    pub fn new(
        object: impl Into<Node>,
        kind: ChangeKind,
        new_value: Value,
        old_value: Value,
        indexes: Option<Vec<usize>>,
    ) -> Self {
        Self {
            object: object.into(),
            kind,
            new_value,
            old_value,
            indexes,
            visited: Vec::new(),
        }
    }

    /// A `setting` record for a single property.
    pub fn setting(object: impl Into<Node>, new_value: Value, old_value: Value) -> Self {
        Self::new(object, ChangeKind::Setting, new_value, old_value, None)
    }

    /// The node whose property (or contents) changed.
    #[must_use]
    pub fn object(&self) -> &Node {
        &self.object
    }

    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        self.kind
    }

    #[must_use]
    pub fn new_value(&self) -> &Value {
        &self.new_value
    }

    #[must_use]
    pub fn old_value(&self) -> &Value {
        &self.old_value
    }

    #[must_use]
    pub fn indexes(&self) -> Option<&[usize]> {
        self.indexes.as_deref()
    }

    /// Identities of the nodes this record has already passed through.
    #[must_use]
    pub fn object_key_path(&self) -> &[Uid] {
        &self.visited
    }

    #[must_use]
    pub fn with_object(mut self, object: impl Into<Node>) -> Self {
        self.object = object.into();
        self
    }

    #[must_use]
    pub fn with_new_value(mut self, new_value: Value) -> Self {
        self.new_value = new_value;
        self
    }

    #[must_use]
    pub fn with_values(mut self, new_value: Value, old_value: Value) -> Self {
        self.new_value = new_value;
        self.old_value = old_value;
        self
    }

    pub(crate) fn has_visited(&self, uid: Uid) -> bool {
        self.visited.contains(&uid)
    }

    pub(crate) fn visiting(mut self, uid: Uid) -> Self {
        if !self.visited.contains(&uid) {
            self.visited.push(uid);
        }
        self
    }

    /// Carry another record's visited list into this one.
    pub(crate) fn inheriting_path(mut self, from: &ChangeRecord) -> Self {
        self.visited = from.visited.clone();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::KvoObject;

    #[test]
    fn setting_record_has_no_indexes() {
        let record = ChangeRecord::setting(KvoObject::new(), Value::from(2), Value::from(1));
        assert_eq!(record.kind(), ChangeKind::Setting);
        assert!(record.indexes().is_none());
        assert_eq!(record.new_value(), &Value::from(2));
        assert_eq!(record.old_value(), &Value::from(1));
    }

    #[test]
    fn derived_records_leave_the_original_alone() {
        let original = ChangeRecord::setting(KvoObject::new(), Value::from("a"), Value::Null);
        let derived = original.clone().with_new_value(Value::from("A"));
        assert_eq!(original.new_value(), &Value::from("a"));
        assert_eq!(derived.new_value(), &Value::from("A"));
        assert!(derived.object().same(original.object()));
    }

    #[test]
    fn visiting_is_idempotent() {
        let record = ChangeRecord::setting(KvoObject::new(), Value::Null, Value::Null)
            .visiting(7)
            .visiting(7)
            .visiting(9);
        assert_eq!(record.object_key_path(), &[7, 9]);
        assert!(record.has_visited(9));
        assert!(!record.has_visited(8));
    }

    #[test]
    fn kind_names() {
        assert_eq!(ChangeKind::Insertion.to_string(), "insertion");
        assert_eq!(ChangeKind::Replacement.name(), "replacement");
    }
}
