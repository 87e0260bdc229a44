#![forbid(unsafe_code)]

//! Per-node observation state: identity, observer entries, parent links.

use std::cell::{OnceCell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::rc::Rc;

use crate::change::ChangeRecord;
use crate::error::{ObserverError, call_isolated};
use crate::links::ParentLinks;
use crate::value::{Node, Uid, Value, generate_uid};

/// Key path of the reserved "whole object" bucket.
pub const ALL_PROPERTIES_KEY: &str = "*";

/// Callback invoked for each delivered change: `(change, key_path, context)`.
pub type ObserverFn = Rc<dyn Fn(&ChangeRecord, &str, &Value) -> Result<(), ObserverError>>;

/// Identity of an observer, used for removal and for the re-entrancy guard.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(Uid);

impl ObserverId {
    /// A fresh identity for an observer that is not itself a node.
    #[must_use]
    pub fn new() -> Self {
        Self(generate_uid())
    }

    /// The identity a node uses when it observes something.
    #[must_use]
    pub fn of(node: &Node) -> Self {
        Self(node.uid())
    }

    #[must_use]
    pub const fn raw(self) -> Uid {
        self.0
    }
}

impl Default for ObserverId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct ObserverEntry {
    pub(crate) observer: ObserverId,
    pub(crate) callback: ObserverFn,
    pub(crate) context: Value,
}

impl ObserverEntry {
    /// Invoke the callback unless the observer already saw this change.
    pub(crate) fn deliver(&self, change: &ChangeRecord, key_path: &str) {
        if change.has_visited(self.observer.raw()) {
            tracing::trace!(key_path, observer = self.observer.raw(), "observer already visited");
            return;
        }
        tracing::trace!(key_path, kind = %change.kind(), observer = self.observer.raw(), "dispatch");
        if let Err(failure) = call_isolated(|| (self.callback)(change, key_path, &self.context)) {
            tracing::warn!(
                key_path,
                observer = self.observer.raw(),
                error = %failure,
                "observer callback failed; continuing delivery"
            );
        }
    }
}

/// Observer entries keyed by the exact key path they registered for.
#[derive(Default)]
pub(crate) struct ObserverTable {
    entries: BTreeMap<String, Vec<ObserverEntry>>,
}

impl ObserverTable {
    #[cfg(test)]
    pub(crate) fn contains_key_path(&self, key_path: &str) -> bool {
        self.entries.contains_key(key_path)
    }

    pub(crate) fn push(&mut self, key_path: &str, entry: ObserverEntry) {
        self.entries.entry(key_path.to_owned()).or_default().push(entry);
    }

    /// Remove the first entry registered by `observer`.
    pub(crate) fn remove_first(&mut self, key_path: &str, observer: ObserverId) -> bool {
        let Some(list) = self.entries.get_mut(key_path) else {
            return false;
        };
        let Some(pos) = list.iter().position(|e| e.observer == observer) else {
            return false;
        };
        list.remove(pos);
        if list.is_empty() {
            self.entries.remove(key_path);
        }
        true
    }

    pub(crate) fn entries_for(&self, key_path: &str) -> Vec<ObserverEntry> {
        self.entries.get(key_path).cloned().unwrap_or_default()
    }

    /// Every registered path that starts with `prefix`, with its entries.
    pub(crate) fn entries_below(&self, prefix: &str) -> Vec<(String, Vec<ObserverEntry>)> {
        self.entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, list)| (path.clone(), list.clone()))
            .collect()
    }

    pub(crate) fn count(&self, key_path: &str) -> usize {
        self.entries.get(key_path).map_or(0, Vec::len)
    }
}

/// Observation state shared by objects and arrays.
#[derive(Default)]
pub(crate) struct NodeCore {
    uid: OnceCell<Uid>,
    pub(crate) observers: RefCell<ObserverTable>,
    pub(crate) parents: RefCell<ParentLinks>,
}

impl NodeCore {
    pub(crate) fn uid(&self) -> Uid {
        *self.uid.get_or_init(generate_uid)
    }

    /// Whether observation has touched this node yet.
    pub(crate) fn is_active(&self) -> bool {
        self.uid.get().is_some()
    }
}

impl fmt::Debug for NodeCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCore")
            .field("uid", &self.uid.get())
            .field("parents", &self.parents.borrow().len())
            .finish()
    }
}
