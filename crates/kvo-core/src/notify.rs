#![forbid(unsafe_code)]

//! Change delivery.
//!
//! A change on a node travels in three steps:
//!
//! 1. Up: every parent link forwards the record to its container, which
//!    re-keys it (`context.key_path`, or just `context` for whole-object
//!    changes) and notifies its own observers and parents in turn.
//! 2. Exact: observers registered for exactly `key_path` receive it.
//! 3. Below: observers registered for `key_path.rest` receive a derived
//!    record whose values are `rest` resolved against the old and new
//!    values, unless both sides resolve to the same value.
//!
//! # Invariants
//!
//! 1. A record carries the uids of the nodes it has passed through. A
//!    container or observer already on that list is skipped, which keeps
//!    diamonds to one delivery per path and stops cycles.
//! 2. No `RefCell` borrow is held while a callback runs; observers may add
//!    or remove observers and mutate the graph re-entrantly.
//!
//! # Failure Modes
//!
//! - A failing or panicking callback is logged at warn level; delivery to
//!   the remaining observers continues.

use crate::change::ChangeRecord;
use crate::error::Result;
use crate::keypath::{KeyValueCoding, check_path};
use crate::links::prune_stale_link;
use crate::observer::{ALL_PROPERTIES_KEY, ObserverEntry, ObserverFn, ObserverId};
use crate::value::{Lookup, Node, Value};

impl Node {
    /// Register an already shared callback. See
    /// [`KeyValueCoding::add_observer_for_key_path`].
    pub fn add_observer(
        &self,
        observer: ObserverId,
        callback: ObserverFn,
        key_path: &str,
        context: Value,
    ) -> Result<()> {
        check_path(key_path)?;
        self.info_for_key_path(key_path)?;
        self.core().observers.borrow_mut().push(
            key_path,
            ObserverEntry {
                observer,
                callback,
                context,
            },
        );
        Ok(())
    }

    pub fn remove_observer(&self, observer: ObserverId, key_path: &str) -> Result<()> {
        check_path(key_path)?;
        let removed = self
            .core()
            .observers
            .borrow_mut()
            .remove_first(key_path, observer);
        if !removed {
            tracing::debug!(key_path, observer = observer.raw(), "no such observer registration");
        }
        Ok(())
    }

    /// Number of registrations for exactly `key_path`.
    #[must_use]
    pub fn observer_count(&self, key_path: &str) -> usize {
        self.core().observers.borrow().count(key_path)
    }

    /// Number of containers currently linked as parents.
    #[must_use]
    pub fn parent_link_count(&self) -> usize {
        self.core().parents.borrow().len()
    }

    pub(crate) fn notify(&self, change: &ChangeRecord, key_path: &str) {
        self.notify_parents(change, key_path);
        if key_path == ALL_PROPERTIES_KEY {
            return;
        }

        let exact = self.core().observers.borrow().entries_for(key_path);
        for entry in &exact {
            entry.deliver(change, key_path);
        }

        let prefix = format!("{key_path}.");
        let below = self.core().observers.borrow().entries_below(&prefix);
        if below.is_empty() {
            return;
        }
        let has_previous = !change.old_value().is_null();
        for (path, entries) in below {
            let rest = &path[prefix.len()..];
            let old_value = sub_value(change.old_value(), rest);
            let new_value = sub_value(change.new_value(), rest);
            if has_previous && old_value.same(&new_value) {
                continue;
            }
            let derived = change.clone().with_values(new_value, old_value);
            for entry in &entries {
                entry.deliver(&derived, &path);
            }
        }
    }

    fn notify_parents(&self, change: &ChangeRecord, key_path: &str) {
        let links = self.core().parents.borrow().snapshot();
        if links.is_empty() {
            return;
        }
        let forwarded = change.clone().visiting(self.uid());
        for link in links {
            if forwarded.has_visited(link.parent_uid) {
                tracing::trace!(parent = link.parent_uid, key_path, "parent already notified");
                continue;
            }
            match link.parent.upgrade() {
                Some(parent) => parent.observe_child_change(&forwarded, key_path, &link.key),
                None => prune_stale_link(self, link.slot),
            }
        }
    }

    /// A child linked under `context` reported a change of `key_path`.
    fn observe_child_change(&self, change: &ChangeRecord, key_path: &str, context: &str) {
        match self {
            Self::Object(_) => {
                let path = if key_path == ALL_PROPERTIES_KEY {
                    context.to_owned()
                } else {
                    format!("{context}.{key_path}")
                };
                let rescoped = change.clone().with_object(self.clone());
                self.notify(&rescoped, &path);
            }
            Self::Array(array) => array.observe_element_change(change, key_path),
        }
    }
}

fn sub_value(value: &Value, rest: &str) -> Value {
    value
        .value_for_key_path(rest)
        .map(Lookup::into_value)
        .unwrap_or_default()
}
