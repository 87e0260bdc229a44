#![forbid(unsafe_code)]

//! Parent links: back-references from a child node to the containers that
//! currently hold it.
//!
//! A link lives on the child, keyed by a slot uid. An object key uses its
//! [`KeyInfo`] uid, so one object holding the same child under two keys gets
//! two slots; an array uses its own node uid, so one array holding the same
//! child twice shares a slot.
//!
//! # Invariants
//!
//! 1. Adding a link whose slot uid is already present is a no-op.
//! 2. A key info tracks at most one active link (the child it currently
//!    holds); linking a new child first unlinks the previous one.
//! 3. Links hold their parent weakly. A link whose parent is gone is skipped
//!    and pruned during notification.
//!
//! Removal is swap-and-pop with an index map, so link order is not stable.

use ahash::AHashMap;

use crate::key_info::KeyInfo;
use crate::value::{Node, Uid, WeakNode};

#[derive(Clone, Debug)]
pub(crate) struct ParentLink {
    pub(crate) slot: Uid,
    pub(crate) parent: WeakNode,
    pub(crate) parent_uid: Uid,
    pub(crate) key: String,
}

#[derive(Debug, Default)]
pub(crate) struct ParentLinks {
    links: Vec<ParentLink>,
    index: AHashMap<Uid, usize>,
}

impl ParentLinks {
    pub(crate) fn len(&self) -> usize {
        self.links.len()
    }

    pub(crate) fn contains(&self, slot: Uid) -> bool {
        self.index.contains_key(&slot)
    }

    fn insert(&mut self, link: ParentLink) -> bool {
        if self.index.contains_key(&link.slot) {
            return false;
        }
        self.index.insert(link.slot, self.links.len());
        self.links.push(link);
        true
    }

    fn remove(&mut self, slot: Uid) -> Option<ParentLink> {
        let pos = self.index.remove(&slot)?;
        let removed = self.links.swap_remove(pos);
        if let Some(moved) = self.links.get(pos) {
            self.index.insert(moved.slot, pos);
        }
        Some(removed)
    }

    pub(crate) fn snapshot(&self) -> Vec<ParentLink> {
        self.links.clone()
    }
}

/// Link `child` to `parent` under `slot`.
pub(crate) fn add_parent_link(child: &Node, parent: &Node, key_info: Option<&KeyInfo>, slot: Uid) {
    if let Node::Array(array) = child {
        array.ensure_observing();
    }
    let key = key_info.map(|info| info.key().to_owned()).unwrap_or_default();
    let inserted = child.core().parents.borrow_mut().insert(ParentLink {
        slot,
        parent: parent.downgrade(),
        parent_uid: parent.uid(),
        key,
    });
    if !inserted {
        return;
    }
    if let Some(info) = key_info {
        info.relink(child);
    }
}

/// Remove the link in `slot` from `child`, clearing the key info's active
/// link if it pointed there.
pub(crate) fn remove_parent_link(child: &Node, key_info: Option<&KeyInfo>, slot: Uid) {
    let removed = child.core().parents.borrow_mut().remove(slot);
    if removed.is_none() {
        return;
    }
    if let Some(info) = key_info {
        info.clear_link_if(child);
    }
}

/// Drop a link whose parent could not be upgraded.
pub(crate) fn prune_stale_link(child: &Node, slot: Uid) {
    tracing::debug!(child = child.uid(), slot, "pruning parent link to dropped container");
    child.core().parents.borrow_mut().remove(slot);
}
