#![forbid(unsafe_code)]

//! A stand-in object for whatever a controller has selected.
//!
//! Reading a key through a [`SelectionProxy`] reads it from every selected
//! object and collapses the results with [`collapse_selection`]: a value
//! shared by the whole selection comes back as itself, differing values as
//! [`Marker::MultipleValues`](kvo_core::Marker::MultipleValues) and an empty
//! selection as [`Marker::NoSelection`](kvo_core::Marker::NoSelection).
//! Writing a key writes it to every selected object.
//!
//! The proxy watches each key it has served on every selected object, so an
//! observer of `selection.<key>` on a controller hears about edits made on a
//! selected object directly, not only edits made through the proxy.
//!
//! # Failure Modes
//!
//! - A detached proxy (no [`SelectionSource`], or one that was dropped)
//!   reports an empty selection and ignores writes.
//! - A write that fails on one selected object is logged at warn level; the
//!   remaining objects are still written.

use std::cell::{OnceCell, RefCell};
use std::collections::BTreeSet;
use std::fmt;
use std::rc::{Rc, Weak};

use kvo_core::{
    KeyInfo, KeyValueCoding, KvoObject, Marker, Node, ObjectClass, ObserverId, PropertyDescriptor,
    Result, Validation, ValidationError, Value, collapse_selection,
};

/// Supplies the selection a [`SelectionProxy`] stands for.
pub trait SelectionSource {
    /// The selected objects, in selection order.
    fn selected_objects(&self) -> Vec<Value>;

    /// Whether writes through the proxy reach the selected objects.
    fn selection_is_editable(&self) -> bool {
        true
    }
}

struct ProxyInner {
    object: KvoObject,
    source: OnceCell<Weak<dyn SelectionSource>>,
    observer: ObserverId,
    watched: RefCell<BTreeSet<String>>,
    observed: RefCell<Vec<Node>>,
}

/// Key-value coding over a controller's selection.
#[derive(Clone)]
pub struct SelectionProxy {
    inner: Rc<ProxyInner>,
}

impl SelectionProxy {
    /// A proxy with no source yet; see [`attach`](Self::attach).
    ///
    /// # Errors
    ///
    /// Propagates class construction errors.
    pub fn new() -> Result<Self> {
        let slot: Rc<OnceCell<Weak<ProxyInner>>> = Rc::default();
        let lookup = Rc::clone(&slot);
        let class = ObjectClass::builder("SelectionProxy")
            .fallback_property(move |key| proxy_property(&lookup, key))
            .build()?;
        let inner = Rc::new(ProxyInner {
            object: KvoObject::with_class(&class),
            source: OnceCell::new(),
            observer: ObserverId::new(),
            watched: RefCell::default(),
            observed: RefCell::default(),
        });
        // A fresh cell always accepts its first value.
        let _ = slot.set(Rc::downgrade(&inner));
        Ok(Self { inner })
    }

    /// Connect the proxy to the selection it stands for. Only the first call
    /// takes effect; returns whether this one did.
    pub fn attach(&self, source: Weak<dyn SelectionSource>) -> bool {
        let attached = self.inner.source.set(source).is_ok();
        if attached {
            self.selection_did_change();
        }
        attached
    }

    /// The object observers and bindings see.
    #[must_use]
    pub fn object(&self) -> &KvoObject {
        &self.inner.object
    }

    /// Keys read through the proxy so far, sorted.
    #[must_use]
    pub fn watched_keys(&self) -> Vec<String> {
        self.inner.watched.borrow().iter().cloned().collect()
    }

    /// Move the proxy's watches from the previously selected objects to the
    /// current ones. Controllers call this whenever their selection changes,
    /// before announcing the new selection.
    pub fn selection_did_change(&self) {
        let inner = &self.inner;
        let selected: Vec<Node> = inner
            .selected()
            .iter()
            .filter_map(Value::as_node)
            .collect();
        let previous = inner.observed.replace(selected.clone());
        let keys = self.watched_keys();
        for node in &previous {
            for key in &keys {
                inner.unwatch(node, key);
            }
        }
        for node in &selected {
            for key in &keys {
                inner.watch(node, key);
            }
        }
    }
}

impl ProxyInner {
    fn selected(&self) -> Vec<Value> {
        self.source
            .get()
            .and_then(Weak::upgrade)
            .map(|source| source.selected_objects())
            .unwrap_or_default()
    }

    fn editable(&self) -> bool {
        self.source
            .get()
            .and_then(Weak::upgrade)
            .is_some_and(|source| source.selection_is_editable())
    }

    fn collapsed_value(&self, key: &str) -> Value {
        self.serve(key);
        let values: Vec<Value> = self
            .selected()
            .iter()
            .map(|item| match item.as_node() {
                Some(node) => node.value_for_key(key).unwrap_or_default(),
                None => Value::Null,
            })
            .collect();
        collapse_selection(&values)
    }

    fn write(&self, key: &str, value: &Value) {
        if !self.editable() {
            tracing::debug!(key, "selection is not editable; ignoring write");
            return;
        }
        for item in self.selected() {
            let Some(node) = item.as_node() else {
                continue;
            };
            if let Err(err) = node.set_value_for_key(value.clone(), key) {
                tracing::warn!(key, error = %err, "write through selection failed");
            }
        }
    }

    /// The first rejection from any selected object, otherwise the last
    /// accepted value.
    fn validate(&self, key: &str, value: Value) -> Validation {
        let mut outcome = Validation::Accepted(value.clone());
        for item in self.selected() {
            let Some(node) = item.as_node() else {
                continue;
            };
            match node.validate_value_for_key(value.clone(), key) {
                Ok(rejected @ Validation::Rejected(_)) => return rejected,
                Ok(accepted) => outcome = accepted,
                Err(err) => return Validation::Rejected(ValidationError::new(key, err.to_string())),
            }
        }
        outcome
    }

    /// Start watching `key` on the selected objects the first time it is read.
    fn serve(&self, key: &str) {
        if !self.watched.borrow_mut().insert(key.to_owned()) {
            return;
        }
        let nodes = self.observed.borrow().clone();
        for node in &nodes {
            self.watch(node, key);
        }
    }

    fn watch(&self, node: &Node, key: &str) {
        let proxy = self.object.clone();
        let registered = node.add_observer_for_key_path(
            self.observer,
            move |_, key_path, _| {
                proxy.force_change_notification_for_key(key_path)?;
                Ok(())
            },
            key,
            Value::Null,
        );
        if let Err(err) = registered {
            tracing::debug!(key, error = %err, "cannot watch selected object");
        }
    }

    fn unwatch(&self, node: &Node, key: &str) {
        if let Err(err) = node.remove_observer_for_key_path(self.observer, key) {
            tracing::debug!(key, error = %err, "cannot unwatch selected object");
        }
    }
}

impl Drop for ProxyInner {
    fn drop(&mut self) {
        let nodes = self.observed.take();
        let keys: Vec<String> = self.watched.borrow().iter().cloned().collect();
        for node in &nodes {
            for key in &keys {
                self.unwatch(node, key);
            }
        }
    }
}

/// Descriptor for `key` on a proxy: reads collapse the selection, writes fan
/// out to it and validation asks every selected object.
fn proxy_property(slot: &Rc<OnceCell<Weak<ProxyInner>>>, key: &str) -> PropertyDescriptor {
    let upgrade = |slot: &Rc<OnceCell<Weak<ProxyInner>>>| slot.get().and_then(Weak::upgrade);
    let (reader, writer, checker) = (Rc::clone(slot), Rc::clone(slot), Rc::clone(slot));
    let (read_key, write_key, check_key) = (key.to_owned(), key.to_owned(), key.to_owned());
    PropertyDescriptor::computed(move |_| match upgrade(&reader) {
        Some(proxy) => proxy.collapsed_value(&read_key),
        None => Value::Marker(Marker::NoSelection),
    })
    .setter(move |_, value| {
        if let Some(proxy) = upgrade(&writer) {
            proxy.write(&write_key, &value);
        }
    })
    .validator(move |_, value| match upgrade(&checker) {
        Some(proxy) => proxy.validate(&check_key, value),
        None => Validation::Accepted(value),
    })
}

impl KeyValueCoding for SelectionProxy {
    fn as_node(&self) -> Node {
        Node::Object(self.inner.object.clone())
    }

    fn info_for_key(&self, key: &str) -> Result<Rc<KeyInfo>> {
        self.inner.object.info_for_key(key)
    }

    fn value_for_key(&self, key: &str) -> Result<Value> {
        self.inner.object.value_for_key(key)
    }

    fn set_value_for_key(&self, value: Value, key: &str) -> Result<()> {
        self.inner.object.set_value_for_key(value, key)
    }

    fn validate_value_for_key(&self, value: Value, key: &str) -> Result<Validation> {
        self.inner.object.validate_value_for_key(value, key)
    }
}

impl fmt::Debug for SelectionProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionProxy")
            .field("attached", &self.inner.source.get().is_some())
            .field("watched", &self.watched_keys())
            .field("observed", &self.inner.observed.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use kvo_core::ChangeRecord;

    struct Picked {
        items: RefCell<Vec<Value>>,
        editable: Cell<bool>,
    }

    impl SelectionSource for Picked {
        fn selected_objects(&self) -> Vec<Value> {
            self.items.borrow().clone()
        }

        fn selection_is_editable(&self) -> bool {
            self.editable.get()
        }
    }

    fn picked(items: Vec<Value>) -> (Rc<Picked>, SelectionProxy) {
        let source = Rc::new(Picked {
            items: RefCell::new(items),
            editable: Cell::new(true),
        });
        let proxy = SelectionProxy::new().unwrap();
        let weak: Weak<dyn SelectionSource> = Rc::downgrade(&source) as Weak<dyn SelectionSource>;
        assert!(proxy.attach(weak));
        (source, proxy)
    }

    fn task(title: &str) -> KvoObject {
        KvoObject::new().with("title", title)
    }

    #[test]
    fn reads_collapse_the_selection() {
        let (a, b) = (task("Intro"), task("Intro"));
        let (source, proxy) = picked(vec![a.clone().into(), b.clone().into()]);
        assert_eq!(proxy.value_for_key("title").unwrap(), Value::from("Intro"));

        b.set_value_for_key(Value::from("Outro"), "title").unwrap();
        assert_eq!(
            proxy.value_for_key("title").unwrap(),
            Value::Marker(Marker::MultipleValues)
        );

        source.items.borrow_mut().clear();
        proxy.selection_did_change();
        assert_eq!(
            proxy.value_for_key("title").unwrap(),
            Value::Marker(Marker::NoSelection)
        );
    }

    #[test]
    fn writes_reach_every_selected_object() {
        let (a, b) = (task("Intro"), task("Outro"));
        let (source, proxy) = picked(vec![a.clone().into(), b.clone().into(), Value::from(3)]);
        proxy.set_value_for_key(Value::from("Draft"), "title").unwrap();
        assert_eq!(a.value_for_key("title").unwrap(), Value::from("Draft"));
        assert_eq!(b.value_for_key("title").unwrap(), Value::from("Draft"));

        source.editable.set(false);
        proxy.set_value_for_key(Value::from("Final"), "title").unwrap();
        assert_eq!(a.value_for_key("title").unwrap(), Value::from("Draft"));
    }

    #[test]
    fn direct_edits_on_selected_objects_notify_through_the_proxy() {
        let a = task("Intro");
        let (_source, proxy) = picked(vec![a.clone().into()]);
        let log: Rc<RefCell<Vec<ChangeRecord>>> = Rc::default();
        let sink = Rc::clone(&log);
        proxy
            .add_observer_for_key_path(
                ObserverId::new(),
                move |change, _, _| {
                    sink.borrow_mut().push(change.clone());
                    Ok(())
                },
                "title",
                Value::Null,
            )
            .unwrap();
        assert_eq!(proxy.watched_keys(), ["title".to_owned()]);

        a.set_value_for_key(Value::from("Outro"), "title").unwrap();
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(log.borrow()[0].new_value(), &Value::from("Outro"));

        // A write through the proxy notifies once, from the proxy's own bracket.
        proxy.set_value_for_key(Value::from("Coda"), "title").unwrap();
        assert_eq!(log.borrow().len(), 2);
        assert_eq!(log.borrow()[1].old_value(), &Value::from("Outro"));
        assert_eq!(log.borrow()[1].new_value(), &Value::from("Coda"));
    }

    #[test]
    fn watches_follow_the_selection() {
        let (a, b) = (task("Intro"), task("Outro"));
        let (source, proxy) = picked(vec![a.clone().into()]);
        proxy.value_for_key("title").unwrap();
        assert_eq!(a.as_node().observer_count("title"), 1);

        *source.items.borrow_mut() = vec![b.clone().into()];
        proxy.selection_did_change();
        assert_eq!(a.as_node().observer_count("title"), 0);
        assert_eq!(b.as_node().observer_count("title"), 1);

        drop(proxy);
        assert_eq!(b.as_node().observer_count("title"), 0);
    }

    #[test]
    fn detached_proxies_have_no_selection() {
        let proxy = SelectionProxy::new().unwrap();
        assert_eq!(
            proxy.value_for_key("anything").unwrap(),
            Value::Marker(Marker::NoSelection)
        );
        proxy.set_value_for_key(Value::from("x"), "anything").unwrap();
        assert_eq!(
            proxy.value_for_key("anything").unwrap(),
            Value::Marker(Marker::NoSelection)
        );
    }
}
