#![forbid(unsafe_code)]

//! Key-value coding: single keys and dotted key paths.
//!
//! [`KeyValueCoding`] is implemented by [`KvoObject`], [`KvoArray`] and
//! [`Node`]. Implementors supply the single-key primitives; the key-path
//! operations are provided on top of them.
//!
//! # Resolution rules
//!
//! - A path splits on `.`; empty segments are invalid keys.
//! - A segment starting with `@` names an [`ArrayOperator`] applied to the
//!   rest of the path. `@count` is only valid as the last segment.
//! - A missing or primitive intermediate makes reads [`Lookup::Unresolved`],
//!   writes silent no-ops and validation accept the proposal unchanged.
//! - Writes through an operator segment are silent no-ops.
//!
//! [`KvoObject`]: crate::object::KvoObject
//! [`KvoArray`]: crate::array::KvoArray

use std::rc::Rc;

use crate::change::ChangeRecord;
use crate::error::{KvoError, ObserverError, Result, Validation};
use crate::key_info::KeyInfo;
use crate::observer::ObserverId;
use crate::operators::ArrayOperator;
use crate::value::{Lookup, Node, Value};

pub(crate) fn check_path(key_path: &str) -> Result<()> {
    if key_path.is_empty() {
        return Err(KvoError::invalid("key path may not be empty"));
    }
    Ok(())
}

/// Read, write, validate and observe by key and key path.
pub trait KeyValueCoding {
    /// This receiver as a graph node.
    fn as_node(&self) -> Node;

    /// Key registry entry for `key`, created on first use.
    fn info_for_key(&self, key: &str) -> Result<Rc<KeyInfo>>;

    fn value_for_key(&self, key: &str) -> Result<Value>;

    fn set_value_for_key(&self, value: Value, key: &str) -> Result<()>;

    fn validate_value_for_key(&self, value: Value, key: &str) -> Result<Validation>;

    fn value_for_key_path(&self, key_path: &str) -> Result<Lookup> {
        check_path(key_path)?;
        let Some((head, rest)) = key_path.split_once('.') else {
            return self.value_for_key(key_path).map(Lookup::Found);
        };
        if let Some(name) = head.strip_prefix('@') {
            let op: ArrayOperator = name.parse()?;
            if op == ArrayOperator::Count {
                return Err(KvoError::invalid("@count must be the last segment of a key path"));
            }
            return match self.value_for_key_path(rest)? {
                Lookup::Unresolved => Ok(Lookup::Unresolved),
                Lookup::Found(values) => op.apply(&values).map(Lookup::Found),
            };
        }
        match self.value_for_key(head)?.as_node() {
            Some(next) => next.value_for_key_path(rest),
            None => Ok(Lookup::Unresolved),
        }
    }

    fn set_value_for_key_path(&self, value: Value, key_path: &str) -> Result<()> {
        check_path(key_path)?;
        let Some((head, rest)) = key_path.split_once('.') else {
            return self.set_value_for_key(value, key_path);
        };
        if head.starts_with('@') {
            tracing::debug!(key_path, "ignoring write through an aggregate key path");
            return Ok(());
        }
        match self.value_for_key(head)?.as_node() {
            Some(next) => next.set_value_for_key_path(value, rest),
            None => Ok(()),
        }
    }

    fn validate_value_for_key_path(&self, value: Value, key_path: &str) -> Result<Validation> {
        check_path(key_path)?;
        let Some((head, rest)) = key_path.split_once('.') else {
            return self.validate_value_for_key(value, key_path);
        };
        if head.starts_with('@') {
            return Ok(Validation::Accepted(value));
        }
        match self.value_for_key(head)?.as_node() {
            Some(next) => next.validate_value_for_key_path(value, rest),
            None => Ok(Validation::Accepted(value)),
        }
    }

    /// Key info for the last segment, creating entries (and links) along the
    /// way. `None` when an intermediate is missing; operator paths get a
    /// detached, read-only info.
    fn info_for_key_path(&self, key_path: &str) -> Result<Option<Rc<KeyInfo>>> {
        check_path(key_path)?;
        let Some((head, rest)) = key_path.split_once('.') else {
            return self.info_for_key(key_path).map(Some);
        };
        if head.starts_with('@') {
            return Ok(Some(Rc::new(KeyInfo::detached(key_path, false))));
        }
        match self.value_for_key(head)?.as_node() {
            Some(next) => next.info_for_key_path(rest),
            None => Ok(None),
        }
    }

    /// Register `callback` for changes to `key_path` under `observer`'s
    /// identity. Registration happens on this receiver only; changes deeper
    /// in the path reach it by bubbling up through parent links.
    fn add_observer_for_key_path<F>(
        &self,
        observer: ObserverId,
        callback: F,
        key_path: &str,
        context: Value,
    ) -> Result<()>
    where
        F: Fn(&ChangeRecord, &str, &Value) -> std::result::Result<(), ObserverError> + 'static,
    {
        self.as_node()
            .add_observer(observer, Rc::new(callback), key_path, context)
    }

    /// Remove the first registration by `observer` for `key_path`.
    fn remove_observer_for_key_path(&self, observer: ObserverId, key_path: &str) -> Result<()> {
        self.as_node().remove_observer(observer, key_path)
    }

    /// Deliver `change` as a change of `key_path` on this receiver.
    fn notify_observers_of_change_for_key_path(
        &self,
        change: &ChangeRecord,
        key_path: &str,
    ) -> Result<()> {
        check_path(key_path)?;
        self.as_node().notify(change, key_path);
        Ok(())
    }
}

impl KeyValueCoding for Node {
    fn as_node(&self) -> Node {
        self.clone()
    }

    fn info_for_key(&self, key: &str) -> Result<Rc<KeyInfo>> {
        match self {
            Self::Object(o) => o.info_for_key(key),
            Self::Array(a) => a.info_for_key(key),
        }
    }

    fn value_for_key(&self, key: &str) -> Result<Value> {
        match self {
            Self::Object(o) => o.value_for_key(key),
            Self::Array(a) => a.value_for_key(key),
        }
    }

    fn set_value_for_key(&self, value: Value, key: &str) -> Result<()> {
        match self {
            Self::Object(o) => o.set_value_for_key(value, key),
            Self::Array(a) => a.set_value_for_key(value, key),
        }
    }

    fn validate_value_for_key(&self, value: Value, key: &str) -> Result<Validation> {
        match self {
            Self::Object(o) => o.validate_value_for_key(value, key),
            Self::Array(a) => a.validate_value_for_key(value, key),
        }
    }
}

impl Value {
    /// Resolve `key_path` against this value. Primitives resolve nothing.
    pub fn value_for_key_path(&self, key_path: &str) -> Result<Lookup> {
        check_path(key_path)?;
        match self.as_node() {
            Some(node) => node.value_for_key_path(key_path),
            None => Ok(Lookup::Unresolved),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::KvoArray;
    use crate::object::KvoObject;

    fn order() -> KvoObject {
        let lines = KvoArray::from_values(vec![
            KvoObject::new().with("sku", "a").with("price", 2).into(),
            KvoObject::new().with("sku", "b").with("price", 5).into(),
            KvoObject::new().with("sku", "a").with("price", 3).into(),
        ]);
        KvoObject::new()
            .with("lines", lines)
            .with("customer", KvoObject::new().with("name", "Ann"))
    }

    #[test]
    fn dotted_paths_walk_objects() {
        let order = order();
        assert_eq!(
            order.value_for_key_path("customer.name").unwrap(),
            Lookup::Found(Value::from("Ann"))
        );
    }

    #[test]
    fn missing_intermediates_are_unresolved_not_null() {
        let order = order();
        assert_eq!(
            order.value_for_key_path("customer.address.city").unwrap(),
            Lookup::Unresolved
        );
        assert_eq!(
            order.value_for_key_path("customer.address").unwrap(),
            Lookup::Found(Value::Null)
        );
        assert_eq!(
            order.value_for_key_path("customer.name.length").unwrap(),
            Lookup::Unresolved
        );
    }

    #[test]
    fn operators_fold_the_rest_of_the_path() {
        let lines = order().value_for_key("lines").unwrap();
        let lines = lines.as_array().unwrap();
        assert_eq!(
            lines.value_for_key_path("@sum.price").unwrap(),
            Lookup::Found(Value::from(10))
        );
        assert_eq!(
            lines.value_for_key_path("@max.price").unwrap().into_value(),
            Value::from(5)
        );
        assert_eq!(
            lines
                .value_for_key_path("@distinctUnionOfObjects.sku")
                .unwrap()
                .into_value()
                .to_string(),
            "a,b"
        );
        assert_eq!(
            order().value_for_key_path("lines.@count").unwrap(),
            Lookup::Found(Value::from(3))
        );
    }

    #[test]
    fn count_must_be_terminal() {
        let order = order();
        assert!(matches!(
            order.value_for_key_path("lines.@count.price"),
            Err(KvoError::InvalidArgument { .. })
        ));
        assert!(order.value_for_key_path("lines.@median.price").is_err());
    }

    #[test]
    fn empty_paths_and_segments_are_errors() {
        let order = order();
        assert!(order.value_for_key_path("").is_err());
        assert!(order.value_for_key_path("customer..name").is_err());
        assert!(order.set_value_for_key_path(Value::Null, "").is_err());
        assert!(
            order
                .add_observer_for_key_path(ObserverId::new(), |_, _, _| Ok(()), "", Value::Null)
                .is_err()
        );
    }

    #[test]
    fn writes_through_missing_or_aggregate_paths_are_ignored() {
        let order = order();
        order
            .set_value_for_key_path(Value::from("x"), "customer.address.city")
            .unwrap();
        order
            .set_value_for_key_path(Value::from(1), "lines.@sum.price")
            .unwrap();
        assert_eq!(
            order.value_for_key_path("lines.@sum.price").unwrap().into_value(),
            Value::from(10)
        );

        order
            .set_value_for_key_path(Value::from("Bea"), "customer.name")
            .unwrap();
        assert_eq!(
            order.value_for_key_path("customer.name").unwrap().into_value(),
            Value::from("Bea")
        );
    }

    #[test]
    fn validation_through_missing_containers_accepts() {
        let order = order();
        assert_eq!(
            order
                .validate_value_for_key_path(Value::from(3), "customer.address.zip")
                .unwrap(),
            Validation::Accepted(Value::from(3))
        );
    }

    #[test]
    fn info_for_key_path_reports_the_leaf() {
        let order = order();
        let info = order.info_for_key_path("customer.name").unwrap().unwrap();
        assert_eq!(info.key(), "name");
        assert!(info.is_mutable());
        assert!(order.info_for_key_path("customer.address.zip").unwrap().is_none());
        let aggregate = order.info_for_key_path("lines.@sum.price").unwrap().unwrap();
        assert!(!aggregate.is_mutable());
    }

    #[test]
    fn primitive_values_resolve_nothing() {
        assert_eq!(Value::from(3).value_for_key_path("x").unwrap(), Lookup::Unresolved);
    }
}
