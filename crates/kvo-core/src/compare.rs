#![forbid(unsafe_code)]

//! Value ordering and sort descriptors.

use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

use crate::class::ObjectClass;
use crate::error::{KvoError, Result};
use crate::keypath::KeyValueCoding;
use crate::value::{Lookup, Value};

/// A comparison function over values.
pub type Comparator = Rc<dyn Fn(&Value, &Value) -> Ordering>;

/// Name of the class comparator consulted for objects by [`compare_values`].
pub const DEFAULT_COMPARATOR: &str = "compare";

/// Default ordering for values. This is a total order, so it is safe to hand
/// to `sort_by`.
///
/// - Values of different kinds order by kind: null, booleans, numbers,
///   strings (markers included), arrays, objects.
/// - Numbers compare numerically; every `NaN` is equal to every other `NaN`
///   and sorts after all other numbers.
/// - Strings compare lexicographically.
/// - Arrays compare by length, then element by element.
/// - Objects group by class. Two objects of the same class use the class's
///   `compare` comparator if declared, otherwise their string forms.
#[must_use]
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    kind_rank(a).cmp(&kind_rank(b)).then_with(|| match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(*x, *y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            let (xs, ys) = (x.to_vec(), y.to_vec());
            xs.len().cmp(&ys.len()).then_with(|| {
                xs.iter()
                    .zip(&ys)
                    .map(|(l, r)| compare_values(l, r))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            })
        }
        (Value::Object(x), Value::Object(y)) => {
            let (cx, cy) = (x.class(), y.class());
            class_order(cx, cy).then_with(|| {
                match cx.and_then(|c| c.comparator(DEFAULT_COMPARATOR)) {
                    Some(compare) => compare(a, b),
                    None => a.to_string().cmp(&b.to_string()),
                }
            })
        }
        (Value::Null, _) => Ordering::Equal,
        _ => a.to_string().cmp(&b.to_string()),
    })
}

const fn kind_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) | Value::Marker(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_numbers(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}

/// Classless objects first, then by class name; distinct classes sharing a
/// name are told apart by identity.
fn class_order(a: Option<&Rc<ObjectClass>>, b: Option<&Rc<ObjectClass>>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) if Rc::ptr_eq(x, y) => Ordering::Equal,
        (Some(x), Some(y)) => x
            .name()
            .cmp(y.name())
            .then_with(|| Rc::as_ptr(x).cast::<()>().cmp(&Rc::as_ptr(y).cast::<()>())),
    }
}

/// How a sort descriptor compares the values it extracts.
#[derive(Clone)]
pub enum Comparison {
    /// [`compare_values`].
    Default,
    /// A comparator declared on the first value's class.
    Named(String),
    Custom(Comparator),
}

impl fmt::Debug for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Orders objects by the value at a key path.
#[derive(Clone, Debug)]
pub struct SortDescriptor {
    key_path: String,
    ascending: bool,
    comparison: Comparison,
}

impl SortDescriptor {
    pub fn new(key_path: impl Into<String>, ascending: bool) -> Self {
        Self {
            key_path: key_path.into(),
            ascending,
            comparison: Comparison::Default,
        }
    }

    /// Compare with the comparator called `name` on the compared values'
    /// class. The name is resolved on each comparison.
    pub fn with_comparator_named(
        key_path: impl Into<String>,
        ascending: bool,
        name: impl Into<String>,
    ) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(KvoError::invalid("comparator name may not be empty"));
        }
        Ok(Self {
            key_path: key_path.into(),
            ascending,
            comparison: Comparison::Named(name),
        })
    }

    pub fn with_comparator(
        key_path: impl Into<String>,
        ascending: bool,
        compare: impl Fn(&Value, &Value) -> Ordering + 'static,
    ) -> Self {
        Self {
            key_path: key_path.into(),
            ascending,
            comparison: Comparison::Custom(Rc::new(compare)),
        }
    }

    #[must_use]
    pub fn key_path(&self) -> &str {
        &self.key_path
    }

    #[must_use]
    pub const fn ascending(&self) -> bool {
        self.ascending
    }

    #[must_use]
    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    /// Compare two objects (or arrays) by the value at the key path.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if either side is not a composite value; `Type` if a
    /// named comparator cannot be resolved.
    pub fn compare_objects(&self, a: &Value, b: &Value) -> Result<Ordering> {
        let v1 = self.sort_key_of(a)?;
        let v2 = self.sort_key_of(b)?;
        let named = self.resolve(&v1)?;
        Ok(self.order(&v1, &v2, named.as_ref()))
    }

    fn sort_key_of(&self, value: &Value) -> Result<Value> {
        let node = value.as_node().ok_or_else(|| {
            KvoError::invalid("sort descriptors compare objects that support key-value coding")
        })?;
        Ok(node.value_for_key_path(&self.key_path)?.into_value())
    }

    /// The named comparator for a key, looked up on the key's class.
    fn resolve(&self, key: &Value) -> Result<Option<Comparator>> {
        let Comparison::Named(name) = &self.comparison else {
            return Ok(None);
        };
        key.as_object()
            .and_then(|o| o.class())
            .and_then(|c| c.comparator(name))
            .map(Some)
            .ok_or_else(|| {
                KvoError::type_error(format!(
                    "comparator `{name}` is not declared for `{}`",
                    self.key_path
                ))
            })
    }

    fn order(&self, v1: &Value, v2: &Value, named: Option<&Comparator>) -> Ordering {
        let ordering = match (&self.comparison, named) {
            (Comparison::Custom(compare), _) | (Comparison::Named(_), Some(compare)) => compare(v1, v2),
            _ => compare_values(v1, v2),
        };
        if self.ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }

    /// The same descriptor sorting the other way.
    #[must_use]
    pub fn reversed_sort_descriptor(&self) -> Self {
        Self {
            ascending: !self.ascending,
            ..self.clone()
        }
    }
}

/// Stable sort by a chain of descriptors; later descriptors break ties.
///
/// Every sort key is read (and every named comparator resolved) before any
/// element moves, so on error the slice is left untouched.
///
/// # Errors
///
/// `InvalidArgument` if an element is not a composite value; key path errors
/// from reading a sort key; `Type` if a named comparator cannot be resolved.
///
/// # Panics
///
/// May panic if a custom or class comparator is not a total order.
pub fn sort_values(values: &mut [Value], descriptors: &[SortDescriptor]) -> Result<()> {
    if descriptors.is_empty() {
        return Ok(());
    }
    let mut entries = values
        .iter()
        .map(|value| {
            let keys = descriptors
                .iter()
                .map(|descriptor| {
                    let key = descriptor.sort_key_of(value)?;
                    let named = descriptor.resolve(&key)?;
                    Ok((key, named))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok((keys, value.clone()))
        })
        .collect::<Result<Vec<_>>>()?;
    entries.sort_by(|(left, _), (right, _)| {
        descriptors
            .iter()
            .zip(left.iter().zip(right))
            .map(|(descriptor, ((v1, named), (v2, _)))| descriptor.order(v1, v2, named.as_ref()))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    });
    for (slot, (_, value)) in values.iter_mut().zip(entries) {
        *slot = value;
    }
    Ok(())
}

/// Resolve a key path on a value for sorting; unresolved reads as null.
#[must_use]
pub fn sort_key(value: &Value, key_path: &str) -> Value {
    value
        .value_for_key_path(key_path)
        .map(Lookup::into_value)
        .unwrap_or_default()
}
