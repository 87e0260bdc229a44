#![forbid(unsafe_code)]

//! Value transformers: conversions applied between a model value and the
//! value a binding hands to its consumer.
//!
//! A transformer always has a forward direction. Reverse transformation is
//! optional; a binding whose transformer cannot reverse is one-way.

use std::fmt;
use std::rc::Rc;

use kvo_core::{KeyValueCoding, KvoArray, KvoError, KvoObject, Result, Value};
use regex_lite::Regex;

/// Shared handle to a transformer.
pub type SharedTransformer = Rc<dyn ValueTransformer>;

/// Converts model values for presentation and, optionally, back.
pub trait ValueTransformer {
    fn transformed_value(&self, value: &Value) -> Value;

    /// Whether [`reverse_transformed_value`](Self::reverse_transformed_value)
    /// is meaningful.
    fn allows_reverse_transformation(&self) -> bool {
        false
    }

    /// Map a presented value back to a model value. `None` when the
    /// transformer is forward-only.
    fn reverse_transformed_value(&self, _value: &Value) -> Option<Value> {
        None
    }
}

impl fmt::Debug for dyn ValueTransformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueTransformer")
            .field("reversible", &self.allows_reverse_transformation())
            .finish()
    }
}

/// Loose equality for primitive matching: identical values, or primitives
/// with the same display form (`1` matches `"1"`).
fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a.same(b) {
        return true;
    }
    let primitive = |v: &Value| matches!(v, Value::Bool(_) | Value::Number(_) | Value::String(_));
    primitive(a) && primitive(b) && a.to_string() == b.to_string()
}

/// Logical negation by truthiness.
#[derive(Clone, Copy, Debug, Default)]
pub struct Not;

impl ValueTransformer for Not {
    fn transformed_value(&self, value: &Value) -> Value {
        Value::Bool(!value.truthy())
    }

    fn allows_reverse_transformation(&self) -> bool {
        true
    }

    fn reverse_transformed_value(&self, value: &Value) -> Option<Value> {
        Some(Value::Bool(!value.truthy()))
    }
}

/// Shortens long text by cutting out its middle.
///
/// `"a long sentence"` with a small `max` becomes `"a l … nce"`: the head and
/// tail keep `max / 2 - 2` characters each, joined around an ellipsis by
/// single spaces.
#[derive(Clone, Copy, Debug)]
pub struct Truncated {
    max: usize,
}

impl Truncated {
    pub const DEFAULT_MAX: usize = 50;
    const ELLIPSIS: char = '\u{2026}';

    /// A zero `max` selects the default.
    #[must_use]
    pub const fn new(max: usize) -> Self {
        Self {
            max: if max == 0 { Self::DEFAULT_MAX } else { max },
        }
    }

    #[must_use]
    pub const fn max(&self) -> usize {
        self.max
    }
}

impl Default for Truncated {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX)
    }
}

impl ValueTransformer for Truncated {
    fn transformed_value(&self, value: &Value) -> Value {
        let is_zero = value.as_number() == Some(0.0);
        if !value.truthy() && !is_zero {
            return value.clone();
        }
        let text = value.to_string();
        let len = text.chars().count();
        if len <= self.max {
            return Value::String(text);
        }
        let half = (self.max / 2).saturating_sub(2);
        let head: String = text.chars().take(half).collect();
        let tail: String = text.chars().skip(len - half).collect();
        Value::String(format!("{head} {} {tail}", Self::ELLIPSIS))
    }
}

/// Wraps each string of an array in an object under `key`, and unwraps on
/// the way back.
#[derive(Clone, Debug)]
pub struct StringsToObjects {
    key: String,
}

impl StringsToObjects {
    pub const DEFAULT_KEY: &'static str = "string";

    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Default for StringsToObjects {
    fn default() -> Self {
        Self::new(Self::DEFAULT_KEY)
    }
}

impl ValueTransformer for StringsToObjects {
    fn transformed_value(&self, value: &Value) -> Value {
        let Some(array) = value.as_array() else {
            return value.clone();
        };
        let objects = array
            .to_vec()
            .into_iter()
            .map(|item| Value::from(KvoObject::new().with(&self.key, item)))
            .collect();
        Value::Array(KvoArray::from_values(objects))
    }

    fn allows_reverse_transformation(&self) -> bool {
        true
    }

    fn reverse_transformed_value(&self, value: &Value) -> Option<Value> {
        let Some(array) = value.as_array() else {
            return Some(value.clone());
        };
        let strings = array
            .to_vec()
            .iter()
            .map(|item| match item.as_object() {
                Some(object) => object.value_for_key(&self.key).unwrap_or_default(),
                None => Value::Null,
            })
            .collect();
        Some(Value::Array(KvoArray::from_values(strings)))
    }
}

/// True exactly when the value matches `true_value`; reverses to
/// `true_value` or `false_value`.
#[derive(Clone, Debug)]
pub struct BooleanMatch {
    true_value: Value,
    false_value: Value,
}

impl BooleanMatch {
    pub fn new(true_value: impl Into<Value>, false_value: impl Into<Value>) -> Self {
        Self {
            true_value: true_value.into(),
            false_value: false_value.into(),
        }
    }
}

impl ValueTransformer for BooleanMatch {
    fn transformed_value(&self, value: &Value) -> Value {
        Value::Bool(loosely_equal(value, &self.true_value))
    }

    fn allows_reverse_transformation(&self) -> bool {
        true
    }

    fn reverse_transformed_value(&self, value: &Value) -> Option<Value> {
        Some(if value.truthy() {
            self.true_value.clone()
        } else {
            self.false_value.clone()
        })
    }
}

/// True when the value's text matches a regular expression. Forward only.
#[derive(Clone, Debug)]
pub struct Matches {
    pattern: Regex,
}

impl Matches {
    /// # Errors
    ///
    /// `InvalidArgument` if `pattern` does not compile.
    pub fn new(pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|err| KvoError::invalid(format!("bad pattern `{pattern}`: {err}")))?;
        Ok(Self { pattern })
    }
}

impl ValueTransformer for Matches {
    fn transformed_value(&self, value: &Value) -> Value {
        Value::Bool(self.pattern.is_match(&value.to_string()))
    }
}

/// Maps between parallel lists of model and display values. Values missing
/// from the lists map to null.
#[derive(Clone, Debug)]
pub struct Generic {
    model_values: Vec<Value>,
    display_values: Vec<Value>,
}

impl Generic {
    /// # Errors
    ///
    /// `InvalidArgument` if the lists differ in length.
    pub fn new(model_values: Vec<Value>, display_values: Vec<Value>) -> Result<Self> {
        if model_values.len() != display_values.len() {
            return Err(KvoError::invalid(format!(
                "generic transformer needs parallel lists, got {} model and {} display values",
                model_values.len(),
                display_values.len()
            )));
        }
        Ok(Self {
            model_values,
            display_values,
        })
    }

    fn map(value: &Value, from: &[Value], to: &[Value]) -> Value {
        from.iter()
            .position(|candidate| loosely_equal(candidate, value))
            .and_then(|i| to.get(i).cloned())
            .unwrap_or_default()
    }
}

impl ValueTransformer for Generic {
    fn transformed_value(&self, value: &Value) -> Value {
        Self::map(value, &self.model_values, &self.display_values)
    }

    fn allows_reverse_transformation(&self) -> bool {
        true
    }

    fn reverse_transformed_value(&self, value: &Value) -> Option<Value> {
        Some(Self::map(value, &self.display_values, &self.model_values))
    }
}

/// First element of an array; other values pass through. Forward only.
#[derive(Clone, Copy, Debug, Default)]
pub struct FirstObject;

impl ValueTransformer for FirstObject {
    fn transformed_value(&self, value: &Value) -> Value {
        match value.as_array() {
            Some(array) => array.get(0).unwrap_or_default(),
            None => value.clone(),
        }
    }
}
