#![forbid(unsafe_code)]

//! Marker values for aggregate selections.

use std::fmt;

use crate::value::Value;

/// Sentinel standing in for a selection that has no single concrete value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Marker {
    /// The selection holds several differing values.
    MultipleValues,
    /// Nothing is selected.
    NoSelection,
}

impl Marker {
    /// Sentinel text used when a marker is displayed or compared as a string.
    #[must_use]
    pub const fn sentinel(self) -> &'static str {
        match self {
            Self::MultipleValues => "kvo.marker.multiple-values",
            Self::NoSelection => "kvo.marker.no-selection",
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sentinel())
    }
}

/// Which placeholder slot a marker value maps to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerType {
    NullValue,
    MultipleValues,
    NoSelection,
}

impl MarkerType {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NullValue => "nullValue",
            Self::MultipleValues => "multipleValues",
            Self::NoSelection => "noSelection",
        }
    }
}

impl fmt::Display for MarkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a value for placeholder substitution.
///
/// Null and the empty string are null values; `0` and `false` are ordinary.
#[must_use]
pub fn marker_type_from_value(value: &Value) -> Option<MarkerType> {
    match value {
        Value::Null => Some(MarkerType::NullValue),
        Value::String(s) if s.is_empty() => Some(MarkerType::NullValue),
        Value::Marker(Marker::MultipleValues) => Some(MarkerType::MultipleValues),
        Value::Marker(Marker::NoSelection) => Some(MarkerType::NoSelection),
        _ => None,
    }
}

/// Reduce the values of a selection to one value.
///
/// An empty selection yields [`Marker::NoSelection`]; if every element is the
/// same value that value is returned, otherwise [`Marker::MultipleValues`].
#[must_use]
pub fn collapse_selection(values: &[Value]) -> Value {
    let Some((first, rest)) = values.split_first() else {
        return Value::Marker(Marker::NoSelection);
    };
    if rest.iter().all(|v| v.same(first)) {
        first.clone()
    } else {
        Value::Marker(Marker::MultipleValues)
    }
}
