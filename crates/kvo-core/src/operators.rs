#![forbid(unsafe_code)]

//! Aggregate `@operator` key-path segments.
//!
//! In `items.@sum.price` style paths the operator segment comes first:
//! `@sum.price` resolves `price` against the receiver (an array maps it over
//! its elements) and folds the result.

use std::cmp::Ordering;
use std::str::FromStr;

use crate::array::KvoArray;
use crate::compare::compare_values;
use crate::error::{KvoError, Result};
use crate::value::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ArrayOperator {
    Avg,
    Count,
    DistinctUnionOfArrays,
    DistinctUnionOfObjects,
    Max,
    Min,
    Sum,
    UnionOfArrays,
    UnionOfObjects,
}

impl ArrayOperator {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Avg => "avg",
            Self::Count => "count",
            Self::DistinctUnionOfArrays => "distinctUnionOfArrays",
            Self::DistinctUnionOfObjects => "distinctUnionOfObjects",
            Self::Max => "max",
            Self::Min => "min",
            Self::Sum => "sum",
            Self::UnionOfArrays => "unionOfArrays",
            Self::UnionOfObjects => "unionOfObjects",
        }
    }

    /// Fold the values resolved for the rest of the path.
    ///
    /// `@count` never reaches here: it only exists as a terminal segment.
    pub fn apply(self, values: &Value) -> Result<Value> {
        let items = elements(values);
        let result = match self {
            Self::Count => {
                return Err(KvoError::invalid("@count must be the last segment of a key path"));
            }
            Self::Avg => {
                if items.is_empty() {
                    Value::Number(f64::NAN)
                } else {
                    Value::Number(sum(&items) / items.len() as f64)
                }
            }
            Self::Sum => Value::Number(sum(&items)),
            Self::Max => extreme(&items, Ordering::Greater),
            Self::Min => extreme(&items, Ordering::Less),
            Self::UnionOfObjects => Value::from(KvoArray::from_values(items)),
            Self::DistinctUnionOfObjects => Value::from(KvoArray::from_values(distinct(items))),
            Self::UnionOfArrays => Value::from(KvoArray::from_values(flatten(&items))),
            Self::DistinctUnionOfArrays => {
                Value::from(KvoArray::from_values(distinct(flatten(&items))))
            }
        };
        Ok(result)
    }
}

impl FromStr for ArrayOperator {
    type Err = KvoError;

    fn from_str(name: &str) -> Result<Self> {
        let op = match name {
            "avg" => Self::Avg,
            "count" => Self::Count,
            "distinctUnionOfArrays" => Self::DistinctUnionOfArrays,
            "distinctUnionOfObjects" => Self::DistinctUnionOfObjects,
            "max" => Self::Max,
            "min" => Self::Min,
            "sum" => Self::Sum,
            "unionOfArrays" => Self::UnionOfArrays,
            "unionOfObjects" => Self::UnionOfObjects,
            other => return Err(KvoError::invalid(format!("unknown array operator `@{other}`"))),
        };
        Ok(op)
    }
}

fn elements(values: &Value) -> Vec<Value> {
    match values {
        Value::Array(array) => array.to_vec(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

fn sum(items: &[Value]) -> f64 {
    items.iter().map(Value::to_number).sum()
}

fn extreme(items: &[Value], wanted: Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for item in items.iter().filter(|v| !v.is_null()) {
        best = match best {
            Some(current) if compare_values(item, current) != wanted => Some(current),
            _ => Some(item),
        };
    }
    best.cloned().unwrap_or_default()
}

fn distinct(items: Vec<Value>) -> Vec<Value> {
    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !out.iter().any(|seen| seen.same(&item)) {
            out.push(item);
        }
    }
    out
}

fn flatten(items: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::Array(inner) => out.extend(inner.to_vec()),
            other => out.push(other.clone()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(values: &[f64]) -> Value {
        Value::array(values.iter().copied())
    }

    #[test]
    fn parses_known_operators() {
        assert_eq!("sum".parse::<ArrayOperator>().unwrap(), ArrayOperator::Sum);
        assert_eq!(
            "distinctUnionOfArrays".parse::<ArrayOperator>().unwrap().name(),
            "distinctUnionOfArrays"
        );
        assert!(matches!(
            "median".parse::<ArrayOperator>(),
            Err(KvoError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn numeric_folds() {
        let values = numbers(&[3.0, 1.0, 2.0]);
        assert_eq!(ArrayOperator::Sum.apply(&values).unwrap(), Value::from(6));
        assert_eq!(ArrayOperator::Avg.apply(&values).unwrap(), Value::from(2));
        assert_eq!(ArrayOperator::Max.apply(&values).unwrap(), Value::from(3));
        assert_eq!(ArrayOperator::Min.apply(&values).unwrap(), Value::from(1));
    }

    #[test]
    fn empty_inputs() {
        let empty = Value::array(Vec::<Value>::new());
        assert!(ArrayOperator::Avg.apply(&empty).unwrap().as_number().unwrap().is_nan());
        assert_eq!(ArrayOperator::Sum.apply(&empty).unwrap(), Value::from(0));
        assert!(ArrayOperator::Max.apply(&empty).unwrap().is_null());
    }

    #[test]
    fn min_and_max_skip_nulls() {
        let values = Value::array([Value::Null, Value::from(4), Value::from(9), Value::Null]);
        assert_eq!(ArrayOperator::Max.apply(&values).unwrap(), Value::from(9));
        assert_eq!(ArrayOperator::Min.apply(&values).unwrap(), Value::from(4));
    }

    #[test]
    fn unions() {
        let nested = Value::array([Value::array(["a", "b"]), Value::array(["b", "c"])]);
        let all = ArrayOperator::UnionOfArrays.apply(&nested).unwrap();
        assert_eq!(all.to_string(), "a,b,b,c");
        let distinct = ArrayOperator::DistinctUnionOfArrays.apply(&nested).unwrap();
        assert_eq!(distinct.to_string(), "a,b,c");

        let flat = Value::array(["x", "y", "x"]);
        assert_eq!(ArrayOperator::UnionOfObjects.apply(&flat).unwrap().to_string(), "x,y,x");
        assert_eq!(
            ArrayOperator::DistinctUnionOfObjects.apply(&flat).unwrap().to_string(),
            "x,y"
        );
    }

    #[test]
    fn count_is_not_a_fold() {
        assert!(ArrayOperator::Count.apply(&numbers(&[1.0])).is_err());
    }
}
