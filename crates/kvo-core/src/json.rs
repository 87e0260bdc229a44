#![forbid(unsafe_code)]

//! Conversion between [`Value`] trees and `serde_json` documents.
//!
//! JSON objects become [`KvoObject`]s with stored fields and JSON arrays become
//! [`KvoArray`]s, so a parsed document is observable as soon as it is adapted.
//!
//! # Failure Modes
//!
//! - Non-finite numbers have no JSON form and serialize as `null`.
//! - A reference cycle in the graph serializes the repeated node as `null`.

use ahash::AHashSet;
use serde_json::{Map, Number};

use crate::array::KvoArray;
use crate::object::KvoObject;
use crate::value::{Uid, Value};

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl Value {
    /// Adapt a JSON tree into observable objects and arrays.
    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::Array(KvoArray::from_values(
                items.iter().map(Self::from_json).collect(),
            )),
            serde_json::Value::Object(fields) => {
                let object = KvoObject::new();
                for (key, value) in fields {
                    object.set_primitive_value(key, Self::from_json(value));
                }
                Self::Object(object)
            }
        }
    }

    /// Snapshot this value as JSON. Markers become their sentinel strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut path = AHashSet::new();
        to_json_inner(self, &mut path)
    }
}

fn to_json_inner(value: &Value, path: &mut AHashSet<Uid>) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Marker(m) => serde_json::Value::String(m.sentinel().to_owned()),
        Value::Object(object) => {
            let uid = object.uid();
            if !path.insert(uid) {
                tracing::debug!(uid, "cycle while converting to json");
                return serde_json::Value::Null;
            }
            let mut fields = Map::new();
            for key in object.stored_keys() {
                let field = object.primitive_value(&key);
                fields.insert(key, to_json_inner(&field, path));
            }
            path.remove(&uid);
            serde_json::Value::Object(fields)
        }
        Value::Array(array) => {
            let uid = array.uid();
            if !path.insert(uid) {
                tracing::debug!(uid, "cycle while converting to json");
                return serde_json::Value::Null;
            }
            let items = array.to_vec().iter().map(|v| to_json_inner(v, path)).collect();
            path.remove(&uid);
            serde_json::Value::Array(items)
        }
    }
}

fn number(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        #[allow(clippy::cast_possible_truncation)]
        return serde_json::Value::Number(Number::from(n as i64));
    }
    Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}
