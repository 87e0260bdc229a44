#![forbid(unsafe_code)]

//! Dynamic values flowing through observed graphs.
//!
//! [`Value`] is the payload of every property read, write and change record.
//! Primitives compare by content; composites ([`KvoObject`], [`KvoArray`])
//! compare by identity, so replacing an object with a structurally equal copy
//! still counts as a change.
//!
//! [`Node`] is the composite subset of `Value`: the things that own observer
//! tables and parent links. Nodes get a process-unique [`Uid`] the first time
//! observation touches them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::array::{KvoArray, WeakArray};
use crate::markers::Marker;
use crate::object::{KvoObject, WeakObject};
use crate::observer::NodeCore;

/// Stable identity token for nodes and parent-link slots.
pub type Uid = u64;

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh identity token.
#[must_use]
pub fn generate_uid() -> Uid {
    NEXT_UID.fetch_add(1, Ordering::Relaxed)
}

/// A property value.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Marker(Marker),
    Object(KvoObject),
    Array(KvoArray),
}

impl Value {
    /// Build an observable array from plain values.
    pub fn array<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Array(KvoArray::from_values(values.into_iter().map(Into::into).collect()))
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&KvoObject> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&KvoArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The composite node behind this value, if any.
    #[must_use]
    pub fn as_node(&self) -> Option<Node> {
        match self {
            Self::Object(o) => Some(Node::Object(o.clone())),
            Self::Array(a) => Some(Node::Array(a.clone())),
            _ => None,
        }
    }

    /// Identity for composites, content for primitives. `NaN` never matches.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Marker(a), Self::Marker(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Loose truthiness: null, false, zero, `NaN` and the empty string are false.
    #[must_use]
    pub fn truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Marker(_) | Self::Object(_) | Self::Array(_) => true,
        }
    }

    /// Numeric coercion used by aggregate operators.
    ///
    /// Null and false are zero, true is one, strings parse or yield `NaN`.
    #[must_use]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
            Self::Marker(_) | Self::Object(_) => f64::NAN,
            Self::Array(a) => match a.len() {
                0 => 0.0,
                1 => a.get(0).map_or(f64::NAN, |v| v.to_number()),
                _ => f64::NAN,
            },
        }
    }

    /// Short name of the value's kind, used by mixed-type comparison.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) | Self::Marker(_) => "string",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write_number(f, *n),
            Self::String(s) => f.write_str(s),
            Self::Marker(m) => f.write_str(m.sentinel()),
            Self::Object(_) => f.write_str("[object]"),
            Self::Array(a) => {
                for (i, item) in a.to_vec().iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    if !item.is_null() {
                        write!(f, "{item}")?;
                    }
                }
                Ok(())
            }
        }
    }
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        write!(f, "{}", n as i64)
    } else {
        write!(f, "{n}")
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Number(f64::from(value))
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Marker> for Value {
    fn from(value: Marker) -> Self {
        Self::Marker(value)
    }
}

impl From<KvoObject> for Value {
    fn from(value: KvoObject) -> Self {
        Self::Object(value)
    }
}

impl From<KvoArray> for Value {
    fn from(value: KvoArray) -> Self {
        Self::Array(value)
    }
}

impl From<Node> for Value {
    fn from(value: Node) -> Self {
        value.into_value()
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Outcome of resolving a key path.
///
/// `Unresolved` means an intermediate container was missing; `Found(Null)`
/// means the path resolved to an empty slot.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Lookup {
    #[default]
    Unresolved,
    Found(Value),
}

impl Lookup {
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match self {
            Self::Found(v) => Some(v),
            Self::Unresolved => None,
        }
    }

    /// Collapse to a plain value; unresolved paths read as null.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Found(v) => v,
            Self::Unresolved => Value::Null,
        }
    }
}

/// A composite value: something that can be observed and linked.
#[derive(Clone, Debug)]
pub enum Node {
    Object(KvoObject),
    Array(KvoArray),
}

impl Node {
    /// Identity token, assigned on first use.
    #[must_use]
    pub fn uid(&self) -> Uid {
        self.core().uid()
    }

    #[must_use]
    pub fn same(&self, other: &Node) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Object(o) => Value::Object(o),
            Self::Array(a) => Value::Array(a),
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&KvoObject> {
        match self {
            Self::Object(o) => Some(o),
            Self::Array(_) => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&KvoArray> {
        match self {
            Self::Array(a) => Some(a),
            Self::Object(_) => None,
        }
    }

    pub(crate) fn core(&self) -> &NodeCore {
        match self {
            Self::Object(o) => o.core(),
            Self::Array(a) => a.core(),
        }
    }

    pub(crate) fn downgrade(&self) -> WeakNode {
        match self {
            Self::Object(o) => WeakNode::Object(o.downgrade()),
            Self::Array(a) => WeakNode::Array(a.downgrade()),
        }
    }
}

impl From<KvoObject> for Node {
    fn from(value: KvoObject) -> Self {
        Self::Object(value)
    }
}

impl From<KvoArray> for Node {
    fn from(value: KvoArray) -> Self {
        Self::Array(value)
    }
}

impl From<&KvoObject> for Node {
    fn from(value: &KvoObject) -> Self {
        Self::Object(value.clone())
    }
}

impl From<&KvoArray> for Node {
    fn from(value: &KvoArray) -> Self {
        Self::Array(value.clone())
    }
}

/// Non-owning reference to a node. Parent links hold these so that a child
/// never keeps its containers alive.
#[derive(Clone)]
pub(crate) enum WeakNode {
    Object(WeakObject),
    Array(WeakArray),
}

impl WeakNode {
    pub(crate) fn upgrade(&self) -> Option<Node> {
        match self {
            Self::Object(o) => o.upgrade().map(Node::Object),
            Self::Array(a) => a.upgrade().map(Node::Array),
        }
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "WeakNode({})", node.uid()),
            None => f.write_str("WeakNode(<dropped>)"),
        }
    }
}
