#![forbid(unsafe_code)]

//! Key-value coding and observation for dynamic object graphs.
//!
//! This crate provides:
//!
//! - [`KvoObject`] and [`KvoArray`]: shared, observable containers of
//!   [`Value`]s, addressed by key and by dotted key path.
//! - [`ObjectClass`]: per-type property declarations (computed getters,
//!   custom setters, validators, dependent keys, named comparators).
//! - Change notification: `will`/`did` brackets with no-op elision, observer
//!   registration for key paths of any depth, and [`ChangeRecord`]s that carry
//!   insertion, deletion and replacement detail for arrays.
//! - Aggregate key-path operators (`@sum`, `@count`, `@distinctUnionOfObjects`,
//!   ...) and [`SortDescriptor`]-based ordering.
//!
//! # Architecture
//!
//! Every composite value is a [`Node`] with a lazily assigned [`Uid`], an
//! observer table keyed by key path and a set of weak parent links. A change
//! is delivered to the node's own observers and then bubbles up each parent
//! link, re-keyed as `"<key>.<key path>"`, so an observer registered on a root
//! for `a.b.c` hears about `c` changing on any object currently reachable at
//! `a.b`. Replacing an intermediate moves the links along with it.
//!
//! Everything is single-threaded: handles are `Rc` based and not `Send`.
//!
//! # Invariants
//!
//! 1. A bracketed change notifies exactly once, from the outermost `did`, and
//!    only when the value actually changed (composites compare by identity).
//! 2. Observers for a key path see each relevant change once per registration,
//!    even when the same child is reachable through several keys or parents.
//! 3. A failing or panicking observer never prevents delivery to the others.
//! 4. Parent links never keep a parent alive.
//!
//! # Example
//!
//! ```
//! use kvo_core::{KeyValueCoding, KvoObject, ObserverId, Value};
//!
//! let address = KvoObject::new().with("city", "Lyon");
//! let person = KvoObject::new().with("address", address.clone());
//!
//! person
//!     .add_observer_for_key_path(
//!         ObserverId::new(),
//!         |change, key_path, _context| {
//!             println!("{key_path}: {} -> {}", change.old_value(), change.new_value());
//!             Ok(())
//!         },
//!         "address.city",
//!         Value::Null,
//!     )
//!     .unwrap();
//!
//! address.set_value_for_key(Value::from("Nice"), "city").unwrap();
//! ```

pub mod array;
pub mod change;
pub mod class;
pub mod compare;
pub mod error;
#[cfg(feature = "json")]
mod json;
pub mod key_info;
pub mod keypath;
mod links;
pub mod markers;
mod notify;
pub mod object;
pub mod observer;
pub mod operators;
pub mod value;

pub use array::KvoArray;
pub use change::{ChangeKind, ChangeRecord};
pub use class::{FallbackProperty, ObjectClass, ObjectClassBuilder};
pub use compare::{Comparator, Comparison, SortDescriptor, compare_values, sort_key, sort_values};
pub use error::{
    CallbackFailure, KvoError, ObserverError, Result, Validation, ValidationError, call_isolated,
};
pub use key_info::{KeyInfo, PropertyDescriptor};
pub use keypath::KeyValueCoding;
pub use markers::{Marker, MarkerType, collapse_selection, marker_type_from_value};
pub use object::KvoObject;
pub use observer::{ALL_PROPERTIES_KEY, ObserverFn, ObserverId};
pub use operators::ArrayOperator;
pub use value::{Lookup, Node, Uid, Value, generate_uid};
