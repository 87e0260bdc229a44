#![forbid(unsafe_code)]

//! Bindings between observable key paths and their consumers.
//!
//! - [`Binding`]: watches one key path on a source node, runs each change
//!   through an optional [`ValueTransformer`], substitutes placeholders for
//!   marker values and writes back through the reverse transformation.
//! - [`Bindable`]: an object exposing named bindings set up from
//!   `"key.path(transformer)"` strings, resolved against a [`DataModel`].
//! - [`TransformerRegistry`]: named transformer instances and factories.
//! - [`ObjectController`] and [`ArrayController`]: bindable owners of
//!   content that present their selection through a [`SelectionProxy`].
//!
//! # Example
//!
//! ```
//! use kvo_bind::{Bindable, DataModel, TransformerRegistry};
//! use kvo_core::{KeyValueCoding, KvoObject, Value};
//!
//! let models = DataModel::new();
//! let task = KvoObject::new().with("done", false);
//! models.register_model_with_name(task.clone(), "task").unwrap();
//!
//! let checkbox = Bindable::builder()
//!     .expose("pending")
//!     .data_model(models)
//!     .registry(TransformerRegistry::with_builtins())
//!     .build();
//! checkbox.setup_bindings([("pendingBinding", "task.done(not)")]).unwrap();
//! checkbox.update_bindings();
//! assert_eq!(checkbox.object().value_for_key("pending").unwrap(), Value::from(true));
//!
//! task.set_value_for_key(Value::from(true), "done").unwrap();
//! assert_eq!(checkbox.object().value_for_key("pending").unwrap(), Value::from(false));
//! ```

pub mod array_controller;
pub mod bindable;
pub mod binding;
pub mod binding_string;
pub mod controller;
pub mod data_model;
pub mod registry;
pub mod selection;
pub mod transformer;

pub use array_controller::{ArrayController, FilterPredicate};
pub use bindable::{Bindable, BindableBuilder};
pub use binding::{
    Binding, BindingObserverFn, BindingSettings, Placeholder, PlaceholderSource, TransformerSource,
};
pub use binding_string::{BindingInfo, ParseBindingError, parse_binding_string};
pub use controller::{ControllerSettings, ObjectController};
pub use data_model::DataModel;
pub use registry::{
    TransformerFactory, TransformerRegistry, find_transformer_with_name,
    register_transformer_with_name,
};
pub use selection::{SelectionProxy, SelectionSource};
pub use transformer::{
    BooleanMatch, FirstObject, Generic, Matches, Not, SharedTransformer, StringsToObjects,
    Truncated, ValueTransformer,
};
