#![forbid(unsafe_code)]

//! Key-value observing for dynamic object graphs, with bindings.
//!
//! This crate re-exports [`kvo_core`] (values, objects, arrays, key paths,
//! change notification, sorting) and [`kvo_bind`] (transformers, bindings,
//! bindables, data models, controllers). Most applications only need the [`prelude`].
//!
//! # Feature Flags
//!
//! - `json`: `Value::from_json` / `Value::to_json` for `serde_json` trees.

pub use kvo_bind;
pub use kvo_core;

pub use kvo_bind::{
    ArrayController, Bindable, Binding, BindingSettings, ControllerSettings, DataModel,
    ObjectController, Placeholder, SelectionProxy, TransformerRegistry, ValueTransformer,
};
pub use kvo_core::{
    ChangeKind, ChangeRecord, KeyValueCoding, KvoArray, KvoError, KvoObject, Lookup, Marker,
    MarkerType, Node, ObjectClass, ObserverId, PropertyDescriptor, Result, SortDescriptor, Value,
};

/// The types and traits needed to build, observe and bind object graphs.
pub mod prelude {
    pub use kvo_bind::{
        ArrayController, Bindable, Binding, BindingSettings, ControllerSettings, DataModel,
        ObjectController, Placeholder, SelectionProxy, TransformerRegistry, ValueTransformer,
    };
    pub use kvo_core::{
        ChangeKind, ChangeRecord, KeyValueCoding, KvoArray, KvoError, KvoObject, Lookup, Marker,
        MarkerType, Node, ObjectClass, ObserverId, PropertyDescriptor, SortDescriptor, Value,
        collapse_selection, sort_values,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn prelude_covers_an_observe_and_bind_round() {
        let models = DataModel::new();
        let cart = KvoObject::new().with("items", KvoArray::from_values(vec![Value::from(2), Value::from(3)]));
        models.register_model_with_name(cart.clone(), "cart").unwrap();

        let kinds: Rc<RefCell<Vec<ChangeKind>>> = Rc::default();
        let sink = Rc::clone(&kinds);
        cart.add_observer_for_key_path(
            ObserverId::new(),
            move |change, _, _| {
                sink.borrow_mut().push(change.kind());
                Ok(())
            },
            "items",
            Value::Null,
        )
        .unwrap();

        let badge = Bindable::builder()
            .expose("count")
            .data_model(models)
            .registry(TransformerRegistry::with_builtins())
            .build();
        badge.setup_bindings([("countBinding", "cart.items.@count")]).unwrap();
        badge.update_bindings();
        assert_eq!(badge.object().value_for_key("count").unwrap(), Value::from(2));

        let items = cart.value_for_key("items").unwrap();
        items.as_array().unwrap().add_object(4);
        assert_eq!(*kinds.borrow(), [ChangeKind::Insertion]);
        assert_eq!(
            cart.value_for_key_path("items.@count").unwrap().into_value(),
            Value::from(3)
        );
    }
}
