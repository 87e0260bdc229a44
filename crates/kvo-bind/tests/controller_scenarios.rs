#![forbid(unsafe_code)]

//! End-to-end scenarios for controllers registered in a `DataModel`.

use kvo_bind::{ArrayController, Bindable, ControllerSettings, DataModel, TransformerRegistry};
use kvo_core::{KeyValueCoding, KvoArray, KvoObject, MarkerType, SortDescriptor, Value};

fn settings(models: &DataModel) -> ControllerSettings {
    ControllerSettings::new()
        .data_model(models.clone())
        .registry(TransformerRegistry::with_builtins())
}

fn named(key: &str, name: &str) -> Value {
    KvoObject::new().with(key, name).into()
}

fn listed(values: &KvoArray, key: &str) -> String {
    values.value_for_key(key).unwrap().to_string()
}

#[test]
fn a_label_follows_the_selected_name() {
    let models = DataModel::new();
    let people = ArrayController::new(settings(&models)).unwrap();
    people.register_with_name("people").unwrap();

    let label = Bindable::builder()
        .expose("value")
        .default_placeholder("value", MarkerType::NoSelection, "No selection")
        .default_placeholder("value", MarkerType::MultipleValues, "Multiple values")
        .data_model(models.clone())
        .registry(TransformerRegistry::with_builtins())
        .build();
    label.setup_bindings([("valueBinding", "people.selection.name")]).unwrap();
    label.update_bindings();
    let shown = || label.object().value_for_key("value").unwrap();
    assert_eq!(shown(), Value::from("No selection"));

    let cy = named("name", "Cy");
    people
        .set_content(KvoArray::from_values(vec![named("name", "Ann"), named("name", "Bea"), cy.clone()]))
        .unwrap();
    assert_eq!(shown(), Value::from("No selection"));

    people.set_selection_indexes(&[0, 1]).unwrap();
    assert_eq!(shown(), Value::from("Multiple values"));

    people.set_selection_index(2).unwrap();
    assert_eq!(shown(), Value::from("Cy"));

    cy.as_object().unwrap().set_value_for_key(Value::from("Cyd"), "name").unwrap();
    assert_eq!(shown(), Value::from("Cyd"));

    let binding = label.binding("value").unwrap();
    assert!(binding.mutable());
    binding.set_value(Value::from("Cyrus")).unwrap();
    assert_eq!(cy.value_for_key_path("name").unwrap().into_value(), Value::from("Cyrus"));
}

#[test]
fn a_bound_list_arranges_and_edits_the_model() {
    let models = DataModel::new();
    let books = KvoArray::from_values(vec![named("title", "Dune"), named("title", "Emma")]);
    models
        .register_model_with_name(KvoObject::new().with("books", books.clone()), "library")
        .unwrap();

    let shelf = ArrayController::new(settings(&models).avoids_empty_selection(true)).unwrap();
    shelf.register_with_name("shelf").unwrap();
    shelf.bindable().setup_bindings([("contentBinding", "library.books")]).unwrap();
    shelf.bindable().update_bindings();
    assert!(shelf.content().ptr_eq(&books));
    assert!(shelf.editable());
    assert_eq!(listed(&shelf.arranged_objects(), "title"), "Dune,Emma");
    assert_eq!(shelf.selection_indexes(), [0]);

    shelf.set_sort_descriptors(vec![SortDescriptor::new("title", false)]).unwrap();
    assert_eq!(listed(&shelf.arranged_objects(), "title"), "Emma,Dune");
    assert_eq!(shelf.selection_indexes(), [1]);

    let button = Bindable::builder()
        .expose("enabled")
        .data_model(models.clone())
        .registry(TransformerRegistry::with_builtins())
        .build();
    button.setup_bindings([("enabledBinding", "shelf.canRemove")]).unwrap();
    button.update_bindings();
    let enabled = || button.object().value_for_key("enabled").unwrap();
    assert_eq!(enabled(), Value::from(true));

    books.add_object(named("title", "Ajax"));
    assert_eq!(listed(&shelf.arranged_objects(), "title"), "Emma,Dune,Ajax");
    assert_eq!(listed(&KvoArray::from_values(shelf.selected_objects()), "title"), "Dune");

    shelf.remove().unwrap();
    assert_eq!(listed(&books, "title"), "Emma,Ajax");
    assert_eq!(listed(&shelf.arranged_objects(), "title"), "Emma,Ajax");
    assert_eq!(shelf.selection_indexes(), [0]);

    shelf.set_editable(false).unwrap();
    assert_eq!(enabled(), Value::from(false));
}
