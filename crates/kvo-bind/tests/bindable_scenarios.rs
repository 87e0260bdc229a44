#![forbid(unsafe_code)]

//! End-to-end binding scenarios through `Bindable` and `DataModel`.

use kvo_bind::{Bindable, DataModel, Placeholder, TransformerRegistry, Truncated};
use kvo_core::{
    KeyValueCoding, KvoArray, KvoObject, MarkerType, Node, Value, collapse_selection,
};

fn registry() -> TransformerRegistry {
    let registry = TransformerRegistry::with_builtins();
    registry.register(Truncated::new(12), "short");
    registry
}

#[test]
fn binding_to_a_missing_model_shows_the_placeholder() {
    let models = DataModel::new();
    let label = Bindable::builder()
        .expose("value")
        .default_placeholder("value", MarkerType::NullValue, "No user")
        .data_model(models.clone())
        .registry(registry())
        .build();
    label.bind_name_to_key_path("value", "user.email", None).unwrap();

    let binding = label.binding("value").unwrap();
    assert_eq!(binding.value(), Value::from("No user"));
    assert_eq!(binding.marker_type(), Some(MarkerType::NullValue));

    let user = KvoObject::new().with("email", "ann@example.com");
    models.register_model_with_name(user, "user").unwrap();
    assert_eq!(label.object().value_for_key("value").unwrap(), Value::from("ann@example.com"));

    models.unregister_model_with_name("user").unwrap();
    assert_eq!(label.object().value_for_key("value").unwrap(), Value::from("No user"));
}

#[test]
fn selection_summaries_flow_through_placeholders() {
    let models = DataModel::new();
    let selection = KvoObject::new().with("title", collapse_selection(&[]));
    models.register_model_with_name(selection.clone(), "selection").unwrap();

    let inspector = Bindable::builder()
        .expose("title")
        .default_placeholder("title", MarkerType::NoSelection, "Nothing selected")
        .default_placeholder(
            "title",
            MarkerType::MultipleValues,
            Placeholder::computed(|_| Value::from("Several titles")),
        )
        .data_model(models)
        .registry(registry())
        .build();
    inspector.setup_bindings([("titleBinding", "selection.title")]).unwrap();
    inspector.update_bindings();
    let title = || inspector.object().value_for_key("title").unwrap();
    assert_eq!(title(), Value::from("Nothing selected"));

    let picked = [Value::from("Intro"), Value::from("Outro")];
    selection.set_value_for_key(collapse_selection(&picked), "title").unwrap();
    assert_eq!(title(), Value::from("Several titles"));

    selection.set_value_for_key(collapse_selection(&picked[..1]), "title").unwrap();
    assert_eq!(title(), Value::from("Intro"));
}

#[test]
fn rows_bind_relative_to_their_item() {
    let models = DataModel::new();
    let items = KvoArray::from_values(vec![
        KvoObject::new().with("name", "Quarterly report for the board").into(),
        KvoObject::new().with("name", "Memo").into(),
    ]);
    let rows: Vec<Bindable> = items
        .to_vec()
        .into_iter()
        .map(|item| {
            let node = item.as_node().expect("array holds objects");
            let row = Bindable::builder()
                .expose("text")
                .relative_source(node)
                .data_model(models.clone())
                .registry(registry())
                .build();
            row.setup_bindings([("textBinding", "*.name(short)")]).unwrap();
            row.update_bindings();
            row
        })
        .collect();

    let text = |row: &Bindable| row.object().value_for_key("text").unwrap();
    assert_eq!(text(&rows[0]), Value::from("Quar \u{2026} oard"));
    assert_eq!(text(&rows[1]), Value::from("Memo"));

    let memo: Node = items.get(1).and_then(|item| item.as_node()).expect("second row");
    memo.set_value_for_key(Value::from("Memo v2"), "name").unwrap();
    assert_eq!(text(&rows[1]), Value::from("Memo v2"));
}

#[test]
fn two_way_edits_reach_the_model() {
    let models = DataModel::new();
    let settings = KvoObject::new().with("muted", false).with("volume", 7);
    models.register_model_with_name(settings.clone(), "settings").unwrap();

    let panel = Bindable::builder()
        .expose("soundOn")
        .expose("volume")
        .data_model(models)
        .registry(registry())
        .build();
    panel
        .setup_bindings([("soundOnBinding", "settings.muted(not)"), ("volumeBinding", "settings.volume")])
        .unwrap();
    panel.update_bindings();
    assert_eq!(panel.object().value_for_key("soundOn").unwrap(), Value::from(true));

    let sound_on = panel.binding("soundOn").unwrap();
    assert!(sound_on.mutable());
    sound_on.set_value(Value::from(false)).unwrap();
    assert_eq!(settings.value_for_key("muted").unwrap(), Value::from(true));

    panel.binding("volume").unwrap().set_value(Value::from(3)).unwrap();
    assert_eq!(settings.value_for_key("volume").unwrap(), Value::from(3));

    panel.unbind();
    settings.set_value_for_key(Value::from(9), "volume").unwrap();
    assert_eq!(panel.object().value_for_key("volume").unwrap(), Value::from(7));
}
