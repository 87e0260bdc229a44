#![no_main]

use std::cell::Cell;
use std::rc::Rc;

use arbitrary::Arbitrary;
use kvo_core::{ChangeKind, KeyValueCoding, KvoArray, KvoObject, ObserverId, Value};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    Add(i8),
    Insert { value: i8, index: u8 },
    InsertMany { values: Vec<i8>, indexes: Vec<u8> },
    Replace { value: i8, index: u8 },
    RemoveAt(u8),
    RemoveMany(Vec<u8>),
    RemoveObject(i8),
    EditElement { index: u8, value: i8 },
    Clear,
}

fuzz_target!(|ops: Vec<Op>| {
    let items = KvoArray::new();
    let owner = KvoObject::new().with("items", items.clone());

    // Net length change reported by insertion and deletion records.
    let tracked = Rc::new(Cell::new(0i64));
    let sink = Rc::clone(&tracked);
    owner
        .add_observer_for_key_path(
            ObserverId::new(),
            move |change, _, _| {
                let count = |value: &Value| value.as_array().map_or(0, |a| a.len() as i64);
                match change.kind() {
                    ChangeKind::Insertion => sink.set(sink.get() + count(change.new_value())),
                    ChangeKind::Deletion => sink.set(sink.get() - count(change.old_value())),
                    ChangeKind::Setting | ChangeKind::Replacement => {}
                }
                Ok(())
            },
            "items",
            Value::Null,
        )
        .expect("observe");

    for op in ops.into_iter().take(256) {
        let len = items.len();
        match op {
            Op::Add(value) => items.add_object(element(value)),
            Op::Insert { value, index } => {
                let _ = items.insert_object_at_index(element(value), usize::from(index));
            }
            Op::InsertMany { values, indexes } => {
                let values: Vec<Value> = values.into_iter().take(16).map(element).collect();
                let indexes: Vec<usize> = indexes.into_iter().take(16).map(usize::from).collect();
                let _ = items.insert_objects_at_indexes(values, &indexes);
            }
            Op::Replace { value, index } => {
                let _ = items.replace_object_at_index(element(value), usize::from(index));
            }
            Op::RemoveAt(index) => {
                let _ = items.remove_object_at_index(usize::from(index));
            }
            Op::RemoveMany(indexes) => {
                let indexes: Vec<usize> = indexes.into_iter().take(16).map(usize::from).collect();
                let _ = items.remove_objects_at_indexes(&indexes);
            }
            Op::RemoveObject(value) => {
                if let Some(found) = items.to_vec().into_iter().find(|v| v.to_string() == value.to_string()) {
                    items.remove_object(&found);
                }
            }
            Op::EditElement { index, value } => {
                if len > 0 {
                    if let Some(Value::Object(object)) = items.get(usize::from(index) % len) {
                        let _ = object.set_value_for_key(Value::from(i32::from(value)), "n");
                    }
                }
            }
            Op::Clear => items.remove_all_objects(),
        }
        assert_eq!(tracked.get(), items.len() as i64);
    }
});

fn element(value: i8) -> Value {
    if value % 3 == 0 {
        KvoObject::new().with("n", i32::from(value)).into()
    } else {
        Value::from(i32::from(value))
    }
}
