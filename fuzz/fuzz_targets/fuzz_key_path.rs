#![no_main]

use kvo_core::{KeyValueCoding, KvoArray, KvoObject, Value};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(key_path) = std::str::from_utf8(data) else {
        return;
    };
    if key_path.len() > 512 {
        return;
    }
    let lines = KvoArray::from_values(vec![
        KvoObject::new().with("price", 3).with("sku", "a").into(),
        KvoObject::new().with("price", 5).with("sku", "b").into(),
    ]);
    let order = KvoObject::new()
        .with("lines", lines)
        .with("customer", KvoObject::new().with("name", "Ann"));

    let _ = order.value_for_key_path(key_path);
    let _ = order.validate_value_for_key_path(Value::from(1), key_path);
    let _ = order.set_value_for_key_path(Value::from("x"), key_path);
});
