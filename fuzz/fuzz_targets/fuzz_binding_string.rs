#![no_main]

use kvo_bind::parse_binding_string;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(info) = parse_binding_string(input) {
        assert!(!info.key_path.is_empty());
        assert!(!info.key_path.contains(['(', ')']));
        if let Some(name) = &info.transformer {
            assert!(!name.is_empty());
            assert!(!name.contains(['(', ')']));
        }
    }
});
