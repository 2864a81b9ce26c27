// cargo fuzz run decode corpus/decode -- -timeout=30

#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use flipbook::Decoder;

fuzz_target!(|data: &[u8]| {
    for step in Decoder::new(Cursor::new(data)) {
        if step.is_err() {
            return;
        }
    }
});
