#![no_main]

use libfuzzer_sys::fuzz_target;
use openwebnet::protocol::handshake::{calc_open_pass, digits_to_hex, hex_to_digits};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    // Nonces and digests from a gateway must never panic the client
    let _ = calc_open_pass("12345", text);
    if let Ok(hex) = digits_to_hex(text) {
        let _ = hex_to_digits(&hex);
    }
});
