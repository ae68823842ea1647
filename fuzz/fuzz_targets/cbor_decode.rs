#![no_main]

use ctap_core::cbor;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok((value, _)) = cbor::decode(data) {
        // whatever decodes must re-encode
        cbor::encode(&value).unwrap();
    }
});
