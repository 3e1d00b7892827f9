//! Relay frames are untrusted: decoding must never panic, and anything that
//! decodes must survive a re-encode unchanged.

#![no_main]

use libfuzzer_sys::fuzz_target;
use saferchat_proto::RelayEvent;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(event) = RelayEvent::decode(text) else {
        return;
    };

    let encoded = event.encode().expect("decoded event must encode");
    let again = RelayEvent::decode(&encoded).expect("encoded event must decode");
    assert_eq!(event, again);
});
