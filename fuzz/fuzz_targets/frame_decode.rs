//! Fuzz target for inbound frame decoding
//!
//! Arbitrary text is decoded both as a wire frame and through the
//! dispatcher. Neither may panic; malformed input must come back as an
//! error. Anything that decodes must survive a re-encode.

#![no_main]

use libfuzzer_sys::fuzz_target;
use parley_client::dispatcher;
use parley_proto::InboundFrame;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(frame) = InboundFrame::decode(raw) {
        let encoded = frame.encode().expect("decoded frame re-encodes");
        assert_eq!(InboundFrame::decode(&encoded).ok(), Some(frame));
    }
    let _ = dispatcher::decode(raw);
});
