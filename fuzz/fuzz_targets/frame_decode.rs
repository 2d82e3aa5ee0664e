//! Fuzz target for Frame::decode
//!
//! Decodes arbitrary byte sequences looking for:
//! - Parser crashes or panics
//! - Integer overflows in size calculations
//! - Buffer over-reads
//!
//! Invalid input must return an error, never panic. Anything that does
//! decode must encode back to the exact bytes it came from.

#![no_main]

use libfuzzer_sys::fuzz_target;
use relay_proto::Frame;

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    let encoded = frame.to_bytes();
    assert_eq!(&encoded[..], &data[..frame.encoded_len()], "re-encoding changed the frame");
});
