#![no_main]

use libfuzzer_sys::fuzz_target;
use aspia_peer::message::Message;

fuzz_target!(|data: &[u8]| {
    // Fuzz message parsing - should never panic on any input
    let _ = Message::parse(data);
});
