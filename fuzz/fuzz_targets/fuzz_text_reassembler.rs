//! Fuzz target: `TextReassembler::push`
//!
//! Splits arbitrary bytes into chunks at positions taken from the input
//! itself and feeds them to the text-channel accumulator.  It must never
//! panic, never buffer more than its capacity and never yield a message
//! containing the closing delimiter.
//!
//! cargo fuzz run fuzz_text_reassembler

#![no_main]

use libfuzzer_sys::fuzz_target;
use steptosign::link::{MAX_TEXT_FRAME, TextReassembler};

fuzz_target!(|data: &[u8]| {
    let Some((&step, body)) = data.split_first() else {
        return;
    };
    let step = usize::from(step).max(1);

    let mut r = TextReassembler::new();
    for chunk in body.chunks(step) {
        if let Ok(messages) = r.push(chunk) {
            for m in messages {
                assert!(!m.contains('>'), "message kept its closing delimiter");
            }
        }
        assert!(r.pending() <= MAX_TEXT_FRAME);
    }

    r.reset();
    assert_eq!(r.pending(), 0);
});
