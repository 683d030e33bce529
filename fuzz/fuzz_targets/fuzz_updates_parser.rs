//! Fuzz target: `telegram::api::parse_updates`
//!
//! The `getUpdates` body comes off the network.  Garbage must yield an
//! error, never a panic, and a message from a foreign chat must never
//! carry text.
//!
//! cargo fuzz run fuzz_updates_parser

#![no_main]

use camwatch::telegram::api::parse_updates;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = parse_updates(data, "-100555");
    if let Ok(Some(msg)) = parse_updates(data, "") {
        assert!(msg.text.is_none(), "empty chat id must never match");
    }
});
