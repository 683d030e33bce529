//! Fuzz target: `Command::parse`
//!
//! Chat text is attacker-controlled.  Any byte string, decoded lossily the
//! way the Bot API hands us text, must parse without panicking, and only
//! blank input may produce no command.
//!
//! cargo fuzz run fuzz_command_parser

#![no_main]

use camwatch::app::commands::Command;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    let parsed = Command::parse(&text);
    assert_eq!(parsed.is_none(), text.split_whitespace().next().is_none());
    if let Some(cmd) = parsed {
        assert!(!cmd.name().is_empty());
    }
});
