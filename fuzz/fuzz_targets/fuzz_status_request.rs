//! Fuzz target: `status_server::Request::parse`
//!
//! cargo fuzz run fuzz_status_request

#![no_main]

use camwatch::adapters::status_server::{MAX_REQUEST, Request};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = Request::parse(data) {
        assert!(req.body.len() <= MAX_REQUEST);
        assert!(!req.path.contains('?'));
    }
});
