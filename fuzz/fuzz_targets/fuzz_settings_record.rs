//! Fuzz target: `SettingsRecord::decode`
//!
//! Feeds arbitrary flash contents to the settings decoder.  Whatever
//! decodes must convert to in-range settings and re-encode into the
//! fixed slot.
//!
//! cargo fuzz run fuzz_settings_record

#![no_main]

use camwatch::config::{FirmwareConfig, INTERVAL_MAX, INTERVAL_MIN, THRESHOLD_MAX, THRESHOLD_MIN};
use camwatch::storage::SettingsRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some(rec) = SettingsRecord::decode(data) else {
        return;
    };
    let cfg = FirmwareConfig::default();
    let settings = rec.into_settings(&cfg);
    assert!((INTERVAL_MIN..=INTERVAL_MAX).contains(&settings.interval_minutes));
    assert!((THRESHOLD_MIN..=THRESHOLD_MAX).contains(&settings.motion_threshold));

    let slot = SettingsRecord::from_settings(&settings)
        .encode()
        .expect("valid settings must fit the slot");
    assert_eq!(SettingsRecord::decode(&slot).map(|r| r.into_settings(&cfg)), Some(settings));
});
