#![no_main]
use libfuzzer_sys::fuzz_target;
use pulse_core::persist::{TurnRecord, decode, decode_sample_log};
use pulse_core::{DeviceId, SessionState};
use std::collections::{BTreeMap, BTreeSet};

// Every persisted record type must decode damaged bytes to `None`, and the
// sample log must skip damaged lines, never panic.
fuzz_target!(|data: &[u8]| {
    let (entries, skipped) = decode_sample_log(data);
    assert!(entries.len() + skipped <= data.len());
    let _ = decode::<TurnRecord>(data);
    let _ = decode::<SessionState>(data);
    let _ = decode::<BTreeMap<DeviceId, f64>>(data);
    let _ = decode::<BTreeSet<DeviceId>>(data);
});
