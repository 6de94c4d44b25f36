//! Fuzz target: `DeviceConfig::from_record_bytes`
//!
//! Whatever is found in flash, a decoded config must validate and survive
//! a store/load cycle unchanged.
//!
//! cargo fuzz run fuzz_config_record

#![no_main]

use duorelay::config::DeviceConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok((cfg, _fallbacks)) = DeviceConfig::from_record_bytes(data) else {
        return;
    };
    assert!(cfg.validate().is_ok(), "decoded config failed validation");

    let bytes = cfg.to_record_bytes().expect("encode");
    let (again, fallbacks) = DeviceConfig::from_record_bytes(&bytes).expect("decode");
    assert_eq!(fallbacks, 0);
    assert_eq!(again, cfg);
});
