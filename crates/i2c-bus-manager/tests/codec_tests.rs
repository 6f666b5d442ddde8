use i2c_bus_manager::TimeoutCodec;

#[test]
fn linear_is_exact() {
    let codec = TimeoutCodec::apb_80mhz();
    assert_eq!(codec.to_device_units(10), Some(800_000));
    assert_eq!(codec.from_device_units(800_000), 10);
}

#[test]
fn linear_round_trip_truncates() {
    let codec = TimeoutCodec::Linear { ticks_per_ms: 80_000 };
    // A code that is not a whole number of milliseconds truncates down.
    assert_eq!(codec.from_device_units(800_001), 10);
}

#[test]
fn power_of_two_picks_smallest_sufficient_exponent() {
    let codec = TimeoutCodec::xtal_40mhz();
    // 2^19 * 25 ns = 13.1 ms is the first value >= 10 ms.
    assert_eq!(codec.to_device_units(10), Some(19));
    assert_eq!(codec.from_device_units(19), 13);
}

#[test]
fn power_of_two_never_under_promises() {
    let codec = TimeoutCodec::xtal_40mhz();
    for ms in 1..=52 {
        let code = codec.to_device_units(ms).unwrap();
        assert!(
            codec.from_device_units(code) >= ms,
            "requested {ms} ms, device would apply {} ms",
            codec.from_device_units(code)
        );
    }
}

#[test]
fn power_of_two_is_monotonic() {
    let codec = TimeoutCodec::xtal_40mhz();
    let mut previous = 0;
    for ms in 1..=52 {
        let code = codec.to_device_units(ms).unwrap();
        assert!(code >= previous);
        previous = code;
    }
}

#[test]
fn power_of_two_round_trip_is_idempotent() {
    let codec = TimeoutCodec::xtal_40mhz();
    for ms in 1..=52 {
        let code = codec.to_device_units(ms).unwrap();
        let actual_ms = codec.from_device_units(code);
        assert_eq!(codec.to_device_units(actual_ms), Some(code));
    }
}

#[test]
fn power_of_two_rejects_unrepresentable() {
    // Exponent tops out at 21, so 2^21 * 25 ns = 52.4 ms is the ceiling.
    let codec = TimeoutCodec::xtal_40mhz();
    assert_eq!(codec.to_device_units(52), Some(21));
    assert_eq!(codec.to_device_units(53), None);
}

#[test]
fn rtc_source_has_longer_ceiling() {
    // 57 ns period: 2^21 * 57 ns = 119.5 ms.
    let codec = TimeoutCodec::rtc_17mhz();
    assert_eq!(codec.to_device_units(100), Some(21));
    assert_eq!(codec.to_device_units(120), None);
}
