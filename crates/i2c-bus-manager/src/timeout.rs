/// Conversion between a portable millisecond timeout and the device's
/// timeout register encoding.
///
/// The encoding differs per target family: some clock the register linearly
/// in source-clock ticks, others store an exponent so the actual timeout is
/// a power of two times the source clock period. The codec is chosen once,
/// when the manager is constructed for a given target profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeoutCodec {
    /// The register counts source-clock ticks directly.
    Linear { ticks_per_ms: i32 },
    /// The register holds an exponent `x`; the actual timeout is
    /// `2^x * clock_period_ns`. `register_max` is exclusive.
    PowerOfTwo {
        clock_period_ns: i32,
        register_max: u32,
    },
}

impl TimeoutCodec {
    /// 80 MHz APB source, register in clock ticks (classic ESP32 style).
    pub const fn apb_80mhz() -> Self {
        Self::Linear { ticks_per_ms: 80_000 }
    }

    /// 40 MHz crystal source, exponent register (ESP32-x3 style). The
    /// largest representable timeout is `2^21 * 25 ns`, about 52 ms.
    pub const fn xtal_40mhz() -> Self {
        Self::PowerOfTwo { clock_period_ns: 25, register_max: 22 }
    }

    /// 17.5 MHz RC source used when the light-sleep clock drives the bus.
    pub const fn rtc_17mhz() -> Self {
        Self::PowerOfTwo { clock_period_ns: 57, register_max: 22 }
    }

    /// Encode `timeout_ms` into device units, or `None` if the register
    /// cannot represent it.
    ///
    /// For the power-of-two encoding this picks the smallest exponent whose
    /// actual timeout is at least `timeout_ms`, so the device never times
    /// out earlier than requested.
    pub fn to_device_units(&self, timeout_ms: i32) -> Option<i32> {
        match *self {
            Self::Linear { ticks_per_ms } => timeout_ms.checked_mul(ticks_per_ms),
            Self::PowerOfTwo { clock_period_ns, register_max } => (0..register_max as i32)
                .find(|&x| Self::power_of_two_ms(x, clock_period_ns) >= timeout_ms as i64),
        }
    }

    /// Decode a device-unit value back into milliseconds.
    ///
    /// For the power-of-two encoding this is the timeout the device will
    /// actually apply, which may exceed what was originally requested;
    /// a second round trip through [`to_device_units`](Self::to_device_units)
    /// reproduces the same code.
    pub fn from_device_units(&self, code: i32) -> i32 {
        match *self {
            Self::Linear { ticks_per_ms } => code / ticks_per_ms,
            Self::PowerOfTwo { clock_period_ns, .. } => {
                Self::power_of_two_ms(code, clock_period_ns) as i32
            }
        }
    }

    fn power_of_two_ms(code: i32, clock_period_ns: i32) -> i64 {
        (1i64 << code) * clock_period_ns as i64 / 1_000_000
    }
}
