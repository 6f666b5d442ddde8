use crate::protocol::Op;

/// Controller-mode configuration handed to [`I2cDriver::configure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusConfig {
    pub sda_pin: i32,
    pub scl_pin: i32,
    pub clock_hz: i32,
    /// Enable internal pull-ups on both lines.
    pub pullups: bool,
    /// Platform clock-source selection flag, forwarded untouched.
    pub clock_source: u32,
}

/// Blocking primitives of the platform's hardware I2C driver.
///
/// Implementors define how a hardware block is configured, activated and
/// driven. All methods are synchronous; `transfer` blocks until the
/// hardware completes the sequence or fails. The manager collapses any
/// `Err` to [`Error::Platform`](crate::Error::Platform), so the error type
/// only needs to be debuggable, not portable.
pub trait I2cDriver {
    type Error: core::fmt::Debug;

    /// Apply controller-mode configuration to a hardware block.
    fn configure(&mut self, bus: usize, config: &BusConfig) -> Result<(), Self::Error>;

    /// Install (activate) the driver for a configured hardware block.
    fn install(&mut self, bus: usize) -> Result<(), Self::Error>;

    /// Remove the driver from a hardware block.
    fn uninstall(&mut self, bus: usize) -> Result<(), Self::Error>;

    /// Write the device timeout register, in device units (see
    /// [`TimeoutCodec`](crate::TimeoutCodec)).
    fn set_timeout_code(&mut self, bus: usize, code: i32) -> Result<(), Self::Error>;

    /// Read back the device timeout register.
    fn timeout_code(&mut self, bus: usize) -> Result<i32, Self::Error>;

    /// Submit a command sequence and block until it completes.
    ///
    /// The sequence is all-or-nothing from the caller's point of view;
    /// partial progress must not be reported.
    fn transfer(&mut self, bus: usize, ops: &mut [Op<'_>]) -> Result<(), Self::Error>;
}
