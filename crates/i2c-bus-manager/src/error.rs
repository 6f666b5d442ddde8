/// Errors that can occur during bus manager operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The manager has not been initialised, or has been deinitialised.
    NotInitialised,
    /// Out-of-range handle, slot already in use, bad pins, non-controller
    /// mode, or a non-positive clock/timeout value.
    InvalidParameter,
    /// The operation is not available: configuration of an adopted bus, or
    /// bus recovery on a platform where recovery is implicit.
    NotSupported,
    /// The underlying hardware driver reported a failure, or the requested
    /// timeout cannot be represented in device units.
    Platform,
}
