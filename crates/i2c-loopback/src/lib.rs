#![no_std]
//! Software loopback driver for the I2C bus manager.
//!
//! Implements [`I2cDriver`](i2c_bus_manager::I2cDriver) entirely in memory:
//! each bus carries a small table of emulated register-addressed
//! peripherals that respond to the manager's command sequences, including
//! 10-bit addressing with its repeated-start read. Useful for host-side
//! integration tests and for developing device code before hardware is
//! available.

mod device;
mod driver;

pub use device::RegisterDevice;
pub use driver::{CallCounts, LoopbackDriver, LoopbackError};
