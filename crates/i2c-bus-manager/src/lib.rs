#![no_std]
//! Portable I2C controller-bus manager.
//!
//! Multiplexes a fixed number of hardware I2C blocks behind stable integer
//! handles, safe to use concurrently from multiple tasks. The manager owns
//! a slot table guarded by a single mutex; every state-mutating or
//! hardware-touching operation serializes through it. Buses can either be
//! opened (configured and torn down by the manager) or adopted
//! (pre-configured by an external owner, never reconfigured here).
//!
//! The platform's hardware driver is abstracted behind [`I2cDriver`];
//! transfers are framed as portable command sequences ([`Op`]) covering
//! both 7-bit and 10-bit addressing.

mod driver;
mod error;
mod manager;
pub mod protocol;
mod timeout;

pub use driver::{BusConfig, I2cDriver};
pub use error::Error;
pub use manager::{I2cManager, Profile};
pub use protocol::{Op, OpSeq};
pub use timeout::TimeoutCodec;
