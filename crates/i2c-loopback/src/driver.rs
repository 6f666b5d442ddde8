use heapless::Vec;
use i2c_bus_manager::{BusConfig, I2cDriver, Op};

use crate::device::RegisterDevice;

/// Emulated devices per bus.
const MAX_DEVICES: usize = 4;

/// Failures the loopback driver can report.
///
/// The manager collapses all of these to `Platform`; the distinction only
/// matters when driving the loopback directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoopbackError {
    InvalidBus,
    /// `install` or a timeout primitive was called before `configure`.
    NotConfigured,
    AlreadyInstalled,
    /// `transfer` or `uninstall` was called without an installed driver.
    NotInstalled,
    /// No emulated device acknowledged the address.
    AddressNack,
    /// Malformed command sequence (data before an address phase, a 10-bit
    /// read header without a preceding write phase, ...).
    Protocol,
    /// The bus's device table is full.
    TableFull,
}

/// Counts of primitive invocations, for test assertions such as "the
/// driver was never touched".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CallCounts {
    pub configure: usize,
    pub install: usize,
    pub uninstall: usize,
    pub set_timeout_code: usize,
    pub timeout_code: usize,
    pub transfer: usize,
}

struct Bus {
    config: Option<BusConfig>,
    installed: bool,
    timeout_code: i32,
    devices: Vec<(u16, RegisterDevice), MAX_DEVICES>,
}

impl Bus {
    const fn new() -> Self {
        Self {
            config: None,
            installed: false,
            timeout_code: 0,
            devices: Vec::new(),
        }
    }
}

/// Where the transfer state machine is within a transaction.
#[derive(Clone, Copy)]
enum Phase {
    Idle,
    AwaitAddress,
    /// Saw a 10-bit write header; the low address byte comes next.
    PendingLow(u16),
    Writing(usize),
    Reading(usize),
}

/// In-memory [`I2cDriver`] backed by emulated register devices.
pub struct LoopbackDriver<const N: usize = 2> {
    buses: [Bus; N],
    counts: CallCounts,
}

impl<const N: usize> LoopbackDriver<N> {
    pub fn new() -> Self {
        Self {
            buses: core::array::from_fn(|_| Bus::new()),
            counts: CallCounts::default(),
        }
    }

    /// Attach an emulated device to a bus.
    pub fn add_device(
        &mut self,
        bus: usize,
        address: u16,
        device: RegisterDevice,
    ) -> Result<(), LoopbackError> {
        let bus = self.buses.get_mut(bus).ok_or(LoopbackError::InvalidBus)?;
        bus.devices
            .push((address, device))
            .map_err(|_| LoopbackError::TableFull)
    }

    pub fn device(&self, bus: usize, address: u16) -> Option<&RegisterDevice> {
        self.buses
            .get(bus)?
            .devices
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, device)| device)
    }

    pub fn device_mut(&mut self, bus: usize, address: u16) -> Option<&mut RegisterDevice> {
        self.buses
            .get_mut(bus)?
            .devices
            .iter_mut()
            .find(|(a, _)| *a == address)
            .map(|(_, device)| device)
    }

    pub fn counts(&self) -> CallCounts {
        self.counts
    }

    pub fn is_installed(&self, bus: usize) -> bool {
        self.buses.get(bus).is_some_and(|b| b.installed)
    }

    pub fn config(&self, bus: usize) -> Option<&BusConfig> {
        self.buses.get(bus)?.config.as_ref()
    }

    fn find(devices: &Vec<(u16, RegisterDevice), MAX_DEVICES>, address: u16) -> Option<usize> {
        devices.iter().position(|(a, _)| *a == address)
    }
}

impl<const N: usize> Default for LoopbackDriver<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> I2cDriver for LoopbackDriver<N> {
    type Error = LoopbackError;

    fn configure(&mut self, bus: usize, config: &BusConfig) -> Result<(), LoopbackError> {
        self.counts.configure += 1;
        let bus = self.buses.get_mut(bus).ok_or(LoopbackError::InvalidBus)?;
        bus.config = Some(*config);
        Ok(())
    }

    fn install(&mut self, bus: usize) -> Result<(), LoopbackError> {
        self.counts.install += 1;
        let bus = self.buses.get_mut(bus).ok_or(LoopbackError::InvalidBus)?;
        if bus.config.is_none() {
            return Err(LoopbackError::NotConfigured);
        }
        if bus.installed {
            return Err(LoopbackError::AlreadyInstalled);
        }
        bus.installed = true;
        Ok(())
    }

    fn uninstall(&mut self, bus: usize) -> Result<(), LoopbackError> {
        self.counts.uninstall += 1;
        let bus = self.buses.get_mut(bus).ok_or(LoopbackError::InvalidBus)?;
        if !bus.installed {
            return Err(LoopbackError::NotInstalled);
        }
        bus.installed = false;
        Ok(())
    }

    fn set_timeout_code(&mut self, bus: usize, code: i32) -> Result<(), LoopbackError> {
        self.counts.set_timeout_code += 1;
        let bus = self.buses.get_mut(bus).ok_or(LoopbackError::InvalidBus)?;
        if bus.config.is_none() {
            return Err(LoopbackError::NotConfigured);
        }
        bus.timeout_code = code;
        Ok(())
    }

    fn timeout_code(&mut self, bus: usize) -> Result<i32, LoopbackError> {
        self.counts.timeout_code += 1;
        let bus = self.buses.get(bus).ok_or(LoopbackError::InvalidBus)?;
        if bus.config.is_none() {
            return Err(LoopbackError::NotConfigured);
        }
        Ok(bus.timeout_code)
    }

    fn transfer(&mut self, bus: usize, ops: &mut [Op<'_>]) -> Result<(), LoopbackError> {
        self.counts.transfer += 1;
        let bus = self.buses.get_mut(bus).ok_or(LoopbackError::InvalidBus)?;
        if !bus.installed {
            return Err(LoopbackError::NotInstalled);
        }

        let mut phase = Phase::Idle;
        // A 10-bit read header only carries the two high address bits; the
        // full target comes from the preceding write phase.
        let mut last_ten_bit: Option<u16> = None;

        for op in ops.iter_mut() {
            match op {
                Op::Start => phase = Phase::AwaitAddress,
                Op::WriteByte(byte) => {
                    let byte = *byte;
                    match phase {
                        Phase::AwaitAddress => {
                            if byte & 0xF8 == 0xF0 {
                                let high = (((byte >> 1) & 0x03) as u16) << 8;
                                if byte & 1 == 0 {
                                    phase = Phase::PendingLow(high);
                                } else {
                                    let address = last_ten_bit
                                        .filter(|a| a & 0x0300 == high)
                                        .ok_or(LoopbackError::Protocol)?;
                                    let index = Self::find(&bus.devices, address)
                                        .ok_or(LoopbackError::AddressNack)?;
                                    phase = Phase::Reading(index);
                                }
                            } else {
                                let address = (byte >> 1) as u16;
                                let index = Self::find(&bus.devices, address)
                                    .ok_or(LoopbackError::AddressNack)?;
                                if byte & 1 == 0 {
                                    bus.devices[index].1.begin_write();
                                    phase = Phase::Writing(index);
                                } else {
                                    phase = Phase::Reading(index);
                                }
                            }
                        }
                        Phase::PendingLow(high) => {
                            let address = high | byte as u16;
                            let index = Self::find(&bus.devices, address)
                                .ok_or(LoopbackError::AddressNack)?;
                            bus.devices[index].1.begin_write();
                            last_ten_bit = Some(address);
                            phase = Phase::Writing(index);
                        }
                        Phase::Writing(index) => bus.devices[index].1.write_byte(byte),
                        _ => return Err(LoopbackError::Protocol),
                    }
                }
                Op::Write(data) => match phase {
                    Phase::Writing(index) => {
                        for &byte in data.iter() {
                            bus.devices[index].1.write_byte(byte);
                        }
                    }
                    _ => return Err(LoopbackError::Protocol),
                },
                Op::Read(buffer) | Op::ReadLast(buffer) => match phase {
                    Phase::Reading(index) => {
                        for byte in buffer.iter_mut() {
                            *byte = bus.devices[index].1.read_byte();
                        }
                    }
                    _ => return Err(LoopbackError::Protocol),
                },
                Op::Stop => phase = Phase::Idle,
            }
        }
        Ok(())
    }
}
