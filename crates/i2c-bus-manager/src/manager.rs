use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use portable_atomic::{AtomicUsize, Ordering};

use crate::driver::{BusConfig, I2cDriver};
use crate::error::Error;
use crate::protocol;
use crate::timeout::TimeoutCodec;

/// Target-profile configuration, fixed when the manager is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Profile {
    /// How millisecond timeouts map to the device timeout register.
    pub timeout_codec: TimeoutCodec,
    /// Clock applied when a bus is opened; also recorded for adopted buses
    /// as bookkeeping (their real clock is not under our control).
    pub default_clock_hz: i32,
    /// Device timeout applied when a bus is opened.
    pub default_timeout_ms: i32,
    /// Platform clock-source flag, forwarded to the driver untouched.
    pub clock_source: u32,
    /// Enable internal pull-ups when configuring a bus.
    pub pullups: bool,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            timeout_codec: TimeoutCodec::xtal_40mhz(),
            default_clock_hz: 100_000,
            default_timeout_ms: 10,
            clock_source: 0,
            pullups: true,
        }
    }
}

/// Per-hardware-block state.
///
/// A slot is "in use" iff it is `Open` or `Adopted`. Adopted slots were
/// configured by an external owner before this manager took note of them:
/// no pins are recorded and the driver instance is never reconfigured or
/// uninstalled through this manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Free,
    Open {
        sda_pin: i32,
        scl_pin: i32,
        clock_hz: i32,
    },
    Adopted {
        #[allow(dead_code)]
        clock_hz: i32,
    },
}

impl Slot {
    fn in_use(&self) -> bool {
        !matches!(self, Slot::Free)
    }
}

enum Lifecycle<const N: usize> {
    Uninitialised,
    Initialised([Slot; N]),
}

struct State<D, const N: usize> {
    lifecycle: Lifecycle<N>,
    driver: D,
}

fn platform<T, E>(result: Result<T, E>) -> Result<T, Error> {
    result.map_err(|_| Error::Platform)
}

/// Manager for `N` logical I2C buses backed by `N` hardware blocks.
///
/// Handles returned by [`open`](Self::open) and [`adopt`](Self::adopt) are
/// exactly the hardware block index. A single mutex serializes every
/// state-mutating or driver-touching operation, including blocking
/// transfers; traffic on different hardware blocks is therefore also
/// serialized through one manager instance. The open-bus counter is the
/// only state readable without the lock.
///
/// `init`/`deinit` must be serialized against data-path calls by the
/// caller; they are not safe to race against a transfer already waiting on
/// the mutex.
pub struct I2cManager<M: RawMutex, D: I2cDriver, const N: usize = 2> {
    state: Mutex<M, State<D, N>>,
    open_count: AtomicUsize,
    profile: Profile,
}

impl<M: RawMutex, D: I2cDriver, const N: usize> I2cManager<M, D, N> {
    /// Create a new manager in the uninitialised state.
    pub const fn new(driver: D, profile: Profile) -> Self {
        Self {
            state: Mutex::new(State {
                lifecycle: Lifecycle::Uninitialised,
                driver,
            }),
            open_count: AtomicUsize::new(0),
            profile,
        }
    }

    /// The profile this manager was constructed with.
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Initialise the manager, resetting every slot to free.
    ///
    /// Idempotent: calling while already initialised is a no-op.
    pub async fn init(&self) {
        let mut guard = self.state.lock().await;
        if let Lifecycle::Uninitialised = guard.lifecycle {
            guard.lifecycle = Lifecycle::Initialised([Slot::Free; N]);
        }
    }

    /// Shut the manager down, closing every in-use slot first.
    ///
    /// Safe to call when never initialised (no-op).
    pub async fn deinit(&self) {
        let mut guard = self.state.lock().await;
        let State { lifecycle, driver } = &mut *guard;
        if let Lifecycle::Initialised(slots) = lifecycle {
            for index in 0..N {
                Self::close_slot(driver, slots, index, &self.open_count);
            }
            *lifecycle = Lifecycle::Uninitialised;
        }
    }

    /// Open a bus: configure the hardware block for controller mode with
    /// the profile's clock and default timeout, then install the driver.
    ///
    /// Returns the hardware block index as the handle. On any driver
    /// failure the slot is left free and `Platform` is returned.
    pub async fn open(
        &self,
        bus: usize,
        sda_pin: i32,
        scl_pin: i32,
        controller: bool,
    ) -> Result<usize, Error> {
        let mut guard = self.state.lock().await;
        let State { lifecycle, driver } = &mut *guard;
        let slots = Self::slots(lifecycle)?;
        if bus >= N || slots[bus].in_use() || !controller || sda_pin < 0 || scl_pin < 0 {
            return Err(Error::InvalidParameter);
        }

        let clock_hz = self.profile.default_clock_hz;
        let code = self
            .profile
            .timeout_codec
            .to_device_units(self.profile.default_timeout_ms)
            .ok_or(Error::Platform)?;
        platform(driver.configure(bus, &self.bus_config(sda_pin, scl_pin, clock_hz)))?;
        platform(driver.set_timeout_code(bus, code))?;
        platform(driver.install(bus))?;

        slots[bus] = Slot::Open { sda_pin, scl_pin, clock_hz };
        self.open_count.fetch_add(1, Ordering::Release);
        Ok(bus)
    }

    /// Take note of a bus that an external owner has already configured
    /// and installed. No driver calls are made; the slot is only recorded
    /// so that transfers can validate against it.
    ///
    /// Returns the hardware block index as the handle.
    pub async fn adopt(&self, bus: usize, controller: bool) -> Result<usize, Error> {
        let mut guard = self.state.lock().await;
        let State { lifecycle, .. } = &mut *guard;
        let slots = Self::slots(lifecycle)?;
        if bus >= N || slots[bus].in_use() || !controller {
            return Err(Error::InvalidParameter);
        }

        slots[bus] = Slot::Adopted { clock_hz: self.profile.default_clock_hz };
        self.open_count.fetch_add(1, Ordering::Release);
        Ok(bus)
    }

    /// Close a bus, uninstalling the driver unless the bus was adopted.
    ///
    /// An out-of-range handle, an already-free slot or an uninitialised
    /// manager are all silently ignored.
    pub async fn close(&self, handle: usize) {
        let mut guard = self.state.lock().await;
        let State { lifecycle, driver } = &mut *guard;
        if let Lifecycle::Initialised(slots) = lifecycle {
            if handle < N {
                Self::close_slot(driver, slots, handle, &self.open_count);
            }
        }
    }

    /// Close a bus and attempt to recover the lines.
    ///
    /// Adopted buses are not closed: their lifecycle is not ours, so
    /// `NotSupported` is returned with the slot untouched. Owned buses are
    /// closed exactly as [`close`](Self::close) and `NotSupported` is still
    /// returned, because on this platform recovery happens implicitly in
    /// driver install/uninstall and no separate action exists. The distinct
    /// code lets callers tell "nothing to do" from a real failure.
    pub async fn close_recover_bus(&self, handle: usize) -> Result<(), Error> {
        let mut guard = self.state.lock().await;
        let State { lifecycle, driver } = &mut *guard;
        let slots = Self::slots(lifecycle)?;
        if handle >= N || !slots[handle].in_use() {
            return Err(Error::InvalidParameter);
        }
        if let Slot::Open { .. } = slots[handle] {
            Self::close_slot(driver, slots, handle, &self.open_count);
        }
        Err(Error::NotSupported)
    }

    /// Change the bus clock.
    ///
    /// The only way to change the clock is a full teardown and
    /// reconfiguration of the hardware block, keeping the device timeout
    /// register unchanged across it. If reconfiguration fails the bus is
    /// left closed (slot free, count decremented) rather than
    /// half-configured, so the caller can retry `open` from a clean state.
    pub async fn set_clock(&self, handle: usize, clock_hz: i32) -> Result<(), Error> {
        let mut guard = self.state.lock().await;
        let State { lifecycle, driver } = &mut *guard;
        let slots = Self::slots(lifecycle)?;
        if handle >= N || clock_hz <= 0 {
            return Err(Error::InvalidParameter);
        }
        let (sda_pin, scl_pin) = match slots[handle] {
            Slot::Free => return Err(Error::InvalidParameter),
            Slot::Adopted { .. } => return Err(Error::NotSupported),
            Slot::Open { sda_pin, scl_pin, .. } => (sda_pin, scl_pin),
        };

        let code = platform(driver.timeout_code(handle))?;
        platform(driver.uninstall(handle))?;
        // Rollback point: from here the slot is free until reconfiguration
        // has completely succeeded.
        slots[handle] = Slot::Free;

        let config = self.bus_config(sda_pin, scl_pin, clock_hz);
        if Self::reconfigure(driver, handle, &config, code).is_err() {
            // The rollback is a close as far as accounting is concerned.
            self.open_count.fetch_sub(1, Ordering::Release);
            return Err(Error::Platform);
        }

        slots[handle] = Slot::Open { sda_pin, scl_pin, clock_hz };
        Ok(())
    }

    /// The clock the bus was configured with.
    pub async fn clock(&self, handle: usize) -> Result<i32, Error> {
        let mut guard = self.state.lock().await;
        let State { lifecycle, .. } = &mut *guard;
        let slots = Self::slots(lifecycle)?;
        if handle >= N {
            return Err(Error::InvalidParameter);
        }
        match slots[handle] {
            Slot::Free => Err(Error::InvalidParameter),
            Slot::Adopted { .. } => Err(Error::NotSupported),
            Slot::Open { clock_hz, .. } => Ok(clock_hz),
        }
    }

    /// Set the device timeout.
    ///
    /// `Platform` is returned both when the driver call fails and when the
    /// codec cannot represent `timeout_ms` at all.
    pub async fn set_timeout(&self, handle: usize, timeout_ms: i32) -> Result<(), Error> {
        let mut guard = self.state.lock().await;
        let State { lifecycle, driver } = &mut *guard;
        let slots = Self::slots(lifecycle)?;
        if handle >= N || timeout_ms <= 0 {
            return Err(Error::InvalidParameter);
        }
        match slots[handle] {
            Slot::Free => return Err(Error::InvalidParameter),
            Slot::Adopted { .. } => return Err(Error::NotSupported),
            Slot::Open { .. } => {}
        }

        let code = self
            .profile
            .timeout_codec
            .to_device_units(timeout_ms)
            .ok_or(Error::Platform)?;
        platform(driver.set_timeout_code(handle, code))
    }

    /// The device timeout in milliseconds, as the device will actually
    /// apply it (possibly longer than what was last requested).
    pub async fn timeout(&self, handle: usize) -> Result<i32, Error> {
        let mut guard = self.state.lock().await;
        let State { lifecycle, driver } = &mut *guard;
        let slots = Self::slots(lifecycle)?;
        if handle >= N {
            return Err(Error::InvalidParameter);
        }
        match slots[handle] {
            Slot::Free => return Err(Error::InvalidParameter),
            Slot::Adopted { .. } => return Err(Error::NotSupported),
            Slot::Open { .. } => {}
        }

        let code = platform(driver.timeout_code(handle))?;
        Ok(self.profile.timeout_codec.from_device_units(code))
    }

    /// Send `data` to `address` as one atomic transaction.
    ///
    /// Empty `data` probes the address: only the address phase is issued.
    /// `no_stop` suppresses the stop condition so a follow-up transfer can
    /// begin with a repeated start.
    pub async fn send(
        &self,
        handle: usize,
        address: u16,
        data: &[u8],
        no_stop: bool,
    ) -> Result<(), Error> {
        let mut guard = self.state.lock().await;
        let State { lifecycle, driver } = &mut *guard;
        Self::check_transfer_slot(lifecycle, handle)?;
        let mut ops = protocol::encode_send(address, data, no_stop);
        platform(driver.transfer(handle, &mut ops))
    }

    /// Receive `buffer.len()` bytes from `address`.
    ///
    /// Returns the number of bytes transferred, which on success always
    /// equals the request. An empty buffer probes the address and
    /// returns 0.
    pub async fn receive(
        &self,
        handle: usize,
        address: u16,
        buffer: &mut [u8],
    ) -> Result<usize, Error> {
        let mut guard = self.state.lock().await;
        let State { lifecycle, driver } = &mut *guard;
        Self::check_transfer_slot(lifecycle, handle)?;
        let len = buffer.len();
        let mut ops = protocol::encode_receive(address, buffer);
        platform(driver.transfer(handle, &mut ops))?;
        Ok(len)
    }

    /// Send then receive in one locked operation: the usual way to read a
    /// register-addressed peripheral (write the register index, then read).
    ///
    /// The send phase runs only if `send` is `Some` (with an implicit
    /// stop); the receive phase runs only if the send phase succeeded and
    /// `receive` is `Some`. Both `None` is a no-op returning 0.
    pub async fn send_receive(
        &self,
        handle: usize,
        address: u16,
        send: Option<&[u8]>,
        receive: Option<&mut [u8]>,
    ) -> Result<usize, Error> {
        let mut guard = self.state.lock().await;
        let State { lifecycle, driver } = &mut *guard;
        Self::check_transfer_slot(lifecycle, handle)?;
        if let Some(data) = send {
            let mut ops = protocol::encode_send(address, data, false);
            platform(driver.transfer(handle, &mut ops))?;
        }
        if let Some(buffer) = receive {
            let len = buffer.len();
            let mut ops = protocol::encode_receive(address, buffer);
            platform(driver.transfer(handle, &mut ops))?;
            return Ok(len);
        }
        Ok(0)
    }

    /// Lock-free count of currently open or adopted buses.
    ///
    /// This is the only state readable without the manager lock. Its
    /// writes happen under the lock, so it is exact at any quiescent point
    /// and at worst momentarily stale during a concurrent operation.
    pub fn alloc_count(&self) -> usize {
        self.open_count.load(Ordering::Relaxed)
    }

    /// Run `f` with exclusive access to the underlying driver, under the
    /// manager lock.
    ///
    /// Intended for host-side tooling and tests that need to reach past
    /// the manager, e.g. to seed a simulated bus or inspect call counters.
    pub async fn with_driver<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        let mut guard = self.state.lock().await;
        f(&mut guard.driver)
    }

    fn reconfigure(
        driver: &mut D,
        handle: usize,
        config: &BusConfig,
        timeout_code: i32,
    ) -> Result<(), D::Error> {
        driver.configure(handle, config)?;
        driver.set_timeout_code(handle, timeout_code)?;
        driver.install(handle)
    }

    fn bus_config(&self, sda_pin: i32, scl_pin: i32, clock_hz: i32) -> BusConfig {
        BusConfig {
            sda_pin,
            scl_pin,
            clock_hz,
            pullups: self.profile.pullups,
            clock_source: self.profile.clock_source,
        }
    }

    fn slots(lifecycle: &mut Lifecycle<N>) -> Result<&mut [Slot; N], Error> {
        match lifecycle {
            Lifecycle::Uninitialised => Err(Error::NotInitialised),
            Lifecycle::Initialised(slots) => Ok(slots),
        }
    }

    fn check_transfer_slot(lifecycle: &mut Lifecycle<N>, handle: usize) -> Result<(), Error> {
        let slots = Self::slots(lifecycle)?;
        if handle >= N || !slots[handle].in_use() {
            return Err(Error::InvalidParameter);
        }
        Ok(())
    }

    fn close_slot(driver: &mut D, slots: &mut [Slot; N], index: usize, count: &AtomicUsize) {
        match slots[index] {
            Slot::Free => {}
            Slot::Open { .. } => {
                // An uninstall failure is not reportable from here; the
                // slot is reclaimed regardless.
                let _ = driver.uninstall(index);
                slots[index] = Slot::Free;
                count.fetch_sub(1, Ordering::Release);
            }
            Slot::Adopted { .. } => {
                slots[index] = Slot::Free;
                count.fetch_sub(1, Ordering::Release);
            }
        }
    }
}
