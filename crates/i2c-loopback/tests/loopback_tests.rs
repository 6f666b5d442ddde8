use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use i2c_bus_manager::protocol::encode_send;
use i2c_bus_manager::{BusConfig, Error, I2cDriver, I2cManager, Profile};
use i2c_loopback::{LoopbackDriver, LoopbackError, RegisterDevice};

type Manager = I2cManager<NoopRawMutex, LoopbackDriver<2>, 2>;

fn manager_with(driver: LoopbackDriver<2>) -> Manager {
    I2cManager::new(driver, Profile::default())
}

// ---------------------------------------------------------------------------
// End-to-end through the manager
// ---------------------------------------------------------------------------

#[futures_test::test]
async fn register_read_via_send_receive() {
    let mut driver = LoopbackDriver::new();
    driver
        .add_device(0, 0x50, RegisterDevice::with_registers(&[(0x10, 0xAA), (0x11, 0xBB)]))
        .unwrap();
    let manager = manager_with(driver);

    manager.init().await;
    let handle = manager.open(0, 21, 22, true).await.unwrap();

    let mut buffer = [0u8; 2];
    let received = manager
        .send_receive(handle, 0x50, Some(&[0x10]), Some(&mut buffer))
        .await
        .unwrap();
    assert_eq!(received, 2);
    assert_eq!(buffer, [0xAA, 0xBB]);
}

#[futures_test::test]
async fn register_write_via_send() {
    let mut driver = LoopbackDriver::new();
    driver.add_device(0, 0x50, RegisterDevice::new()).unwrap();
    let manager = manager_with(driver);

    manager.init().await;
    let handle = manager.open(0, 21, 22, true).await.unwrap();

    manager.send(handle, 0x50, &[0x10, 0x5A, 0x5B], false).await.unwrap();
    let (a, b) = manager
        .with_driver(|driver| {
            let device = driver.device(0, 0x50).unwrap();
            (device.register(0x10), device.register(0x11))
        })
        .await;
    assert_eq!((a, b), (0x5A, 0x5B));
}

#[futures_test::test]
async fn probe_detects_present_and_absent_devices() {
    let mut driver = LoopbackDriver::new();
    driver.add_device(0, 0x50, RegisterDevice::new()).unwrap();
    let manager = manager_with(driver);

    manager.init().await;
    let handle = manager.open(0, 21, 22, true).await.unwrap();

    assert_eq!(manager.send(handle, 0x50, &[], false).await, Ok(()));
    assert_eq!(manager.send(handle, 0x51, &[], false).await, Err(Error::Platform));
    assert_eq!(manager.receive(handle, 0x51, &mut []).await, Err(Error::Platform));
}

#[futures_test::test]
async fn ten_bit_device_round_trip() {
    let mut driver = LoopbackDriver::new();
    driver.add_device(0, 0x2F0, RegisterDevice::new()).unwrap();
    let manager = manager_with(driver);

    manager.init().await;
    let handle = manager.open(0, 21, 22, true).await.unwrap();

    manager.send(handle, 0x2F0, &[0x20, 0xC3], false).await.unwrap();

    // The read goes out as write header + low byte, repeated start, read
    // header; the loopback resolves the full address across the restart.
    let mut buffer = [0u8; 1];
    let received = manager
        .send_receive(handle, 0x2F0, Some(&[0x20]), Some(&mut buffer))
        .await
        .unwrap();
    assert_eq!(received, 1);
    assert_eq!(buffer, [0xC3]);
}

#[futures_test::test]
async fn sequential_reads_stream_from_the_pointer() {
    let mut driver = LoopbackDriver::new();
    driver
        .add_device(0, 0x50, RegisterDevice::with_registers(&[(0x00, 1), (0x01, 2), (0x02, 3)]))
        .unwrap();
    let manager = manager_with(driver);

    manager.init().await;
    let handle = manager.open(0, 21, 22, true).await.unwrap();

    manager.send(handle, 0x50, &[0x00], false).await.unwrap();
    let mut first = [0u8; 2];
    manager.receive(handle, 0x50, &mut first).await.unwrap();
    let mut second = [0u8; 1];
    manager.receive(handle, 0x50, &mut second).await.unwrap();
    assert_eq!(first, [1, 2]);
    assert_eq!(second, [3]);
}

#[futures_test::test]
async fn set_clock_survives_full_reconfiguration() {
    let mut driver = LoopbackDriver::new();
    driver.add_device(0, 0x50, RegisterDevice::new()).unwrap();
    let manager = manager_with(driver);

    manager.init().await;
    let handle = manager.open(0, 21, 22, true).await.unwrap();
    let code_before = manager.with_driver(|d| d.timeout_code(0)).await.unwrap();

    manager.set_clock(handle, 400_000).await.unwrap();
    assert_eq!(manager.clock(handle).await, Ok(400_000));

    // Still installed, same timeout register, new clock in the config.
    assert!(manager.with_driver(|d| d.is_installed(0)).await);
    assert_eq!(manager.with_driver(|d| d.timeout_code(0)).await, Ok(code_before));
    assert_eq!(manager.with_driver(|d| d.config(0).unwrap().clock_hz).await, 400_000);

    // And the bus still moves data.
    assert_eq!(manager.send(handle, 0x50, &[0x00, 0x01], false).await, Ok(()));
}

#[futures_test::test]
async fn adopted_bus_transfers_without_configuration_rights() {
    let mut driver = LoopbackDriver::new();
    driver.add_device(1, 0x42, RegisterDevice::new()).unwrap();
    // An external owner set the bus up before the manager saw it.
    let config = BusConfig {
        sda_pin: 4,
        scl_pin: 5,
        clock_hz: 400_000,
        pullups: true,
        clock_source: 0,
    };
    driver.configure(1, &config).unwrap();
    driver.install(1).unwrap();
    let manager = manager_with(driver);

    manager.init().await;
    let handle = manager.adopt(1, true).await.unwrap();
    assert_eq!(handle, 1);

    let counts_before = manager.with_driver(|d| d.counts()).await;
    assert_eq!(manager.set_clock(handle, 100_000).await, Err(Error::NotSupported));
    assert_eq!(manager.clock(handle).await, Err(Error::NotSupported));
    assert_eq!(manager.set_timeout(handle, 5).await, Err(Error::NotSupported));
    assert_eq!(manager.timeout(handle).await, Err(Error::NotSupported));
    assert_eq!(
        manager.close_recover_bus(handle).await,
        Err(Error::NotSupported)
    );
    // None of that reached the driver.
    assert_eq!(manager.with_driver(|d| d.counts()).await, counts_before);

    // Transfers are fine: data movement needs no configuration ownership.
    manager.send(handle, 0x42, &[0x00, 0x99], false).await.unwrap();
    let mut buffer = [0u8; 1];
    manager
        .send_receive(handle, 0x42, Some(&[0x00]), Some(&mut buffer))
        .await
        .unwrap();
    assert_eq!(buffer, [0x99]);

    // Close releases the slot but leaves the external owner's driver alone.
    manager.close(handle).await;
    assert_eq!(manager.alloc_count(), 0);
    assert!(manager.with_driver(|d| d.is_installed(1)).await);
}

// ---------------------------------------------------------------------------
// Driver primitives, driven directly
// ---------------------------------------------------------------------------

#[test]
fn install_requires_configuration() {
    let mut driver: LoopbackDriver<2> = LoopbackDriver::new();
    assert_eq!(driver.install(0), Err(LoopbackError::NotConfigured));
}

#[test]
fn transfer_requires_installation() {
    let mut driver: LoopbackDriver<2> = LoopbackDriver::new();
    driver.add_device(0, 0x50, RegisterDevice::new()).unwrap();
    let mut ops = encode_send(0x50, b"A", false);
    assert_eq!(driver.transfer(0, &mut ops), Err(LoopbackError::NotInstalled));
}

#[test]
fn uninstall_requires_installation() {
    let mut driver: LoopbackDriver<2> = LoopbackDriver::new();
    assert_eq!(driver.uninstall(0), Err(LoopbackError::NotInstalled));
}

#[test]
fn bus_index_is_validated() {
    let mut driver: LoopbackDriver<2> = LoopbackDriver::new();
    assert_eq!(
        driver.add_device(2, 0x50, RegisterDevice::new()),
        Err(LoopbackError::InvalidBus)
    );
    assert_eq!(driver.timeout_code(2), Err(LoopbackError::InvalidBus));
}

#[test]
fn device_table_is_bounded() {
    let mut driver: LoopbackDriver<1> = LoopbackDriver::new();
    for address in 0x10..0x14 {
        driver.add_device(0, address, RegisterDevice::new()).unwrap();
    }
    assert_eq!(
        driver.add_device(0, 0x14, RegisterDevice::new()),
        Err(LoopbackError::TableFull)
    );
}
