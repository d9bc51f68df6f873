#![no_std]
#![no_main]

extern crate alloc;

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use embassy_executor::Spawner;
use esp_backtrace as _;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::timer::timg::TimerGroup;
use static_cell::StaticCell;

use blemidi_firmware::config;
use blemidi_firmware::logger;
use blemidi_firmware::tasks::{self, LedReceiver, NoteReceiver, NoteSender, LED_CHANNEL, NOTE_CHANNEL};

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Static cell for esp-radio controller (needed for 'static lifetime)
static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();

/// Type alias for the BLE controller
type BleController = trouble_host::prelude::ExternalController<
    esp_radio::ble::controller::BleConnector<'static>,
    10,
>;

/// Key inputs in the order of `config::keys::NOTES`
type Keys = [Input<'static>; config::keys::COUNT];

#[esp_hal::main]
fn main() -> ! {
    // Initialise heap allocator for BLE support (64KB - BLE requires significant heap)
    esp_alloc::heap_allocator!(size: 64 * 1024);

    logger::init(log::LevelFilter::Info);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Turn on LED (active low)
    let led = Output::new(peripherals.GPIO48, Level::Low, OutputConfig::default());

    // Keys on GPIO4-7 are active low with internal pull-ups
    let key_config = InputConfig::default().with_pull(Pull::Up);
    let keys: Keys = [
        Input::new(peripherals.GPIO4, key_config),
        Input::new(peripherals.GPIO5, key_config),
        Input::new(peripherals.GPIO6, key_config),
        Input::new(peripherals.GPIO7, key_config),
    ];

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Read unique device ID from eFuse MAC address (last 3 bytes)
    let mac = esp_hal::efuse::Efuse::read_base_mac_address();
    let device_id: [u8; 3] = [mac[3], mac[4], mac[5]];

    // Initialise esp-radio for BLE support (must be after esp_rtos::start)
    let radio_controller = RADIO_CONTROLLER.init(
        esp_radio::init().expect("Failed to initialize esp-radio")
    );

    // Create BLE connector (ownership is passed to ExternalController)
    let ble_connector = esp_radio::ble::controller::BleConnector::new(
        radio_controller,
        peripherals.BT,
        esp_radio::ble::Config::default(),
    ).expect("Failed to initialize BLE connector");

    // Wrap in ExternalController for trouble-host compatibility
    let controller: BleController = trouble_host::prelude::ExternalController::new(ble_connector);

    log::info!("BLE-MIDI firmware {} starting", env!("CARGO_PKG_VERSION"));

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(async_main(spawner, led, keys, controller, device_id));
    })
}

#[embassy_executor::task]
async fn async_main(
    spawner: Spawner,
    led: Output<'static>,
    keys: Keys,
    ble_controller: BleController,
    device_id: [u8; 3],
) {
    spawner.must_spawn(led_task(led, LED_CHANNEL.receiver()));
    spawner.must_spawn(keys_task(keys, NOTE_CHANNEL.sender()));
    spawner.must_spawn(ble_host_task(ble_controller, device_id, NOTE_CHANNEL.receiver()));
}

/// Task that flashes the LED for notes received from the central
#[embassy_executor::task]
async fn led_task(led: Output<'static>, receiver: LedReceiver) {
    tasks::led_task(led, receiver).await;
}

/// Task that scans the keys
#[embassy_executor::task]
async fn keys_task(keys: Keys, sender: NoteSender) {
    tasks::keys_task(keys, config::keys::NOTES, sender).await;
}

/// Task that manages BLE connectivity
///
/// This task handles BLE advertising, connections, and routes MIDI notes
/// between the keys, the LED and the connected central.
#[embassy_executor::task]
async fn ble_host_task(controller: BleController, device_id: [u8; 3], notes: NoteReceiver) {
    tasks::ble_task(controller, device_id, notes, LED_CHANNEL.sender()).await;
}
