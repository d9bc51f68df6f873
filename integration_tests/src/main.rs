//! Integration tests for the BLE-MIDI firmware.
//!
//! Run after flashing the firmware to test the MIDI characteristic over BLE.

mod ble_client;

use std::time::Duration;

use clap::Parser;
use colored::Colorize;

use ble_client::BleClient;
use tests::{print_results, run_all_tests};

#[derive(Parser)]
#[command(name = "integration-tests")]
#[command(about = "Integration tests for the BLE-MIDI firmware")]
struct Args {
    /// BLE device name prefix
    #[arg(long, default_value = "BLE-MIDI")]
    ble_name: String,

    /// BLE scan timeout in seconds
    #[arg(long, default_value = "10")]
    scan_timeout: u64,

    /// Also run the key press test, waiting this many seconds for each note
    #[arg(long)]
    key_wait: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    println!("{}", "BLE-MIDI Integration Tests".bold());
    println!("Scanning for \"{}*\"...", args.ble_name);

    let client =
        BleClient::connect_by_name_prefix(&args.ble_name, Duration::from_secs(args.scan_timeout))
            .await?;
    println!("{}", "Connected!".green());

    println!("\nRunning tests...\n");

    let results = run_all_tests(&client, args.key_wait.map(Duration::from_secs)).await;
    print_results(&results);

    let _ = client.disconnect().await;

    // Exit with error code if any tests failed
    let failed = results.iter().filter(|r| !r.passed).count();
    if failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}
