//! Example shell for the BLE scanner.
//!
//! Runs a scan against the in-process mock platform: picks the backend from
//! the simulated revision, asks for the location permission when the scan
//! is refused, feeds simulated advertisements and prints the devices found
//! sorted by address.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use blescan_scanner::mock::{MockPlatform, MockPlatformHandle};
use blescan_scanner::{
    Advertisement, BackendKind, BleScanner, FINE_LOCATION, GrantResult, PlatformRevision,
    ScanEvent, ScanFilter, ScanSettings, ScannerConfig,
};

#[derive(Debug, Parser)]
#[command(name = "blescan", version, about = "Scan for simulated BLE devices")]
struct Args {
    /// Platform revision to simulate
    #[arg(long, default_value_t = 26)]
    revision: u32,

    /// Scan duration in seconds
    #[arg(long, default_value_t = 3)]
    duration: u64,

    /// Start with the location permission already granted
    #[arg(long)]
    granted: bool,

    /// Answer the permission prompt with a denial
    #[arg(long)]
    deny_permission: bool,

    /// Disable every location provider
    #[arg(long)]
    location_off: bool,

    /// Number of simulated devices
    #[arg(long, default_value_t = 5)]
    devices: usize,

    /// Only report devices advertising this name
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let args = Args::parse();
    let revision = PlatformRevision(args.revision);

    let (platform, handle) = MockPlatform::new(revision);
    if args.granted {
        handle.grant_location_permission();
    }
    if args.location_off {
        handle.disable_all_providers();
    }

    let platform = Arc::new(platform);
    let config = ScannerConfig::default();
    let scanner = match BackendKind::for_revision(revision) {
        BackendKind::Legacy => BleScanner::legacy(platform.clone(), platform.clone(), config),
        BackendKind::Modern => BleScanner::modern(platform.clone(), platform.clone(), config),
    };
    info!(%revision, backend = %scanner.backend_kind(), "Scanner ready");

    let found = Arc::new(Mutex::new(BTreeMap::new()));
    let sink = found.clone();
    scanner.set_on_device_found_default(move |address, rssi, _| {
        if let Ok(mut devices) = sink.lock() {
            devices.insert(address.to_string(), rssi);
        }
    });

    let mut events = scanner.subscribe();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ScanEvent::DeviceFound(record) => info!(
                    address = record.hardware_address(),
                    name = record.display_name().unwrap_or("-"),
                    rssi = record.signal_strength(),
                    "Device found"
                ),
                ScanEvent::ScanFailed { error_code } => warn!(error_code, "Scan failed"),
                other => info!(event = ?other, "Scan event"),
            }
        }
    });

    let filters: Vec<ScanFilter> = args
        .name
        .iter()
        .map(|name| ScanFilter::new().with_device_name(name.clone()))
        .collect();

    if !toggle_scan(&scanner, &filters)? {
        if !request_permission(&scanner, &platform, &handle, args.deny_permission).await {
            bail!("location permission denied");
        }
        if !toggle_scan(&scanner, &filters)? {
            bail!("location is still unavailable; enable a location provider");
        }
    }

    tokio::spawn(simulate_devices(
        handle.clone(),
        args.devices,
        Duration::from_secs(args.duration),
    ));
    tokio::time::sleep(Duration::from_secs(args.duration)).await;

    scanner.stop_scan();
    event_log.abort();

    let devices = found.lock().map(|d| d.clone()).unwrap_or_default();
    println!("{} device(s) found", devices.len());
    for (address, rssi) in &devices {
        println!("  {address}  {rssi} dBm");
    }

    Ok(())
}

/// Start the scan if idle, stop it otherwise.
///
/// Returns `false` when the start is refused for lack of location access.
fn toggle_scan(scanner: &BleScanner, filters: &[ScanFilter]) -> anyhow::Result<bool> {
    if scanner.is_scanning() {
        scanner.stop_scan();
        return Ok(true);
    }

    if scanner.backend_kind() == BackendKind::Legacy && !filters.is_empty() {
        info!("Legacy backend ignores scan filters");
    }

    match scanner.start_scan_with(filters, &ScanSettings::default()) {
        Ok(()) => Ok(true),
        Err(e) if e.is_location_unavailable() => {
            warn!(error = %e, "Scan refused");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

/// Prompt for the permission and answer the prompt as the simulated user.
async fn request_permission(
    scanner: &BleScanner,
    platform: &MockPlatform,
    handle: &MockPlatformHandle,
    deny: bool,
) -> bool {
    let answer = scanner.request_location_permission_async(platform);

    let request_code = handle
        .permission_requests()
        .last()
        .map_or(scanner.permission_request_code(), |(_, code)| *code);
    let result = if deny {
        GrantResult::Denied
    } else {
        handle.grant_location_permission();
        GrantResult::Granted
    };

    if !scanner.handle_request_permission_result(request_code, &[FINE_LOCATION], &[result]) {
        warn!(request_code, "Permission result not claimed by scanner");
    }

    answer.await
}

/// Advertise `count` devices, several times each with drifting signal strength.
async fn simulate_devices(handle: MockPlatformHandle, count: usize, duration: Duration) {
    const ROUNDS: u32 = 3;

    let slots = (count as u32).saturating_mul(ROUNDS).max(1);
    let interval = duration / (slots + 1);

    for round in 0..ROUNDS {
        for index in 0..count {
            let address = format!("C0:FF:EE:00:00:{:02X}", index % 256);
            let rssi = -40 - (index as i32 % 12) * 5 - round as i32;
            let advertisement =
                Advertisement::new(address, rssi).with_name(format!("Sensor-{index}"));

            handle.advertise(advertisement);
            tokio::time::sleep(interval).await;
        }
    }
}
