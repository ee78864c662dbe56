//! Example: Monitoring a Sensor Board
//!
//! This example connects to an ESP32 sensor board, prints every reading it
//! streams and stops cleanly on Ctrl-C.
//!
//! Run with: `cargo run --example monitor -- <ADDRESS> [NAME]`
//!
//! `ADDRESS` is `host:port` for a Wi-Fi serial bridge. With the `rfcomm`
//! feature on Linux, a Bluetooth address (`AA:BB:CC:DD:EE:FF[/channel]`)
//! connects over RFCOMM instead.
//!
//! Set `RUST_LOG=esplink_core=debug` to see the session's own logging.

use std::env;
use std::time::Duration;

use esplink_core::{SessionEvent, SessionManager, SessionOptions};
use esplink_types::{BatteryProfile, DeviceRef, estimate_percent};
use tracing_subscriber::EnvFilter;

fn looks_like_bluetooth(address: &str) -> bool {
    let mac = address.split('/').next().unwrap_or(address);
    mac.len() == 17 && mac.split(':').count() == 6
}

fn open_session(device: &DeviceRef, options: SessionOptions) -> esplink_core::Result<SessionManager> {
    #[cfg(all(target_os = "linux", feature = "rfcomm"))]
    if looks_like_bluetooth(device.address()) {
        return SessionManager::new(esplink_core::RfcommTransport::new(), options);
    }

    if looks_like_bluetooth(device.address()) {
        eprintln!("Bluetooth addresses need the `rfcomm` feature on Linux; trying TCP");
    }
    SessionManager::new(esplink_core::TcpTransport::new(), options)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(address) = args.get(1) else {
        eprintln!("Usage: {} <ADDRESS> [NAME]", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} 192.168.4.1:3333 Greenhouse", args[0]);
        eprintln!("  {} AA:BB:CC:DD:EE:FF/1", args[0]);
        std::process::exit(1);
    };
    let device = match args.get(2) {
        Some(name) => DeviceRef::new(address.as_str(), name.as_str()),
        None => DeviceRef::from_address(address.as_str()),
    };

    let options = SessionOptions::builder()
        .connect_timeout(Duration::from_secs(15))
        .read_timeout(Duration::from_secs(30))
        .build();
    let session = open_session(&device, options)?;
    let mut events = session.subscribe();
    let profile = BatteryProfile::default();

    println!("Connecting to {}...", device);
    session.connect(device);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!();
                println!("Stopping...");
                session.stop();
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                match event {
                    SessionEvent::StateChanged { state } => println!("[{}]", state),
                    SessionEvent::Reading { reading, received_at } => {
                        let pack = estimate_percent(reading.voltage, &profile)
                            .map(|p| format!(" (pack ~{}%)", p))
                            .unwrap_or_default();
                        println!("{} {}{}", received_at.time(), reading, pack);
                    }
                    SessionEvent::ConnectionFailed { reason, .. } => {
                        eprintln!("Connection failed: {}", reason);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let metrics = session.metrics();
    println!();
    println!("Records:       {}", metrics.records);
    println!("Readings:      {}", metrics.readings);
    println!("Decode errors: {}", metrics.decode_errors);
    Ok(())
}
