//! Switch Board Console
//!
//! A standalone tool to exercise the PowerMux driver against real hardware:
//! drives channel defaults, polls status and telemetry, and optionally runs
//! the TCP pass-through server.
//!
//! Usage:
//!   cargo run --example board_console -- [OPTIONS]
//!
//! Options:
//!   --port PORT       Serial port (default: /dev/ttymxc6)
//!   --baud RATE       Baud rate (default: 115200)
//!   --query MS        Status query period in ms (default: 10000)
//!   --legacy          Use the single-letter command dialect
//!   --listen ADDR     Run the pass-through server on ADDR (e.g. 0.0.0.0:9900)

use std::time::{Duration, Instant};

use powermux_core::prelude::*;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name = "/dev/ttymxc6".to_string();
    let mut baud_rate = 115200u32;
    let mut query_period_ms = 10_000u64;
    let mut wire_format = WireFormat::Token;
    let mut listen_addr: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    port_name = args[i].clone();
                }
            }
            "--baud" | "-b" => {
                i += 1;
                if i < args.len() {
                    baud_rate = args[i].parse().unwrap_or(115200);
                }
            }
            "--query" | "-q" => {
                i += 1;
                if i < args.len() {
                    query_period_ms = args[i].parse().unwrap_or(10_000);
                }
            }
            "--legacy" => {
                wire_format = WireFormat::LegacyLetter;
            }
            "--listen" | "-l" => {
                i += 1;
                if i < args.len() {
                    listen_addr = Some(args[i].clone());
                }
            }
            other => {
                eprintln!("Unknown option: {}", other);
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let config = DriverConfig {
        port_name: port_name.clone(),
        baud_rate,
        query_period_ms,
        wire_format,
        channels: vec![
            ChannelConfig::named("Wifi"),
            ChannelConfig::named("XBEE"),
            ChannelConfig::named("GPS"),
            ChannelConfig::named("ATMCLK"),
            ChannelConfig::named("GSM/SAT"),
        ],
        ..DriverConfig::default()
    };

    println!("Opening {} at {} baud...", port_name, baud_rate);
    let mut driver = match SwitchDriver::open(config) {
        Ok(driver) => driver,
        Err(e) => {
            eprintln!("Failed to open board port: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = driver.initialize() {
        eprintln!("Initialization failed: {}", e);
        std::process::exit(1);
    }
    println!("Driver running, {} channels", driver.channels().len());

    let mut server = listen_addr.map(|addr| {
        let server = PassthroughServer::bind(&addr).unwrap_or_else(|e| {
            eprintln!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        });
        println!("Pass-through server on {}", addr);
        server
    });

    let mut last_print = Instant::now();
    let mut last_broadcast = Instant::now();
    loop {
        if let Err(e) = driver.tick() {
            eprintln!("Link failure: {}", e);
            std::process::exit(1);
        }

        if let Some(server) = server.as_mut() {
            server.poll(&mut driver);
            if last_broadcast.elapsed() >= Duration::from_secs(1) {
                last_broadcast = Instant::now();
                if let Some(report) = driver.telemetry_report() {
                    server.broadcast(&report);
                }
            }
        }

        if last_print.elapsed() >= Duration::from_secs(5) {
            last_print = Instant::now();
            for record in driver.channel_states() {
                println!(
                    "  {:10} {}  fault={:?}",
                    record.name,
                    if record.state { "ON " } else { "off" },
                    record.fault
                );
            }
            match driver.telemetry_report() {
                Some(report) => println!(
                    "  {:.2} degC  {:.2} hPa  {:.2} %RH  vin={:.2} V  5V={:.2} V",
                    report.temperature_c,
                    report.pressure_hpa,
                    report.humidity_pct,
                    report.vin_v,
                    report.rail5_v
                ),
                None => println!("  telemetry stale"),
            }
        }

        std::thread::sleep(Duration::from_millis(100));
    }
}
