//! Clone download utility
//! Reads a full memory image from a VX-7 and saves it as .img plus a hex dump

use chirp_clone::clone::Status;
use chirp_clone::drivers::{CloneModeRadio, Radio, Vx7Radio};
use chirp_clone::formats::{save_img, Metadata};
use chirp_clone::memmap::hexdump;
use chirp_clone::serial::{SerialConfig, SerialPort};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt::format::FmtSpan, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter_layer = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let format_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(format_layer)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Usage: {} <port> [out.img]", args[0]);
        eprintln!("Example: {} /dev/ttyUSB0 vx7.img", args[0]);
        eprintln!("\nStart the clone on the radio (MON/F + power on, then BAND)");
        eprintln!("after this tool reports it is waiting.");
        std::process::exit(1);
    }

    let port_name = &args[1];
    let img_path = args.get(2).map(String::as_str).unwrap_or("vx7.img");
    let hex_path = format!("{}.hex", img_path);

    let mut radio = Vx7Radio::new()?;
    let profile = radio.clone_profile();

    info!("Opening {} at {} baud", port_name, profile.baud_rate);
    let mut port = SerialPort::open(port_name, SerialConfig::new(profile.baud_rate))?;
    port.clear_input()?;

    let session = radio
        .session()?
        .with_progress(Arc::new(|status: &Status| info!("{}", status)));

    let abort = session.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current block");
            abort.abort();
        }
    });

    info!("Waiting for {} to send its image...", radio.get_name());
    radio.sync_in(&mut port, session).await?;

    let image = radio
        .image()
        .ok_or_else(|| anyhow::anyhow!("download finished without an image"))?;

    let metadata = Metadata::new(radio.vendor(), radio.model()).with_rclass("VX7Radio");
    save_img(img_path, image, &metadata)?;
    std::fs::write(&hex_path, hexdump(0, image.as_bytes()))?;

    let used = radio.get_channels()?.len();

    println!("\n=== Download Complete ===");
    println!("Image:    {} ({} bytes)", img_path, image.len());
    println!("Hex dump: {}", hex_path);
    println!("Channels in use: {}", used);

    Ok(())
}
