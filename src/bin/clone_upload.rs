//! Clone upload utility
//! Checks every channel of a .img file, refreshes checksums and sends it to a VX-7

use chirp_clone::clone::Status;
use chirp_clone::core::RadioFeatures;
use chirp_clone::drivers::{CloneModeRadio, Radio, Vx7Radio};
use chirp_clone::formats::load_img;
use chirp_clone::serial::{SerialConfig, SerialPort};
use std::env;
use std::sync::Arc;
use tracing::{error, info, warn};
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
    if args.len() != 3 {
        eprintln!("Usage: {} <port> <in.img>", args[0]);
        eprintln!("Example: {} /dev/ttyUSB0 vx7.img", args[0]);
        eprintln!("\nPut the radio in clone receive mode (press V/M) before starting.");
        std::process::exit(1);
    }

    let port_name = &args[1];
    let img_path = &args[2];

    let mut radio = Vx7Radio::new()?;
    let (image, metadata) = load_img(img_path, radio.get_memsize())?;
    if !metadata.vendor.is_empty() && !metadata.describes(radio.vendor(), radio.model()) {
        anyhow::bail!(
            "{} was saved from a {} {}, not a {}",
            img_path,
            metadata.vendor,
            metadata.model,
            radio.get_name()
        );
    }
    if !Vx7Radio::match_model(image.as_bytes()) {
        anyhow::bail!("{} does not start with the VX-7 identifier", img_path);
    }
    radio.load_image(image)?;

    let mut errors = 0;
    for channel in radio.get_channels()? {
        let (warnings, problems) =
            RadioFeatures::split_messages(&radio.validate_channel(&channel));
        for msg in warnings {
            warn!("Channel {}: {}", channel.number, msg);
        }
        for msg in problems {
            error!("Channel {}: {}", channel.number, msg);
            errors += 1;
        }
    }
    if errors > 0 {
        anyhow::bail!("{} channel problems, not uploading", errors);
    }

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

    radio.sync_out(&mut port, session).await?;

    println!("\n=== Upload Complete ===");
    println!("Sent {} to {}", img_path, radio.get_name());

    Ok(())
}
