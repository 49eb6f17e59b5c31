//! Parse .img file utility
//! Loads a VX-7 image and displays decoded channels

use chirp_clone::clone::verify_all;
use chirp_clone::core::Channel;
use chirp_clone::drivers::{detect_model, init_drivers, CloneModeRadio, Radio, Vx7Radio};
use chirp_clone::formats::load_img;
use std::env;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let json = args.iter().any(|a| a == "--json");
    let positional: Vec<&str> = args
        .iter()
        .skip(1)
        .filter(|a| *a != "--json")
        .map(String::as_str)
        .collect();

    if positional.is_empty() || positional.len() > 2 {
        eprintln!("Usage: {} <file.img> [channel | first-last] [--json]", args[0]);
        eprintln!("\nExamples:");
        eprintln!("  {} vx7.img               # Show all non-empty channels", args[0]);
        eprintln!("  {} vx7.img 40            # Show only channel #40", args[0]);
        eprintln!("  {} vx7.img 32-50 --json  # Channels 32-50 as JSON", args[0]);
        std::process::exit(1);
    }

    let img_file = positional[0];
    init_drivers();
    let mut radio = Vx7Radio::new()?;
    let (image, metadata) = load_img(img_file, radio.get_memsize())?;

    let checksums = verify_all(&radio.clone_profile().checksums, &image);
    let detected = detect_model(image.as_bytes());
    radio.load_image(image)?;

    if !json {
        println!("Loading .img file: {}", img_file);
        println!("Radio: {} {}", metadata.vendor, metadata.model);
        println!("CHIRP version: {}", metadata.chirp_version);
        match &detected {
            Some(info) => println!("Detected: {} ({})", info.full_name(), info.description),
            None => println!("Detected: unknown image"),
        }
        match &checksums {
            Ok(()) => println!("Checksums: ok"),
            Err(e) => println!("Checksums: {}", e),
        }
        println!();
    }

    let channels: Vec<Channel> = match positional.get(1) {
        None => radio.get_channels()?,
        Some(range) => {
            let (start, end) = match range.split_once('-') {
                Some((a, b)) => (a.parse::<u32>()?, b.parse::<u32>()?),
                None => {
                    let n = range.parse::<u32>()?;
                    (n, n)
                }
            };
            (start..=end)
                .map(|n| radio.get_channel(n))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&channels)?);
        return Ok(());
    }

    let single = positional.get(1).is_some() && channels.len() == 1;
    for ch in &channels {
        print_channel(ch);
        if single && !ch.empty {
            let raw = radio.get_raw_channel(ch.number)?;
            let hex: Vec<String> = raw.iter().map(|b| format!("{:02X}", b)).collect();
            println!("  Raw slot:     {}", hex.join(" "));
            println!();
        }
    }

    Ok(())
}

fn print_channel(ch: &Channel) {
    if ch.empty {
        println!("Channel #{}: <empty>\n", ch.number);
        return;
    }

    println!("Channel #{}: \"{}\"", ch.number, ch.name);
    println!(
        "  Frequency:    {} Hz ({:.4} MHz)",
        ch.freq,
        ch.freq as f64 / 1_000_000.0
    );
    println!("  Mode:         {}", ch.mode);
    println!(
        "  Duplex:       {}",
        if ch.duplex.is_empty() { "none" } else { &ch.duplex }
    );
    println!(
        "  Offset:       {} Hz ({:.3} MHz)",
        ch.offset,
        ch.offset as f64 / 1_000_000.0
    );

    match ch.tmode.as_str() {
        "Tone" | "TSQL" => {
            println!("  Tone Mode:    {}", ch.tmode);
            println!("  CTCSS:        {} Hz", ch.rtone);
        }
        "DTCS" => {
            println!("  Tone Mode:    DTCS");
            println!("  DTCS Code:    {:03}", ch.dtcs);
        }
        _ => {}
    }

    println!(
        "  Skip:         {}",
        if ch.skip.is_empty() { "none" } else { &ch.skip }
    );
    println!("  Tuning Step:  {} kHz", ch.tuning_step);
    println!();
}
