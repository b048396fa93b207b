//! Identification and configuration commands

use std::fs;
use std::path::Path;
use synadiag_session::DeviceManager;

/// Bytes per line of the configuration hex dump
const DUMP_WIDTH: usize = 16;

/// Look for a device without opening it
pub fn run_find(mgr: &mut DeviceManager) -> Result<(), Box<dyn std::error::Error>> {
    let (path, protocol) = mgr.find_device()?;
    match protocol {
        Some(p) => println!("Found {} ({})", path, p),
        None => println!("Found {} (protocol unknown, pass --protocol)", path),
    }
    Ok(())
}

pub fn run_identify(mgr: &mut DeviceManager) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", mgr.identify()?);
    println!("Firmware ID:      {}", mgr.firmware_id()?);
    println!("Config ID:        {}", mgr.config_id()?);
    println!("Device ID:        {}", mgr.device_id()?);
    println!(
        "Image:            {} x {}",
        mgr.image_rows(false)?,
        mgr.image_cols(false)?
    );
    println!("Buttons:          {}", mgr.button_count()?);
    println!("Max objects:      {}", mgr.max_objects()?);
    Ok(())
}

/// Dump the firmware configuration to a file or stdout
pub fn run_config(
    mgr: &mut DeviceManager,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let size = mgr.firmware_config_size()?;
    if size == 0 {
        println!("Device has no firmware configuration");
        return Ok(());
    }
    let mut buf = vec![0u8; size];
    let n = mgr.firmware_config(&mut buf)?;
    buf.truncate(n);

    match output {
        Some(path) => {
            fs::write(path, &buf)?;
            println!("Wrote {} bytes to {:?}", buf.len(), path);
        }
        None => print!("{}", hex_dump(&buf)),
    }
    Ok(())
}

fn hex_dump(data: &[u8]) -> String {
    let mut out = String::new();
    for (i, line) in data.chunks(DUMP_WIDTH).enumerate() {
        let bytes: Vec<String> = line.iter().map(|b| format!("{:02x}", b)).collect();
        out.push_str(&format!("{:08x}: {}\n", i * DUMP_WIDTH, bytes.join(" ")));
    }
    out
}
