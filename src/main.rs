//! synadiag - Synaptics touch controller diagnostics
//!
//! Identifies controllers, captures capacitance images, runs production
//! tests, streams finger events and accesses flash on both the
//! register-indexed RMI protocol and the packet-framed TCM protocol.
//!
//! # Architecture
//!
//! All commands go through one [`DeviceManager`] session, which picks the
//! protocol engine for the device:
//! - **RMI** devices (`/dev/rmiN`) - Register access through the function
//!   descriptor table, images through F54 reports
//! - **TCM** devices (`/dev/tcmN`) - Command/response packets with
//!   asynchronous reports
//!
//! The `dummy-rmi` and `dummy-tcm` devices emulate a controller in memory.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, ProtocolArg};
use synadiag_session::{DeviceManager, SessionConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let config = match &cli.config {
        Some(path) => SessionConfig::from_toml_file(path)?,
        None => SessionConfig::default(),
    };

    let mut mgr = DeviceManager::new(config);

    // Commands that never open a device
    match cli.command {
        Commands::ListDevices => {
            commands::list_devices();
            return Ok(());
        }
        Commands::Find => return commands::info::run_find(&mut mgr),
        _ => {}
    }

    let path = open_device(&mut mgr, cli.device.as_deref(), cli.protocol)?;

    let result: Result<(), Box<dyn std::error::Error>> = match cli.command {
        Commands::ListDevices | Commands::Find => Ok(()),
        Commands::Identify => commands::info::run_identify(&mut mgr),
        Commands::Image {
            report_type,
            frames,
            landscape,
            stream,
            stream_args,
            output,
        } => commands::image::run_image(
            &mut mgr,
            report_type,
            frames,
            landscape,
            stream.then_some(stream_args),
            output.as_deref(),
        ),
        Commands::Test { id, limits, output } => {
            commands::test::run_test(&mut mgr, id, &limits, output.as_deref())
        }
        Commands::Hires { limits } => commands::test::run_hires(&mut mgr, &limits),
        Commands::TrxShort { limits } => commands::test::run_trx_short(&mut mgr, &limits),
        Commands::Raw {
            direction,
            addr,
            data,
            length,
        } => {
            match cli::parse_hex_bytes(data.as_deref().unwrap_or("")) {
                Ok(data) => {
                    commands::touch::run_raw(&mut mgr, direction, addr, &data, length as usize)
                }
                Err(e) => Err(e.into()),
            }
        }
        Commands::Config { output } => commands::info::run_config(&mut mgr, output.as_deref()),
        Commands::Touch {
            frames,
            max_fingers,
        } => commands::touch::run_touch(&mut mgr, frames, max_fingers),
        Commands::Gear { gear } => mgr
            .set_gear(gear)
            .map(|()| println!("Gear {} selected", gear))
            .map_err(Into::into),
        Commands::Reset => mgr
            .reset()
            .map(|()| println!("Controller reset"))
            .map_err(Into::into),
        Commands::FlashRead {
            block,
            length,
            output,
        } => commands::flash::run_read(&mut mgr, block, length as usize, &output),
        Commands::FlashWrite { block, input } => {
            commands::flash::run_write(&mut mgr, block, &input)
        }
        Commands::FlashErase { block, count, wide } => {
            commands::flash::run_erase(&mut mgr, block, count, wide)
        }
    };

    if result.is_err() && mgr.errors().get_num_err_msg() > 0 {
        eprintln!("Device error log:");
        for msg in mgr.errors().iter() {
            eprintln!("  {}", msg);
        }
    }

    if let Err(e) = mgr.close_device(&path) {
        log::warn!("Failed to close {}: {}", path, e);
    }

    result
}

/// Open the requested device, or the first configured candidate
fn open_device(
    mgr: &mut DeviceManager,
    device: Option<&str>,
    protocol: Option<ProtocolArg>,
) -> Result<String, Box<dyn std::error::Error>> {
    let path = match device {
        Some(d) => d.to_string(),
        None => mgr.find_device()?.0,
    };
    if let Some(p) = protocol {
        mgr.set_device(&path, p == ProtocolArg::Rmi, p == ProtocolArg::Tcm)?;
    }
    let protocol = mgr.open_device(&path)?;
    log::info!("Opened {} ({})", path, protocol);
    Ok(path)
}
