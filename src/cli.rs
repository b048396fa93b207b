//! CLI argument parsing

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

fn parse_hex_u16(s: &str) -> Result<u16, String> {
    let v = parse_hex_u32(s)?;
    u16::try_from(v).map_err(|_| format!("Value out of range: {}", s))
}

fn parse_hex_u8(s: &str) -> Result<u8, String> {
    let v = parse_hex_u32(s)?;
    u8::try_from(v).map_err(|_| format!("Value out of range: {}", s))
}

/// Parse a byte string like "01,02,ff" or "0102ff"
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let digits: String = s
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | ':'))
        .collect();
    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("Invalid hex digits: {}", s));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("Odd number of hex digits: {}", s));
    }
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair).map_err(|e| e.to_string())?;
            u8::from_str_radix(pair, 16).map_err(|e| format!("Invalid hex byte: {}", e))
        })
        .collect()
}

/// Generate dynamic help text for the device argument
fn device_help() -> String {
    let names: Vec<&str> = synadiag_session::available_devices()
        .iter()
        .map(|d| d.name)
        .collect();
    format!(
        "Device to open, found automatically when omitted [available: {}]",
        names.join(", ")
    )
}

#[derive(Parser)]
#[command(name = "synadiag")]
#[command(author, version, about = "Synaptics touch controller diagnostics", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Session configuration file (TOML format)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = device_help())]
    pub device: Option<String>,

    /// Protocol of the device when its name does not imply one
    #[arg(short, long, global = true, value_enum)]
    pub protocol: Option<ProtocolArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProtocolArg {
    Rmi,
    Tcm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    Read,
    Write,
}

/// Stream options shared by the image commands
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct StreamArgs {
    /// Keep touch reporting enabled while streaming
    #[arg(long)]
    pub enable_touch: bool,

    /// Keep the controller out of doze while streaming
    #[arg(long)]
    pub no_sleep: bool,

    /// Rezero the baseline before streaming
    #[arg(long)]
    pub rezero: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List supported device kinds
    ListDevices,

    /// Look for a device among the configured candidates
    Find,

    /// Show controller identification
    Identify,

    /// Capture report images
    Image {
        /// Report type to capture
        #[arg(short = 't', long, value_parser = parse_hex_u8)]
        report_type: u8,

        /// Number of frames to capture
        #[arg(short = 'n', long, default_value_t = 1)]
        frames: u32,

        /// Put the larger dimension first
        #[arg(short, long)]
        landscape: bool,

        /// Stream the report instead of enabling it per frame
        #[arg(long)]
        stream: bool,

        #[command(flatten)]
        stream_args: StreamArgs,

        /// Write frames as CSV to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a production test
    Test {
        /// Test id (RMI report type or TCM test id)
        #[arg(value_parser = parse_hex_u32)]
        id: u32,

        /// Limits file (TOML format, `min` and `max`)
        #[arg(short, long)]
        limits: PathBuf,

        /// Write the result as CSV to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run the extended high-resistance test
    Hires {
        /// Limits file (TOML format, `reference`, `surface`, `tx_roe`, `rx_roe`)
        #[arg(short, long)]
        limits: PathBuf,
    },

    /// Run the TRX short test with extended pin confirmation
    TrxShort {
        /// Limits file (TOML format, `min` as expected bits, `delta`)
        #[arg(short, long)]
        limits: PathBuf,
    },

    /// Raw register (RMI) or packet (TCM) access
    Raw {
        /// Transfer direction
        #[arg(value_enum)]
        direction: DirectionArg,

        /// Register address (RMI) or command code (TCM)
        #[arg(value_parser = parse_hex_u16)]
        addr: u16,

        /// Bytes to send, hex encoded ("01,02,ff" or "0102ff")
        #[arg(long)]
        data: Option<String>,

        /// Bytes to read back
        #[arg(short = 'n', long, value_parser = parse_hex_u32, default_value = "0")]
        length: u32,
    },

    /// Dump the firmware configuration
    Config {
        /// Output file (hex dump to stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print finger events
    Touch {
        /// Number of frames to read
        #[arg(short = 'n', long, default_value_t = 100)]
        frames: u32,

        /// Maximum fingers per frame
        #[arg(short, long, default_value_t = 10)]
        max_fingers: usize,
    },

    /// Select the sensing-frequency gear
    Gear {
        gear: u8,
    },

    /// Soft reset the controller
    Reset,

    /// Read flash contents to file
    FlashRead {
        /// First block
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        block: u32,

        /// Bytes to read
        #[arg(short = 'n', long, value_parser = parse_hex_u32)]
        length: u32,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Write a file to flash
    FlashWrite {
        /// First block
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        block: u32,

        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Erase flash blocks
    FlashErase {
        /// First block
        #[arg(short, long, value_parser = parse_hex_u32, default_value = "0")]
        block: u32,

        /// Number of blocks
        #[arg(short = 'n', long, value_parser = parse_hex_u32)]
        count: u32,

        /// Use the 16-bit erase payload
        #[arg(long)]
        wide: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_hex_u32("0x10"), Ok(16));
        assert_eq!(parse_hex_u32("10"), Ok(10));
        assert!(parse_hex_u8("0x100").is_err());
        assert_eq!(parse_hex_u16("0xFFFF"), Ok(0xFFFF));
    }

    #[test]
    fn test_parse_bytes() {
        assert_eq!(parse_hex_bytes("01,02,ff"), Ok(vec![1, 2, 0xFF]));
        assert_eq!(parse_hex_bytes("0x0102"), Ok(vec![1, 2]));
        assert!(parse_hex_bytes("012").is_err());
        assert!(parse_hex_bytes("aéa").is_err());
        assert!(parse_hex_bytes("0g").is_err());
    }

    #[test]
    fn test_parse_test_command() {
        let cli = Cli::parse_from([
            "synadiag", "-d", "dummy-rmi", "test", "0x14", "--limits", "l.toml",
        ]);
        assert_eq!(cli.device.as_deref(), Some("dummy-rmi"));
        match cli.command {
            Commands::Test { id, .. } => assert_eq!(id, 20),
            _ => panic!("wrong command"),
        }
    }
}
