//! CLI argument parsing

use crate::drivers;
use clap::{Parser, Subcommand};

/// Parse a string as a hex or decimal u32
pub fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a byte string written as hex
///
/// Bytes may be separated by spaces, commas or colons, and may carry a `0x`
/// prefix ("9f 00 00", "0x9f,0x00", "9f0000").
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();

    for token in s.split(|c: char| c.is_whitespace() || c == ',' || c == ':') {
        if token.is_empty() {
            continue;
        }
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        if digits.is_empty() || digits.len() % 2 != 0 {
            return Err(format!("Invalid hex byte string: '{}'", token));
        }
        for i in (0..digits.len()).step_by(2) {
            let pair = digits
                .get(i..i + 2)
                .ok_or_else(|| format!("Invalid hex byte string: '{}'", token))?;
            let byte = u8::from_str_radix(pair, 16)
                .map_err(|e| format!("Invalid hex byte '{}': {}", pair, e))?;
            bytes.push(byte);
        }
    }

    if bytes.is_empty() {
        return Err("No data bytes given".to_string());
    }
    Ok(bytes)
}

/// Data bytes given on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

fn parse_data(s: &str) -> Result<HexBytes, String> {
    parse_hex_bytes(s).map(HexBytes)
}

/// Generate dynamic help text for the driver argument
fn driver_help() -> String {
    format!(
        "Driver to use, with options as name:key=value,... [available: {}]",
        drivers::driver_names_short()
    )
}

#[derive(Parser)]
#[command(name = "spibus")]
#[command(author, version, about = "Linux spidev SPI tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings written before a transfer, overriding the driver options
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SettingArgs {
    /// SPI clock mode (0-3)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=3))]
    pub mode: Option<u8>,

    /// Clock speed in Hz (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = parse_hex_u32)]
    pub speed: Option<u32>,

    /// Bits per word
    #[arg(long)]
    pub bits: Option<u8>,

    /// Shift the least significant bit first
    #[arg(long)]
    pub lsb_first: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Exchange bytes with a device
    Transfer {
        /// Driver to use
        #[arg(short, long, help = driver_help())]
        driver: String,

        /// Bytes to send, in hex (e.g. "9f 00 00")
        #[arg(value_parser = parse_data)]
        data: HexBytes,

        #[command(flatten)]
        settings: SettingArgs,

        /// Delay after the last bit, in microseconds
        #[arg(long, default_value_t = 0)]
        delay_us: u64,

        /// Send the data, then read this many bytes (half duplex)
        #[arg(short, long)]
        read: Option<usize>,
    },

    /// Show the driver's current settings
    Info {
        /// Driver to use
        #[arg(short, long, help = driver_help())]
        driver: String,
    },

    /// Write settings to a device
    Configure {
        /// Driver to use
        #[arg(short, long, help = driver_help())]
        driver: String,

        /// Settings as key=value (keys: mode, bits, speed, order, or 0-3)
        #[arg(required = true)]
        settings: Vec<String>,
    },

    /// List available drivers
    ListDrivers,
}
