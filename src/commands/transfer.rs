//! Transfer command

use crate::cli::SettingArgs;
use spibus_core::device::ControlDevice;
use spibus_core::settings::{BitOrder, ModeFlags, Setting};
use spibus_linux::Connection;
use std::time::Duration;

/// Format bytes as space-separated hex
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Write the settings given on the command line
fn apply_setting_args<D: ControlDevice>(
    conn: &mut Connection<D>,
    args: &SettingArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(mode) = args.mode {
        let flags = ModeFlags::from_clock_mode(mode)
            .ok_or_else(|| format!("Invalid SPI mode: {} (must be 0-3)", mode))?;
        conn.configure(Setting::Mode(flags))?;
    }
    if let Some(bits) = args.bits {
        conn.configure(Setting::BitsPerWord(bits))?;
    }
    if let Some(speed) = args.speed {
        conn.configure(Setting::SpeedHz(speed))?;
    }
    if args.lsb_first {
        conn.configure(Setting::Order(BitOrder::LsbFirst))?;
    }
    Ok(())
}

/// Send `data` and return the bytes received
///
/// Without `read`, the transfer is full duplex and returns as many bytes as
/// were sent. With `read`, `data` is written first and `read` bytes are
/// clocked in afterwards with chip select held.
pub fn run_transfer<D: ControlDevice>(
    conn: &mut Connection<D>,
    data: &[u8],
    settings: &SettingArgs,
    delay: Duration,
    read: Option<usize>,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    apply_setting_args(conn, settings)?;

    log::debug!("TX: {}", format_hex(data));

    let rx = match read {
        Some(len) => {
            let mut rx = vec![0u8; len];
            conn.write_then_read(data, &mut rx)?;
            rx
        }
        None => {
            let mut rx = vec![0u8; data.len()];
            conn.transfer(data, &mut rx, delay)?;
            rx
        }
    };

    Ok(rx)
}
