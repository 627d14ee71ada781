//! Configure command

use crate::cli::parse_hex_u32;
use spibus_core::device::ControlDevice;
use spibus_core::settings::ConfigKey;
use spibus_linux::Connection;

/// Parse `key=value` into a raw key and value
///
/// The key is a name (`mode`, `bits`, `speed`, `order`) or a raw number.
/// Raw numbers outside 0-3 are passed through and rejected when written.
pub fn parse_setting(s: &str) -> Result<(i32, i64), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Invalid setting: '{}' (expected key=value)", s))?;

    let key = match ConfigKey::from_name(key) {
        Some(key) => key.raw(),
        None => key
            .parse::<i32>()
            .map_err(|_| format!("Unknown setting: {}", key))?,
    };
    let value = parse_hex_u32(value)?;

    Ok((key, value as i64))
}

/// Write each setting in order, stopping at the first failure
pub fn run_configure<D: ControlDevice>(
    conn: &mut Connection<D>,
    settings: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    for s in settings {
        let (key, value) = parse_setting(s)?;
        conn.configure_raw(key, value)?;

        let key = ConfigKey::from_raw(key)?;
        println!("Set {}", conn.settings().get(key));
    }
    Ok(())
}
