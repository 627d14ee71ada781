//! Driver registration and dispatch
//!
//! A driver string names a backend and its options, e.g.
//! `spidev:bus=0,cs=1,spispeed=1000` or `dummy:fill=0xA5`. Every backend
//! opens into the same `Connection` over a boxed `ControlDevice`.

use spibus_core::device::ControlDevice;
use spibus_linux::Connection;
use std::collections::HashMap;
use thiserror::Error;

/// A connection to any driver
pub type DriverConnection = Connection<Box<dyn ControlDevice>>;

/// Information about a driver
pub struct DriverInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available drivers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_drivers() -> Vec<DriverInfo> {
    let mut drivers = Vec::new();

    #[cfg(feature = "spidev")]
    drivers.push(DriverInfo {
        name: "spidev",
        aliases: &["linux_spi", "linux-spi"],
        description: "Linux spidev interface (dev=/dev/spidevX.Y or bus=X,cs=Y; spispeed=<kHz>,mode=<0-3>,bits=<n>,lsb=<0|1>)",
    });

    #[cfg(feature = "dummy")]
    drivers.push(DriverInfo {
        name: "dummy",
        aliases: &[],
        description: "In-memory spidev emulator, loopback by default (fill=<byte>,bufsiz=<bytes>)",
    });

    drivers
}

/// Generate a short list of driver names for CLI help
pub fn driver_names_short() -> String {
    let drivers = available_drivers();
    let names: Vec<&str> = drivers.iter().map(|d| d.name).collect();
    names.join(", ")
}

/// Look up a driver by name or alias
pub fn find_driver(name: &str) -> Option<DriverInfo> {
    available_drivers()
        .into_iter()
        .find(|d| d.name == name || d.aliases.contains(&name))
}

/// Driver selection errors
#[derive(Debug, Error)]
pub enum DriverError {
    /// No compiled-in driver has this name
    #[error("Unknown driver: {0} (available: {1})")]
    UnknownDriver(String, String),

    /// Malformed driver string or option value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Opening or configuring the device failed
    #[error(transparent)]
    Spidev(#[from] spibus_linux::SpidevError),
}

/// Parsed driver string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverParams {
    /// Driver name
    pub name: String,
    /// Options
    pub params: HashMap<String, String>,
}

impl DriverParams {
    /// Options as borrowed pairs, in a stable order
    pub fn options(&self) -> Vec<(&str, &str)> {
        let mut options: Vec<(&str, &str)> = self
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        options.sort_unstable();
        options
    }
}

/// Parse a driver string of the form `name` or `name:key=value,...`
pub fn parse_driver_params(s: &str) -> Result<DriverParams, DriverError> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(DriverError::InvalidParameter(format!(
                    "Invalid parameter format: '{}' (expected key=value)",
                    opt
                )));
            }
        }
    }

    Ok(DriverParams {
        name: name.to_string(),
        params,
    })
}

/// Open a driver and wrap it in a connection
///
/// Settings given as driver options are written before this returns.
pub fn open_driver(driver: &str) -> Result<DriverConnection, DriverError> {
    let params = parse_driver_params(driver)?;
    let info = find_driver(&params.name).ok_or_else(|| {
        DriverError::UnknownDriver(params.name.clone(), driver_names_short())
    })?;

    log::debug!("Opening driver {}", info.name);

    match info.name {
        #[cfg(feature = "spidev")]
        "spidev" => open_spidev(&params),

        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),

        _ => Err(DriverError::UnknownDriver(
            params.name.clone(),
            driver_names_short(),
        )),
    }
}

#[cfg(feature = "spidev")]
fn open_spidev(params: &DriverParams) -> Result<DriverConnection, DriverError> {
    let config = spibus_linux::parse_options(&params.options())?;
    let file = spibus_linux::SpidevFile::open(&config.device)?;

    let device: Box<dyn ControlDevice> = Box::new(file);
    let mut conn = Connection::new(device);
    conn.apply(&config)?;

    log::info!("spidev: Opened {}", config.device.display());
    Ok(conn)
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &DriverParams) -> Result<DriverConnection, DriverError> {
    use spibus_dummy::{DummyConfig, DummyDevice, Response};

    let mut config = DummyConfig::default();
    for (key, value) in params.options() {
        match key {
            "fill" => {
                let byte = crate::cli::parse_hex_u32(value)
                    .ok()
                    .and_then(|v| u8::try_from(v).ok())
                    .ok_or_else(|| {
                        DriverError::InvalidParameter(format!("Invalid fill byte: {}", value))
                    })?;
                config.response = Response::Fill(byte);
            }
            "bufsiz" => {
                config.buf_size = value.parse().map_err(|_| {
                    DriverError::InvalidParameter(format!("Invalid bufsiz: {}", value))
                })?;
            }
            _ => log::warn!("dummy: Unknown option: {}={}", key, value),
        }
    }

    let device: Box<dyn ControlDevice> = Box::new(DummyDevice::new(config));
    Ok(Connection::new(device))
}
