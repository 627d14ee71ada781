//! Connection options
//!
//! `SpidevConfig` names a device node and the settings to apply right after
//! opening it. Settings left as `None` keep whatever the driver currently
//! uses.

use crate::device::spidev_path;
use crate::error::{Result, SpidevError};

use spibus_core::settings::{BitOrder, ModeFlags, Setting};
use std::path::PathBuf;

/// Configuration for opening a spidev connection
#[derive(Debug, Clone, Default)]
pub struct SpidevConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: PathBuf,
    /// SPI mode byte
    pub mode: Option<ModeFlags>,
    /// Bits per word
    pub bits_per_word: Option<u8>,
    /// SPI clock speed in Hz
    pub speed_hz: Option<u32>,
    /// Bit order
    pub bit_order: Option<BitOrder>,
}

impl SpidevConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Configuration for `/dev/spidev<bus>.<chip>`
    pub fn for_bus(bus: u32, chip: u32) -> Self {
        Self::new(spidev_path(bus, chip))
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = Some(speed_hz);
        self
    }

    /// Set the SPI mode byte
    pub fn with_mode(mut self, mode: ModeFlags) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set the word size
    pub fn with_bits_per_word(mut self, bits: u8) -> Self {
        self.bits_per_word = Some(bits);
        self
    }

    /// Set the bit order
    pub fn with_bit_order(mut self, order: BitOrder) -> Self {
        self.bit_order = Some(order);
        self
    }

    /// Settings to apply after open, in the order they are written
    pub fn settings(&self) -> Vec<Setting> {
        let mut settings = Vec::new();
        if let Some(mode) = self.mode {
            settings.push(Setting::Mode(mode));
        }
        if let Some(bits) = self.bits_per_word {
            settings.push(Setting::BitsPerWord(bits));
        }
        if let Some(speed) = self.speed_hz {
            settings.push(Setting::SpeedHz(speed));
        }
        if let Some(order) = self.bit_order {
            settings.push(Setting::Order(order));
        }
        settings
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| SpidevError::InvalidParameter(format!("Invalid {} value: {}", key, value)))
}

/// Parse connection options from a list of key-value pairs
///
/// Recognized keys:
///
/// - `dev=/dev/spidevX.Y` - device path
/// - `bus=X`, `cs=Y` - bus and chip select, used when `dev` is absent (cs defaults to 0)
/// - `spispeed=<kHz>` or `speed=<Hz>` - clock speed
/// - `mode=<0-3>` - clock mode
/// - `bits=<n>` - bits per word
/// - `lsb=<0|1>` - shift least significant bit first
pub fn parse_options(options: &[(&str, &str)]) -> Result<SpidevConfig> {
    let mut config = SpidevConfig::default();
    let mut bus: Option<u32> = None;
    let mut chip: u32 = 0;

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = PathBuf::from(value);
            }
            "bus" => {
                bus = Some(parse_number(key, value)?);
            }
            "cs" | "chip" => {
                chip = parse_number(key, value)?;
            }
            "spispeed" => {
                let speed_khz: u32 = parse_number(key, value)?;
                let speed_hz = speed_khz.checked_mul(1000).ok_or_else(|| {
                    SpidevError::InvalidParameter(format!("spispeed too large: {} kHz", speed_khz))
                })?;
                config.speed_hz = Some(speed_hz);
            }
            "speed" => {
                config.speed_hz = Some(parse_number(key, value)?);
            }
            "mode" => {
                let mode: u8 = parse_number(key, value)?;
                let flags = ModeFlags::from_clock_mode(mode).ok_or_else(|| {
                    SpidevError::InvalidParameter(format!(
                        "Invalid SPI mode: {} (must be 0-3)",
                        mode
                    ))
                })?;
                config.mode = Some(flags);
            }
            "bits" => {
                config.bits_per_word = Some(parse_number(key, value)?);
            }
            "lsb" => {
                let lsb = match *value {
                    "1" | "yes" | "true" => true,
                    "0" | "no" | "false" => false,
                    _ => {
                        return Err(SpidevError::InvalidParameter(format!(
                            "Invalid lsb value: {}",
                            value
                        )))
                    }
                };
                config.bit_order = Some(if lsb {
                    BitOrder::LsbFirst
                } else {
                    BitOrder::MsbFirst
                });
            }
            _ => {
                log::warn!("spidev: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.as_os_str().is_empty() {
        match bus {
            Some(bus) => config.device = spidev_path(bus, chip),
            None => return Err(SpidevError::NoDevice),
        }
    }

    Ok(config)
}
