//! Connection settings
//!
//! spidev exposes four per-device parameters: clock mode, bit order, word
//! size and maximum clock speed. [`Setting`] carries one of them with a
//! value already narrowed to the width the kernel reads; [`Settings`] is the
//! set of last successfully written values a connection caches.

use crate::error::{Error, Result};
use bitflags::bitflags;
use core::fmt;

/// Configuration dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    /// Clock mode and mode flags
    Mode,
    /// Bits per word
    Bits,
    /// Maximum clock speed in Hz
    Speed,
    /// Bit order (MSB or LSB first)
    Order,
}

impl ConfigKey {
    /// All keys, in raw key order
    pub const ALL: [ConfigKey; 4] = [Self::Mode, Self::Bits, Self::Speed, Self::Order];

    /// Convert a raw integer key
    pub const fn from_raw(key: i32) -> Result<Self> {
        match key {
            0 => Ok(Self::Mode),
            1 => Ok(Self::Bits),
            2 => Ok(Self::Speed),
            3 => Ok(Self::Order),
            _ => Err(Error::UnknownKey(key)),
        }
    }

    /// Raw integer key
    pub const fn raw(self) -> i32 {
        match self {
            Self::Mode => 0,
            Self::Bits => 1,
            Self::Speed => 2,
            Self::Order => 3,
        }
    }

    /// Look a key up by its option name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "mode" => Some(Self::Mode),
            "bits" | "bits_per_word" => Some(Self::Bits),
            "speed" | "speed_hz" => Some(Self::Speed),
            "order" | "bit_order" => Some(Self::Order),
            _ => None,
        }
    }

    /// Option name of this key
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mode => "mode",
            Self::Bits => "bits",
            Self::Speed => "speed",
            Self::Order => "order",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// spidev mode byte (`SPI_IOC_WR_MODE`)
    ///
    /// The low two bits select the clock mode; the rest are controller
    /// options that only some drivers honour.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ModeFlags: u8 {
        /// Clock phase: sample on the trailing edge
        const CPHA       = 0x01;
        /// Clock polarity: clock idles high
        const CPOL       = 0x02;
        /// Chip select is active high
        const CS_HIGH    = 0x04;
        /// Shift least significant bit first
        const LSB_FIRST  = 0x08;
        /// Shared MOSI/MISO line
        const THREE_WIRE = 0x10;
        /// Internal loopback
        const LOOP       = 0x20;
        /// No chip select
        const NO_CS      = 0x40;
        /// Slave pulls low to pause
        const READY      = 0x80;
    }
}

impl Default for ModeFlags {
    fn default() -> Self {
        ModeFlags::empty()
    }
}

impl ModeFlags {
    /// SPI mode 0: CPOL=0, CPHA=0
    pub const MODE_0: Self = Self::empty();
    /// SPI mode 1: CPOL=0, CPHA=1
    pub const MODE_1: Self = Self::CPHA;
    /// SPI mode 2: CPOL=1, CPHA=0
    pub const MODE_2: Self = Self::CPOL;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: Self = Self::CPOL.union(Self::CPHA);

    /// Flags for clock mode 0-3, or `None` if out of range
    pub const fn from_clock_mode(mode: u8) -> Option<Self> {
        match mode {
            0 => Some(Self::MODE_0),
            1 => Some(Self::MODE_1),
            2 => Some(Self::MODE_2),
            3 => Some(Self::MODE_3),
            _ => None,
        }
    }

    /// Clock mode number (0-3) encoded by CPOL and CPHA
    pub const fn clock_mode(self) -> u8 {
        self.bits() & 0x03
    }
}

/// Bit order on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BitOrder {
    /// Most significant bit first (spidev default)
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

impl BitOrder {
    /// Interpret a raw `SPI_IOC_WR_LSB_FIRST` byte: any nonzero value selects LSB first
    pub const fn from_raw(value: u8) -> Self {
        if value == 0 {
            Self::MsbFirst
        } else {
            Self::LsbFirst
        }
    }

    /// Raw byte written to the driver
    pub const fn raw(self) -> u8 {
        match self {
            Self::MsbFirst => 0,
            Self::LsbFirst => 1,
        }
    }
}

impl fmt::Display for BitOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MsbFirst => write!(f, "MSB first"),
            Self::LsbFirst => write!(f, "LSB first"),
        }
    }
}

/// One configuration value, narrowed to its wire width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    /// Mode byte
    Mode(ModeFlags),
    /// Bits per word (0 means the driver default of 8)
    BitsPerWord(u8),
    /// Maximum clock speed in Hz
    SpeedHz(u32),
    /// Bit order
    Order(BitOrder),
}

impl Setting {
    /// Build a setting from the untyped integer interface
    ///
    /// Unknown keys are rejected; values are truncated to the key's width
    /// (8 bits for mode, bits and order, 32 bits for speed), never rejected.
    pub fn from_raw(key: i32, value: i64) -> Result<Self> {
        Ok(Self::narrow(ConfigKey::from_raw(key)?, value))
    }

    /// Truncate `value` to the width of `key`
    pub fn narrow(key: ConfigKey, value: i64) -> Self {
        match key {
            ConfigKey::Mode => Self::Mode(ModeFlags::from_bits_retain(value as u8)),
            ConfigKey::Bits => Self::BitsPerWord(value as u8),
            ConfigKey::Speed => Self::SpeedHz(value as u32),
            ConfigKey::Order => Self::Order(BitOrder::from_raw(value as u8)),
        }
    }

    /// The key this setting configures
    pub const fn key(&self) -> ConfigKey {
        match self {
            Self::Mode(_) => ConfigKey::Mode,
            Self::BitsPerWord(_) => ConfigKey::Bits,
            Self::SpeedHz(_) => ConfigKey::Speed,
            Self::Order(_) => ConfigKey::Order,
        }
    }

    /// The value as written to the driver, widened to `u32`
    pub const fn raw_value(&self) -> u32 {
        match self {
            Self::Mode(mode) => mode.bits() as u32,
            Self::BitsPerWord(bits) => *bits as u32,
            Self::SpeedHz(speed) => *speed,
            Self::Order(order) => order.raw() as u32,
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mode(mode) => write!(
                f,
                "mode {} (0x{:02X})",
                mode.clock_mode(),
                mode.bits()
            ),
            Self::BitsPerWord(bits) => write!(f, "{} bits per word", bits),
            Self::SpeedHz(speed) => write!(f, "{} Hz", speed),
            Self::Order(order) => write!(f, "{}", order),
        }
    }
}

/// Last successfully written configuration of a connection
///
/// A fresh connection starts zeroed: a zero speed or word size in a
/// transfer descriptor tells the driver to use its device-wide value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settings {
    /// Mode byte
    pub mode: ModeFlags,
    /// Bits per word
    pub bits_per_word: u8,
    /// Clock speed in Hz
    pub speed_hz: u32,
    /// Bit order
    pub bit_order: BitOrder,
}

impl Settings {
    /// Record a successfully written setting
    pub fn apply(&mut self, setting: Setting) {
        match setting {
            Setting::Mode(mode) => self.mode = mode,
            Setting::BitsPerWord(bits) => self.bits_per_word = bits,
            Setting::SpeedHz(speed) => self.speed_hz = speed,
            Setting::Order(order) => self.bit_order = order,
        }
    }

    /// Current cached value for `key`
    pub fn get(&self, key: ConfigKey) -> Setting {
        match key {
            ConfigKey::Mode => Setting::Mode(self.mode),
            ConfigKey::Bits => Setting::BitsPerWord(self.bits_per_word),
            ConfigKey::Speed => Setting::SpeedHz(self.speed_hz),
            ConfigKey::Order => Setting::Order(self.bit_order),
        }
    }
}
