//! Error types for spidev connections

use spibus_core::settings::{BitOrder, ModeFlags};
use spibus_core::ConfigKey;
use thiserror::Error;

/// spidev connection errors
#[derive(Debug, Error)]
pub enum SpidevError {
    /// Failed to open device
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set SPI mode
    #[error("Failed to set SPI mode to 0x{:02X}: {source}", .mode.bits())]
    SetModeFailed {
        mode: ModeFlags,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set bit order
    #[error("Failed to set bit order to {order}: {source}")]
    SetBitOrderFailed {
        order: BitOrder,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set bits per word
    #[error("Failed to set bits per word to {bits}: {source}")]
    SetBitsPerWordFailed {
        bits: u8,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set clock speed
    #[error("Failed to set clock speed to {speed} Hz: {source}")]
    SetSpeedFailed {
        speed: u32,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read a setting back
    #[error("Failed to read {key} setting: {source}")]
    QueryFailed {
        key: ConfigKey,
        #[source]
        source: std::io::Error,
    },

    /// SPI transfer failed
    #[error("SPI transfer failed: {0}")]
    TransferFailed(#[source] std::io::Error),

    /// Failed to close device
    #[error("Failed to close device: {0}")]
    CloseFailed(#[source] std::io::Error),

    /// Operation on a closed connection
    #[error("Connection is closed")]
    Closed,

    /// Argument rejected before reaching the device
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] spibus_core::Error),

    /// Invalid option value
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Device not specified
    #[error("No device specified. Use dev=/dev/spidevX.Y or bus=X,cs=Y")]
    NoDevice,
}

impl SpidevError {
    /// Raw OS error code of a failed device operation, if any
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::OpenFailed { source, .. }
            | Self::SetModeFailed { source, .. }
            | Self::SetBitOrderFailed { source, .. }
            | Self::SetBitsPerWordFailed { source, .. }
            | Self::SetSpeedFailed { source, .. }
            | Self::QueryFailed { source, .. }
            | Self::TransferFailed(source)
            | Self::CloseFailed(source) => source.raw_os_error(),
            Self::Closed
            | Self::InvalidArgument(_)
            | Self::InvalidParameter(_)
            | Self::NoDevice => None,
        }
    }
}

/// Result type for spidev operations
pub type Result<T> = std::result::Result<T, SpidevError>;
