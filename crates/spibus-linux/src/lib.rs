//! spibus-linux - Linux spidev connections
//!
//! This crate talks to SPI devices through the Linux spidev driver, which
//! exposes each bus/chip-select pair as a character device at
//! `/dev/spidevX.Y`.
//!
//! # Example
//!
//! ```no_run
//! use spibus_linux::{Connection, SpidevConfig};
//! use spibus_core::settings::{ModeFlags, Setting};
//! use std::time::Duration;
//!
//! // Open bus 0, chip select 1
//! let mut spi = Connection::open(0, 1)?;
//! spi.configure(Setting::Mode(ModeFlags::MODE_0))?;
//! spi.configure(Setting::SpeedHz(500_000))?;
//!
//! let tx = [0x01, 0x02, 0x03];
//! let mut rx = [0u8; 3];
//! spi.transfer(&tx, &mut rx, Duration::ZERO)?;
//! println!("Received: {:02X?}", rx);
//! spi.close()?;
//!
//! // Or with settings applied at open
//! let config = SpidevConfig::new("/dev/spidev0.0")
//!     .with_speed(4_000_000)
//!     .with_mode(ModeFlags::MODE_3);
//! let mut spi = Connection::open_with(&config)?;
//! let mut id = [0u8; 3];
//! spi.write_then_read(&[0x9F], &mut id)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support enabled (`CONFIG_SPI_SPIDEV`)
//! - Read/write access to `/dev/spidevX.Y` device
//! - May require adding user to `spi` group or using udev rules

pub mod config;
pub mod connection;
pub mod device;
pub mod error;

// Re-exports
pub use config::{parse_options, SpidevConfig};
pub use connection::Connection;
pub use device::{kernel_buf_size, spidev_path, SpidevFile};
pub use error::{Result, SpidevError};

/// Open a spidev connection from driver options
///
/// This is a convenience function for use in the CLI driver dispatch.
///
/// # Example Options
///
/// - `dev=/dev/spidev0.0` - device path, or `bus=0,cs=0`
/// - `spispeed=4000` - Optional: speed in kHz
/// - `mode=0` - Optional: SPI mode 0-3
pub fn open_spidev(options: &[(&str, &str)]) -> Result<Connection<SpidevFile>> {
    let config = parse_options(options)?;
    Connection::open_with(&config)
}
