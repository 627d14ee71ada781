//! spibus-core - ioctl request encoding and spidev transfer descriptors
//!
//! This crate holds the parts of Linux spidev access that are pure
//! arithmetic: building ioctl request codes and laying out the
//! `spi_ioc_transfer` descriptor the kernel reads by offset. It performs no
//! I/O and is `no_std` compatible, so the same encoding can be checked on a
//! host without any SPI hardware.
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`)
//! - `alloc` - Enable `ControlDevice` for boxed devices
//!
//! # Example
//!
//! ```
//! use spibus_core::settings::ConfigKey;
//! use spibus_core::spidev::SpidevIoctls;
//! use spibus_core::ioctl::IoctlLayout;
//!
//! let table = SpidevIoctls::for_layout(IoctlLayout::GENERIC);
//! assert_eq!(table.write_code(ConfigKey::Mode).raw(), 0x4001_6B01);
//! assert_eq!(table.message_code(1).raw(), 0x4020_6B00);
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod device;
pub mod error;
pub mod ioctl;
pub mod settings;
pub mod spidev;
pub mod transfer;

pub use device::{ControlArg, ControlDevice};
pub use error::{Errno, Error, Result};
pub use ioctl::{Direction, IoctlCode, IoctlLayout};
pub use settings::{BitOrder, ConfigKey, ModeFlags, Setting, Settings};
pub use spidev::{SpidevIoctls, SPIDEV};
pub use transfer::{Segment, TransferDescriptor};
