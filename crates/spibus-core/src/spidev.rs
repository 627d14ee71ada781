//! spidev ioctl table
//!
//! Every number the spidev ioctl interface depends on lives in
//! [`SpidevIoctls`]: the code layout, the `'k'` type, the command number and
//! argument size of each setting, and the descriptor size that scales the
//! message request. [`SPIDEV`] is the table for the compiled architecture.

use crate::ioctl::{Direction, IoctlCode, IoctlLayout};
use crate::settings::ConfigKey;
use crate::transfer::DESCRIPTOR_SIZE;

/// spidev request numbers for one ioctl layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpidevIoctls {
    /// Request code layout
    pub layout: IoctlLayout,
    /// ioctl type shared by all spidev requests (`SPI_IOC_MAGIC`)
    pub magic: u8,
    /// Command number of `SPI_IOC_MESSAGE`
    pub nr_message: u8,
    /// Command number of the mode byte
    pub nr_mode: u8,
    /// Command number of the LSB-first flag
    pub nr_lsb_first: u8,
    /// Command number of bits per word
    pub nr_bits_per_word: u8,
    /// Command number of the maximum clock speed
    pub nr_max_speed_hz: u8,
    /// Size in bytes of one transfer descriptor
    pub descriptor_size: u32,
}

/// spidev table for the architecture this crate is compiled for
pub const SPIDEV: SpidevIoctls = SpidevIoctls::for_layout(IoctlLayout::NATIVE);

impl SpidevIoctls {
    /// spidev numbering under `layout`
    pub const fn for_layout(layout: IoctlLayout) -> Self {
        Self {
            layout,
            magic: b'k',
            nr_message: 0,
            nr_mode: 1,
            nr_lsb_first: 2,
            nr_bits_per_word: 3,
            nr_max_speed_hz: 4,
            descriptor_size: DESCRIPTOR_SIZE as u32,
        }
    }

    /// Command number and argument size of a setting
    pub const fn command(&self, key: ConfigKey) -> (u8, u32) {
        match key {
            ConfigKey::Mode => (self.nr_mode, 1),
            ConfigKey::Order => (self.nr_lsb_first, 1),
            ConfigKey::Bits => (self.nr_bits_per_word, 1),
            ConfigKey::Speed => (self.nr_max_speed_hz, 4),
        }
    }

    /// Request code that writes a setting (`SPI_IOC_WR_*`)
    pub const fn write_code(&self, key: ConfigKey) -> IoctlCode {
        let (nr, size) = self.command(key);
        self.layout.encode(Direction::Write, self.magic, nr, size)
    }

    /// Request code that reads a setting back (`SPI_IOC_RD_*`)
    pub const fn read_code(&self, key: ConfigKey) -> IoctlCode {
        let (nr, size) = self.command(key);
        self.layout.encode(Direction::Read, self.magic, nr, size)
    }

    /// Request code of a zero-length message
    pub const fn message_base(&self) -> IoctlCode {
        self.layout
            .encode(Direction::Write, self.magic, self.nr_message, 0)
    }

    /// Difference between the request codes of consecutive message counts
    pub const fn message_stride(&self) -> u32 {
        self.descriptor_size << self.layout.size_shift()
    }

    /// Request code submitting `count` descriptors (`SPI_IOC_MESSAGE(count)`)
    ///
    /// The count is carried in the size field, so the code is the base plus
    /// `count` strides. 255 descriptors are 8160 bytes, which fits the size
    /// field of every layout.
    pub const fn message_code(&self, count: u8) -> IoctlCode {
        IoctlCode::from_raw(self.message_base().raw() + count as u32 * self.message_stride())
    }

    /// Identify a setting request, returning its direction and key
    pub fn setting_for(&self, code: IoctlCode) -> Option<(Direction, ConfigKey)> {
        ConfigKey::ALL.into_iter().find_map(|key| {
            if code == self.write_code(key) {
                Some((Direction::Write, key))
            } else if code == self.read_code(key) {
                Some((Direction::Read, key))
            } else {
                None
            }
        })
    }

    /// Descriptor count of a message request, if `code` is one
    pub fn message_count(&self, code: IoctlCode) -> Option<u8> {
        let fields = self.layout.decode(code);
        if fields.direction != Some(Direction::Write)
            || fields.ty != self.magic
            || fields.nr != self.nr_message
            || fields.size % self.descriptor_size != 0
        {
            return None;
        }
        u8::try_from(fields.size / self.descriptor_size).ok()
    }
}
