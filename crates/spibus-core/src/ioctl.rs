//! ioctl request code construction
//!
//! A Linux ioctl request is one integer with four packed fields, least
//! significant first: command number, type (the driver's "magic"), argument
//! size in bytes and transfer direction. The widths and the direction values
//! differ between architecture families, so they are described by an
//! [`IoctlLayout`] instead of being hard coded.
//!
//! ```text
//!  GENERIC   | dir:2 | size:14 | type:8 | nr:8 |
//!  WIDE_DIR  | dir:3 | size:13 | type:8 | nr:8 |
//! ```

use core::fmt;

/// Transfer direction of an ioctl argument, seen from userspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// No argument
    None,
    /// Kernel writes the argument (`_IOR`)
    Read,
    /// Kernel reads the argument (`_IOW`)
    Write,
    /// Both (`_IOWR`)
    ReadWrite,
}

/// Bit layout of ioctl request codes for one architecture family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoctlLayout {
    /// Width of the command number field
    pub nr_bits: u32,
    /// Width of the type field
    pub type_bits: u32,
    /// Width of the argument size field
    pub size_bits: u32,
    /// Width of the direction field
    pub dir_bits: u32,
    /// Direction value for [`Direction::None`]
    pub dir_none: u32,
    /// Direction value for [`Direction::Write`]
    pub dir_write: u32,
    /// Direction value for [`Direction::Read`]
    pub dir_read: u32,
}

impl IoctlLayout {
    /// asm-generic layout: x86, ARM, AArch64, RISC-V and most others
    pub const GENERIC: Self = Self {
        nr_bits: 8,
        type_bits: 8,
        size_bits: 14,
        dir_bits: 2,
        dir_none: 0,
        dir_write: 1,
        dir_read: 2,
    };

    /// 3-bit direction layout: MIPS, PowerPC and SPARC
    pub const WIDE_DIR: Self = Self {
        nr_bits: 8,
        type_bits: 8,
        size_bits: 13,
        dir_bits: 3,
        dir_none: 1,
        dir_write: 4,
        dir_read: 2,
    };

    /// Layout used by the architecture this crate is compiled for
    #[cfg(any(
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "powerpc",
        target_arch = "powerpc64",
        target_arch = "sparc",
        target_arch = "sparc64"
    ))]
    pub const NATIVE: Self = Self::WIDE_DIR;

    /// Layout used by the architecture this crate is compiled for
    #[cfg(not(any(
        target_arch = "mips",
        target_arch = "mips64",
        target_arch = "powerpc",
        target_arch = "powerpc64",
        target_arch = "sparc",
        target_arch = "sparc64"
    )))]
    pub const NATIVE: Self = Self::GENERIC;

    /// Shift of the command number field
    pub const fn nr_shift(&self) -> u32 {
        0
    }

    /// Shift of the type field
    pub const fn type_shift(&self) -> u32 {
        self.nr_shift() + self.nr_bits
    }

    /// Shift of the argument size field
    pub const fn size_shift(&self) -> u32 {
        self.type_shift() + self.type_bits
    }

    /// Shift of the direction field
    pub const fn dir_shift(&self) -> u32 {
        self.size_shift() + self.size_bits
    }

    /// Largest argument size the size field can hold
    pub const fn max_size(&self) -> u32 {
        mask(self.size_bits)
    }

    /// Raw direction field value for `dir`
    pub const fn dir_value(&self, dir: Direction) -> u32 {
        match dir {
            Direction::None => self.dir_none,
            Direction::Read => self.dir_read,
            Direction::Write => self.dir_write,
            Direction::ReadWrite => self.dir_read | self.dir_write,
        }
    }

    /// Pack the four fields into a request code
    ///
    /// Each input is masked to its field width, so a field never spills
    /// into its neighbour.
    pub const fn encode(&self, dir: Direction, ty: u8, nr: u8, size: u32) -> IoctlCode {
        let dir = self.dir_value(dir) & mask(self.dir_bits);
        let ty = ty as u32 & mask(self.type_bits);
        let nr = nr as u32 & mask(self.nr_bits);
        let size = size & mask(self.size_bits);

        IoctlCode(
            (dir << self.dir_shift())
                | (size << self.size_shift())
                | (ty << self.type_shift())
                | (nr << self.nr_shift()),
        )
    }

    /// Split a request code back into its fields
    pub const fn decode(&self, code: IoctlCode) -> IoctlFields {
        let raw = code.0;
        let dir = (raw >> self.dir_shift()) & mask(self.dir_bits);

        let direction = if dir == self.dir_none {
            Some(Direction::None)
        } else if dir == self.dir_read {
            Some(Direction::Read)
        } else if dir == self.dir_write {
            Some(Direction::Write)
        } else if dir == self.dir_read | self.dir_write {
            Some(Direction::ReadWrite)
        } else {
            None
        };

        IoctlFields {
            direction,
            ty: ((raw >> self.type_shift()) & mask(self.type_bits)) as u8,
            nr: ((raw >> self.nr_shift()) & mask(self.nr_bits)) as u8,
            size: (raw >> self.size_shift()) & mask(self.size_bits),
        }
    }
}

const fn mask(bits: u32) -> u32 {
    if bits >= u32::BITS {
        u32::MAX
    } else {
        (1 << bits) - 1
    }
}

/// An encoded ioctl request code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IoctlCode(u32);

impl IoctlCode {
    /// Wrap a raw request code
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw request code
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for IoctlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

/// Fields of a decoded request code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoctlFields {
    /// Direction, or `None` if the raw value matches no direction
    pub direction: Option<Direction>,
    /// Type (driver magic)
    pub ty: u8,
    /// Command number
    pub nr: u8,
    /// Argument size in bytes
    pub size: u32,
}
