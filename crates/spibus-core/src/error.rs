//! Error types for spibus-core
//!
//! Everything here is `Copy` and `no_std` compatible. Argument errors are
//! raised before any device-control call is attempted; `Errno` carries the
//! raw operating system code returned by a control call.

use core::fmt;

/// Argument validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Transmit buffer is empty
    EmptyTxBuffer,
    /// Receive buffer is empty
    EmptyRxBuffer,
    /// Transmit and receive buffers differ in length
    LengthMismatch {
        /// Transmit buffer length
        tx: usize,
        /// Receive buffer length
        rx: usize,
    },
    /// Buffer does not fit the 32-bit length field
    TransferTooLong {
        /// Requested length in bytes
        len: usize,
    },
    /// Delay does not fit the 16-bit microsecond field
    DelayOutOfRange {
        /// Requested delay in whole microseconds
        micros: u64,
    },
    /// More segments than a single message can carry
    TooManySegments {
        /// Requested segment count
        count: usize,
    },
    /// Configuration key is not one of mode, bits, speed or order
    UnknownKey(i32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyTxBuffer => write!(f, "transmit buffer is empty"),
            Self::EmptyRxBuffer => write!(f, "receive buffer is empty"),
            Self::LengthMismatch { tx, rx } => write!(
                f,
                "transmit and receive buffers differ in length ({} vs {} bytes)",
                tx, rx
            ),
            Self::TransferTooLong { len } => {
                write!(f, "transfer of {} bytes exceeds the 32-bit length field", len)
            }
            Self::DelayOutOfRange { micros } => write!(
                f,
                "delay of {} us exceeds the maximum of {} us",
                micros,
                u16::MAX
            ),
            Self::TooManySegments { count } => write!(
                f,
                "{} segments exceed the maximum of {} per message",
                count,
                u8::MAX
            ),
            Self::UnknownKey(key) => write!(f, "unknown configuration key: {}", key),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;

/// Raw operating system error number returned by a control call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(pub i32);

impl Errno {
    /// Bad file descriptor
    pub const EBADF: Self = Self(9);
    /// Invalid argument
    pub const EINVAL: Self = Self(22);
    /// Inappropriate ioctl for device
    pub const ENOTTY: Self = Self(25);
    /// Message too long
    pub const EMSGSIZE: Self = Self(90);

    /// The raw error number
    pub const fn raw(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "os error {}", self.0)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Errno {}

#[cfg(feature = "std")]
impl From<Errno> for std::io::Error {
    fn from(errno: Errno) -> Self {
        std::io::Error::from_raw_os_error(errno.0)
    }
}
