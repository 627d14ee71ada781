//! Device-control collaborator
//!
//! A connection never talks to the operating system directly. It hands an
//! encoded request code and a typed argument to a [`ControlDevice`], which is
//! either the real spidev file or an in-memory stand-in.

use crate::error::Errno;
use crate::ioctl::IoctlCode;
use crate::transfer::Segment;

/// Argument of one control call
///
/// Each variant corresponds to the pointer the kernel would receive: a
/// scalar to read from, a scalar to fill in, or an array of transfer
/// descriptors whose buffers are still borrowed from the caller.
#[derive(Debug)]
pub enum ControlArg<'a, 'b> {
    /// Byte read by the driver
    WriteU8(&'a u8),
    /// 32-bit value read by the driver
    WriteU32(&'a u32),
    /// Byte filled in by the driver
    ReadU8(&'a mut u8),
    /// 32-bit value filled in by the driver
    ReadU32(&'a mut u32),
    /// Transfer descriptors for `SPI_IOC_MESSAGE`
    Message(&'a mut [Segment<'b>]),
}

/// An open device accepting control calls
///
/// Implementations are blocking: `control` returns once the operation has
/// completed or failed. A failed call must not have partially applied.
pub trait ControlDevice {
    /// Issue one control call
    fn control(&mut self, code: IoctlCode, arg: ControlArg<'_, '_>) -> Result<(), Errno>;

    /// Release the device
    ///
    /// Called at most once by a connection. Later `control` calls may fail
    /// with [`Errno::EBADF`].
    fn close(&mut self) -> Result<(), Errno>;
}

impl<D: ControlDevice + ?Sized> ControlDevice for &mut D {
    fn control(&mut self, code: IoctlCode, arg: ControlArg<'_, '_>) -> Result<(), Errno> {
        (**self).control(code, arg)
    }

    fn close(&mut self) -> Result<(), Errno> {
        (**self).close()
    }
}

#[cfg(feature = "alloc")]
impl<D: ControlDevice + ?Sized> ControlDevice for alloc::boxed::Box<D> {
    fn control(&mut self, code: IoctlCode, arg: ControlArg<'_, '_>) -> Result<(), Errno> {
        (**self).control(code, arg)
    }

    fn close(&mut self) -> Result<(), Errno> {
        (**self).close()
    }
}
