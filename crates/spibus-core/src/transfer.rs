//! spidev transfer descriptors
//!
//! [`TransferDescriptor`] mirrors the kernel's `struct spi_ioc_transfer`
//! byte for byte. A [`Segment`] pairs one descriptor with the buffers it
//! describes; a message is a slice of segments submitted by one ioctl.
//!
//! The buffer address fields are left at zero here. Turning a borrowed
//! buffer into an address is the job of the adapter that issues the ioctl,
//! which reads the buffers back out of the segment right before the call.

use crate::error::{Error, Result};
use crate::settings::Settings;
use core::time::Duration;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// SPI transfer structure for `SPI_IOC_MESSAGE`
///
/// Must match the kernel's `struct spi_ioc_transfer` layout (32 bytes).
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
pub struct TransferDescriptor {
    /// Userspace address of the transmit buffer, or 0 to shift out zeros
    pub tx_buf: u64,
    /// Userspace address of the receive buffer, or 0 to discard input
    pub rx_buf: u64,
    /// Length of both buffers in bytes
    pub len: u32,
    /// Clock speed override in Hz (0 = device setting)
    pub speed_hz: u32,
    /// Delay after the last bit before the next transfer, in microseconds
    pub delay_usecs: u16,
    /// Word size override (0 = device setting)
    pub bits_per_word: u8,
    /// Deselect the device before the next transfer
    pub cs_change: u8,
    /// Bus width for transmit (0 or 1 = single)
    pub tx_nbits: u8,
    /// Bus width for receive (0 or 1 = single)
    pub rx_nbits: u8,
    /// Reserved, must be zero
    pub pad: u16,
}

/// Size of one descriptor on the wire
pub const DESCRIPTOR_SIZE: usize = core::mem::size_of::<TransferDescriptor>();

const _: () = assert!(DESCRIPTOR_SIZE == 32);

impl TransferDescriptor {
    /// Build a descriptor for `len` bytes using the cached connection settings
    pub fn new(len: usize, delay: Duration, settings: &Settings) -> Result<Self> {
        let len = u32::try_from(len).map_err(|_| Error::TransferTooLong { len })?;

        Ok(Self {
            len,
            speed_hz: settings.speed_hz,
            delay_usecs: delay_usecs(delay)?,
            bits_per_word: settings.bits_per_word,
            ..Default::default()
        })
    }
}

/// Convert a delay to whole microseconds for the 16-bit delay field
///
/// Sub-microsecond remainders are truncated. Delays longer than 65535 us
/// are rejected rather than wrapped.
pub fn delay_usecs(delay: Duration) -> Result<u16> {
    let micros = delay.as_micros();
    u16::try_from(micros).map_err(|_| Error::DelayOutOfRange {
        micros: u64::try_from(micros).unwrap_or(u64::MAX),
    })
}

/// One transfer of a message: a descriptor plus the buffers it refers to
#[derive(Debug)]
pub struct Segment<'a> {
    descriptor: TransferDescriptor,
    tx: Option<&'a [u8]>,
    rx: Option<&'a mut [u8]>,
}

impl<'a> Segment<'a> {
    /// Full-duplex transfer: clock out `tx` while clocking into `rx`
    ///
    /// Both buffers must be non-empty and of equal length.
    pub fn full_duplex(
        tx: &'a [u8],
        rx: &'a mut [u8],
        delay: Duration,
        settings: &Settings,
    ) -> Result<Self> {
        if tx.is_empty() {
            return Err(Error::EmptyTxBuffer);
        }
        if rx.is_empty() {
            return Err(Error::EmptyRxBuffer);
        }
        if tx.len() != rx.len() {
            return Err(Error::LengthMismatch {
                tx: tx.len(),
                rx: rx.len(),
            });
        }

        Ok(Self {
            descriptor: TransferDescriptor::new(tx.len(), delay, settings)?,
            tx: Some(tx),
            rx: Some(rx),
        })
    }

    /// Half-duplex write: received bits are discarded
    pub fn write(tx: &'a [u8], delay: Duration, settings: &Settings) -> Result<Self> {
        if tx.is_empty() {
            return Err(Error::EmptyTxBuffer);
        }

        Ok(Self {
            descriptor: TransferDescriptor::new(tx.len(), delay, settings)?,
            tx: Some(tx),
            rx: None,
        })
    }

    /// Half-duplex read: zeros are clocked out
    pub fn read(rx: &'a mut [u8], delay: Duration, settings: &Settings) -> Result<Self> {
        if rx.is_empty() {
            return Err(Error::EmptyRxBuffer);
        }

        Ok(Self {
            descriptor: TransferDescriptor::new(rx.len(), delay, settings)?,
            tx: None,
            rx: Some(rx),
        })
    }

    /// Deselect the device after this segment
    pub fn with_cs_change(mut self, cs_change: bool) -> Self {
        self.descriptor.cs_change = cs_change as u8;
        self
    }

    /// Override the clock speed for this segment only
    pub fn with_speed_hz(mut self, speed_hz: u32) -> Self {
        self.descriptor.speed_hz = speed_hz;
        self
    }

    /// Override the word size for this segment only
    pub fn with_bits_per_word(mut self, bits: u8) -> Self {
        self.descriptor.bits_per_word = bits;
        self
    }

    /// The descriptor, with buffer addresses still unset
    pub fn descriptor(&self) -> &TransferDescriptor {
        &self.descriptor
    }

    /// Transmit buffer, if any
    pub fn tx(&self) -> Option<&[u8]> {
        self.tx
    }

    /// Whether the segment has a receive buffer
    pub fn has_rx(&self) -> bool {
        self.rx.is_some()
    }

    /// Receive buffer, if any
    pub fn rx_mut(&mut self) -> Option<&mut [u8]> {
        self.rx.as_deref_mut()
    }

    /// Both buffers at once, for adapters that hand them to the driver
    pub fn buffers_mut(&mut self) -> (Option<&[u8]>, Option<&mut [u8]>) {
        (self.tx, self.rx.as_deref_mut())
    }

    /// Number of bytes this segment transfers
    pub fn len(&self) -> usize {
        self.descriptor.len as usize
    }

    /// True if the segment transfers no bytes
    pub fn is_empty(&self) -> bool {
        self.descriptor.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec;

    fn settings(speed_hz: u32, bits_per_word: u8) -> Settings {
        Settings {
            speed_hz,
            bits_per_word,
            ..Default::default()
        }
    }

    #[test]
    fn test_descriptor_layout() {
        let desc = TransferDescriptor {
            tx_buf: 0x1122_3344_5566_7788,
            rx_buf: 0x99AA_BBCC_DDEE_FF00,
            len: 3,
            speed_hz: 500_000,
            delay_usecs: 0x0102,
            bits_per_word: 8,
            cs_change: 1,
            tx_nbits: 2,
            rx_nbits: 4,
            pad: 0,
        };
        let bytes = desc.as_bytes();

        assert_eq!(bytes.len(), 32);
        assert_eq!(&bytes[0..8], &0x1122_3344_5566_7788u64.to_ne_bytes());
        assert_eq!(&bytes[8..16], &0x99AA_BBCC_DDEE_FF00u64.to_ne_bytes());
        assert_eq!(&bytes[16..20], &3u32.to_ne_bytes());
        assert_eq!(&bytes[20..24], &500_000u32.to_ne_bytes());
        assert_eq!(&bytes[24..26], &0x0102u16.to_ne_bytes());
        assert_eq!(bytes[26], 8);
        assert_eq!(bytes[27], 1);
        assert_eq!(bytes[28], 2);
        assert_eq!(bytes[29], 4);
        assert_eq!(&bytes[30..32], &[0, 0]);

        let parsed = TransferDescriptor::read_from_bytes(bytes).unwrap();
        assert_eq!(parsed, desc);
    }

    #[test]
    fn test_full_duplex_fields() {
        let tx = [0x01, 0x02, 0x03];
        let mut rx = [0u8; 3];
        let seg = Segment::full_duplex(&tx, &mut rx, Duration::ZERO, &settings(500_000, 8))
            .unwrap();

        let desc = seg.descriptor();
        assert_eq!(desc.len, 3);
        assert_eq!(desc.speed_hz, 500_000);
        assert_eq!(desc.bits_per_word, 8);
        assert_eq!(desc.delay_usecs, 0);
        // Addresses and reserved fields stay zero
        assert_eq!(desc.tx_buf, 0);
        assert_eq!(desc.rx_buf, 0);
        assert_eq!(desc.cs_change, 0);
        assert_eq!(desc.tx_nbits, 0);
        assert_eq!(desc.rx_nbits, 0);
        assert_eq!(desc.pad, 0);
    }

    #[test]
    fn test_length_matches_tx() {
        for len in [1usize, 2, 31, 32, 255, 4096] {
            let tx = vec![0xA5u8; len];
            let mut rx = vec![0u8; len];
            let seg =
                Segment::full_duplex(&tx, &mut rx, Duration::ZERO, &Settings::default()).unwrap();
            assert_eq!(seg.descriptor().len as usize, len);
            assert_eq!(seg.len(), len);
        }
    }

    #[test]
    fn test_empty_buffers_rejected() {
        let mut rx = [0u8; 1];
        assert_eq!(
            Segment::full_duplex(&[], &mut rx, Duration::ZERO, &Settings::default()).unwrap_err(),
            Error::EmptyTxBuffer
        );

        let tx = [0u8; 1];
        assert_eq!(
            Segment::full_duplex(&tx, &mut [], Duration::ZERO, &Settings::default()).unwrap_err(),
            Error::EmptyRxBuffer
        );
        assert_eq!(
            Segment::write(&[], Duration::ZERO, &Settings::default()).unwrap_err(),
            Error::EmptyTxBuffer
        );
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let tx = [0u8; 4];
        let mut rx = [0u8; 3];
        assert_eq!(
            Segment::full_duplex(&tx, &mut rx, Duration::ZERO, &Settings::default()).unwrap_err(),
            Error::LengthMismatch { tx: 4, rx: 3 }
        );
    }

    #[test]
    fn test_delay_truncation() {
        assert_eq!(delay_usecs(Duration::from_micros(1_500)), Ok(1_500));
        assert_eq!(delay_usecs(Duration::from_nanos(1_500_999)), Ok(1_500));
        assert_eq!(delay_usecs(Duration::from_nanos(999)), Ok(0));
        assert_eq!(delay_usecs(Duration::from_micros(65_535)), Ok(65_535));
    }

    #[test]
    fn test_delay_out_of_range() {
        assert_eq!(
            delay_usecs(Duration::from_micros(65_536)),
            Err(Error::DelayOutOfRange { micros: 65_536 })
        );
        assert_eq!(
            delay_usecs(Duration::from_secs(1)),
            Err(Error::DelayOutOfRange { micros: 1_000_000 })
        );

        let tx = [0u8; 2];
        let mut rx = [0u8; 2];
        assert!(matches!(
            Segment::full_duplex(&tx, &mut rx, Duration::from_millis(70), &Settings::default()),
            Err(Error::DelayOutOfRange { .. })
        ));
    }

    #[test]
    fn test_half_duplex_buffers() {
        let tx = [0x9F];
        let mut seg = Segment::write(&tx, Duration::ZERO, &Settings::default()).unwrap();
        assert_eq!(seg.tx(), Some(&tx[..]));
        assert!(seg.rx_mut().is_none());

        let mut rx = [0u8; 3];
        let mut seg = Segment::read(&mut rx, Duration::ZERO, &Settings::default()).unwrap();
        assert!(seg.tx().is_none());
        assert_eq!(seg.rx_mut().map(|b| b.len()), Some(3));
    }

    #[test]
    fn test_overrides() {
        let tx = [0u8; 2];
        let seg = Segment::write(&tx, Duration::ZERO, &settings(1_000_000, 8))
            .unwrap()
            .with_cs_change(true)
            .with_speed_hz(250_000)
            .with_bits_per_word(16);

        let desc = seg.descriptor();
        assert_eq!(desc.cs_change, 1);
        assert_eq!(desc.speed_hz, 250_000);
        assert_eq!(desc.bits_per_word, 16);
    }
}
