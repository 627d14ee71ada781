//! spibus-dummy - In-memory spidev emulator for testing
//!
//! This crate provides a `ControlDevice` that behaves like a spidev
//! character device without any hardware behind it. Every control call is
//! recorded, so tests can check exactly which request codes and arguments a
//! connection issued, and failures can be injected on demand.

use spibus_core::device::{ControlArg, ControlDevice};
use spibus_core::error::Errno;
use spibus_core::ioctl::{Direction, IoctlCode};
use spibus_core::settings::ConfigKey;
use spibus_core::spidev::SpidevIoctls;
use spibus_core::transfer::TransferDescriptor;
use spibus_core::SPIDEV;

/// Default spidev buffer size (`/sys/module/spidev/parameters/bufsiz`)
pub const DEFAULT_BUF_SIZE: usize = 4096;

/// What the emulated slave clocks back during a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// MISO tied to MOSI: received bytes equal transmitted bytes
    Loopback,
    /// Every received byte is this value
    Fill(u8),
}

/// Configuration for the dummy device
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Slave response
    pub response: Response,
    /// Largest total message size accepted, like the spidev `bufsiz` parameter
    pub buf_size: usize,
    /// Largest word size the emulated controller supports
    pub max_bits_per_word: u8,
    /// Request numbering to accept
    pub table: SpidevIoctls,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            response: Response::Loopback,
            buf_size: DEFAULT_BUF_SIZE,
            max_bits_per_word: 32,
            table: SPIDEV,
        }
    }
}

/// Argument of a recorded control call, copied out of the borrowed argument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedArg {
    /// Byte passed to the driver
    WriteU8(u8),
    /// 32-bit value passed to the driver
    WriteU32(u32),
    /// Byte requested from the driver
    ReadU8,
    /// 32-bit value requested from the driver
    ReadU32,
    /// Transfer descriptors, with a copy of each transmit buffer
    Message(Vec<RecordedSegment>),
}

/// One descriptor of a recorded message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedSegment {
    /// Descriptor as built by the caller
    pub descriptor: TransferDescriptor,
    /// Transmit data, if the segment had a transmit buffer
    pub tx: Option<Vec<u8>>,
    /// Whether the segment had a receive buffer
    pub has_rx: bool,
}

/// A control call as seen by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCall {
    /// Request code
    pub code: IoctlCode,
    /// Argument
    pub arg: RecordedArg,
}

/// Emulated spidev device
#[derive(Debug)]
pub struct DummyDevice {
    config: DummyConfig,
    mode: u8,
    lsb_first: u8,
    bits_per_word: u8,
    max_speed_hz: u32,
    calls: Vec<ControlCall>,
    fail_next: Option<Errno>,
    fail_close: Option<Errno>,
    closed: bool,
}

impl DummyDevice {
    /// Create a new dummy device with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config,
            mode: 0,
            lsb_first: 0,
            bits_per_word: 8,
            max_speed_hz: 0,
            calls: Vec::new(),
            fail_next: None,
            fail_close: None,
            closed: false,
        }
    }

    /// Create a loopback device with default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &DummyConfig {
        &self.config
    }

    /// Every control call issued so far, in order
    pub fn calls(&self) -> &[ControlCall] {
        &self.calls
    }

    /// Forget recorded calls
    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Make the next control call fail with `errno` after being recorded
    pub fn fail_next(&mut self, errno: Errno) {
        self.fail_next = Some(errno);
    }

    /// Make `close` fail with `errno`
    pub fn fail_close(&mut self, errno: Errno) {
        self.fail_close = Some(errno);
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Current mode byte
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Current LSB-first flag
    pub fn lsb_first(&self) -> u8 {
        self.lsb_first
    }

    /// Current word size
    pub fn bits_per_word(&self) -> u8 {
        self.bits_per_word
    }

    /// Current maximum clock speed in Hz
    pub fn max_speed_hz(&self) -> u32 {
        self.max_speed_hz
    }

    fn record(&mut self, code: IoctlCode, arg: &ControlArg<'_, '_>) {
        let arg = match arg {
            ControlArg::WriteU8(value) => RecordedArg::WriteU8(**value),
            ControlArg::WriteU32(value) => RecordedArg::WriteU32(**value),
            ControlArg::ReadU8(_) => RecordedArg::ReadU8,
            ControlArg::ReadU32(_) => RecordedArg::ReadU32,
            ControlArg::Message(segments) => RecordedArg::Message(
                segments
                    .iter()
                    .map(|seg| RecordedSegment {
                        descriptor: *seg.descriptor(),
                        tx: seg.tx().map(<[u8]>::to_vec),
                        has_rx: seg.has_rx(),
                    })
                    .collect(),
            ),
        };
        log::trace!("dummy: control {} {:?}", code, arg);
        self.calls.push(ControlCall { code, arg });
    }

    fn write_setting(&mut self, key: ConfigKey, arg: ControlArg<'_, '_>) -> Result<(), Errno> {
        match (key, arg) {
            (ConfigKey::Mode, ControlArg::WriteU8(mode)) => self.mode = *mode,
            (ConfigKey::Order, ControlArg::WriteU8(lsb)) => self.lsb_first = *lsb,
            (ConfigKey::Bits, ControlArg::WriteU8(bits)) => {
                if *bits > self.config.max_bits_per_word {
                    return Err(Errno::EINVAL);
                }
                // 0 selects the default word size
                self.bits_per_word = if *bits == 0 { 8 } else { *bits };
            }
            (ConfigKey::Speed, ControlArg::WriteU32(speed)) => self.max_speed_hz = *speed,
            _ => return Err(Errno::EINVAL),
        }
        Ok(())
    }

    fn read_setting(&self, key: ConfigKey, arg: ControlArg<'_, '_>) -> Result<(), Errno> {
        match (key, arg) {
            (ConfigKey::Mode, ControlArg::ReadU8(out)) => *out = self.mode,
            (ConfigKey::Order, ControlArg::ReadU8(out)) => *out = self.lsb_first,
            (ConfigKey::Bits, ControlArg::ReadU8(out)) => *out = self.bits_per_word,
            (ConfigKey::Speed, ControlArg::ReadU32(out)) => *out = self.max_speed_hz,
            _ => return Err(Errno::EINVAL),
        }
        Ok(())
    }

    fn message(&self, count: u8, arg: ControlArg<'_, '_>) -> Result<(), Errno> {
        let ControlArg::Message(segments) = arg else {
            return Err(Errno::EINVAL);
        };
        if segments.len() != count as usize {
            return Err(Errno::EINVAL);
        }

        let total: usize = segments.iter().map(|seg| seg.len()).sum();
        if total > self.config.buf_size {
            return Err(Errno::EMSGSIZE);
        }

        for seg in segments.iter_mut() {
            let len = seg.len();
            if seg.tx().is_some_and(|tx| tx.len() != len) {
                return Err(Errno::EINVAL);
            }

            let (tx, rx) = seg.buffers_mut();
            let Some(rx) = rx else { continue };
            if rx.len() != len {
                return Err(Errno::EINVAL);
            }
            match (&self.config.response, tx) {
                (Response::Loopback, Some(tx)) => rx.copy_from_slice(tx),
                (Response::Loopback, None) => rx.fill(0),
                (Response::Fill(value), _) => rx.fill(*value),
            }
        }
        Ok(())
    }
}

impl ControlDevice for DummyDevice {
    fn control(&mut self, code: IoctlCode, arg: ControlArg<'_, '_>) -> Result<(), Errno> {
        if self.closed {
            return Err(Errno::EBADF);
        }

        self.record(code, &arg);

        if let Some(errno) = self.fail_next.take() {
            return Err(errno);
        }

        let table = self.config.table;
        if let Some((direction, key)) = table.setting_for(code) {
            return match direction {
                Direction::Write => self.write_setting(key, arg),
                _ => self.read_setting(key, arg),
            };
        }
        if let Some(count) = table.message_count(code) {
            return self.message(count, arg);
        }

        Err(Errno::ENOTTY)
    }

    fn close(&mut self) -> Result<(), Errno> {
        if self.closed {
            return Err(Errno::EBADF);
        }
        self.closed = true;
        match self.fail_close.take() {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }
}
