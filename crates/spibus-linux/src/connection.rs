//! spidev connection
//!
//! A [`Connection`] owns one device handle from open until close. It caches
//! the last successfully written clock speed and word size, which every
//! transfer descriptor it builds carries.
//!
//! A connection is single-threaded: every operation takes `&mut self` and
//! blocks until the driver returns. Share it between threads only behind
//! external synchronization such as a `Mutex`.

use crate::config::SpidevConfig;
use crate::device::{spidev_path, SpidevFile};
use crate::error::{Result, SpidevError};

use spibus_core::device::{ControlArg, ControlDevice};
use spibus_core::error::{Errno, Error};
use spibus_core::settings::{ConfigKey, Setting, Settings};
use spibus_core::transfer::Segment;
use spibus_core::SPIDEV;

use std::path::Path;
use std::time::Duration;

/// An open SPI device
#[derive(Debug)]
pub struct Connection<D: ControlDevice> {
    device: Option<D>,
    settings: Settings,
}

impl Connection<SpidevFile> {
    /// Open `/dev/spidev<bus>.<chip>`
    pub fn open(bus: u32, chip: u32) -> Result<Self> {
        Self::open_path(spidev_path(bus, chip))
    }

    /// Open a spidev node by path
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(SpidevFile::open(path)?))
    }

    /// Open the configured device and apply its settings
    pub fn open_with(config: &SpidevConfig) -> Result<Self> {
        let mut conn = Self::open_path(&config.device)?;
        conn.apply(config)?;

        log::info!(
            "spidev: Opened {} (mode {}, {} Hz)",
            config.device.display(),
            conn.settings.mode.clock_mode(),
            conn.settings.speed_hz
        );

        Ok(conn)
    }
}

impl<D: ControlDevice> Connection<D> {
    /// Wrap an already open device
    ///
    /// The cached settings start zeroed, so transfers use the device-wide
    /// speed and word size until they are configured.
    pub fn new(device: D) -> Self {
        Self {
            device: Some(device),
            settings: Settings::default(),
        }
    }

    /// Whether the connection has not been closed
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    /// Last successfully written settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The underlying device, if still open
    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    /// The underlying device, mutably, if still open
    pub fn device_mut(&mut self) -> Option<&mut D> {
        self.device.as_mut()
    }

    /// Give up the device without closing it
    pub fn into_inner(mut self) -> Option<D> {
        self.device.take()
    }

    fn open_device(&mut self) -> Result<&mut D> {
        self.device.as_mut().ok_or(SpidevError::Closed)
    }

    /// Write one setting to the driver
    ///
    /// The cache is updated only after the driver accepted the value.
    pub fn configure(&mut self, setting: Setting) -> Result<()> {
        let code = SPIDEV.write_code(setting.key());
        let device = self.open_device()?;

        log::debug!("spidev: Setting {} (request {})", setting, code);

        let result = match setting {
            Setting::Mode(mode) => device.control(code, ControlArg::WriteU8(&mode.bits())),
            Setting::BitsPerWord(bits) => device.control(code, ControlArg::WriteU8(&bits)),
            Setting::SpeedHz(speed) => device.control(code, ControlArg::WriteU32(&speed)),
            Setting::Order(order) => device.control(code, ControlArg::WriteU8(&order.raw())),
        };
        result.map_err(|errno| configure_error(setting, errno))?;

        self.settings.apply(setting);
        Ok(())
    }

    /// Write one setting given as a raw key and value
    ///
    /// Keys are 0 (mode), 1 (bits per word), 2 (speed) and 3 (bit order).
    /// Values are truncated to the width of the key. An unknown key is
    /// rejected without touching the device.
    pub fn configure_raw(&mut self, key: i32, value: i64) -> Result<()> {
        let setting = Setting::from_raw(key, value)?;
        self.configure(setting)
    }

    /// Write every setting present in `config`
    pub fn apply(&mut self, config: &SpidevConfig) -> Result<()> {
        for setting in config.settings() {
            self.configure(setting)?;
        }
        Ok(())
    }

    /// Read a setting back from the driver
    ///
    /// The cache is not consulted or changed.
    pub fn query(&mut self, key: ConfigKey) -> Result<Setting> {
        let code = SPIDEV.read_code(key);
        let device = self.open_device()?;
        let query_error = |errno: Errno| SpidevError::QueryFailed {
            key,
            source: errno.into(),
        };

        let setting = match key {
            ConfigKey::Speed => {
                let mut speed = 0u32;
                device
                    .control(code, ControlArg::ReadU32(&mut speed))
                    .map_err(query_error)?;
                Setting::SpeedHz(speed)
            }
            _ => {
                let mut value = 0u8;
                device
                    .control(code, ControlArg::ReadU8(&mut value))
                    .map_err(query_error)?;
                Setting::narrow(key, value as i64)
            }
        };

        log::debug!("spidev: Read back {}", setting);
        Ok(setting)
    }

    /// Full-duplex transfer: shift out `tx` while shifting into `rx`
    ///
    /// Both buffers must be non-empty and of equal length. `delay` is held
    /// after the last bit before chip select is released.
    pub fn transfer(&mut self, tx: &[u8], rx: &mut [u8], delay: Duration) -> Result<()> {
        let settings = self.settings;
        let segment = Segment::full_duplex(tx, rx, delay, &settings)?;
        self.transfer_segments(&mut [segment])
    }

    /// Half-duplex write; received bits are discarded
    pub fn write(&mut self, tx: &[u8], delay: Duration) -> Result<()> {
        let settings = self.settings;
        let segment = Segment::write(tx, delay, &settings)?;
        self.transfer_segments(&mut [segment])
    }

    /// Half-duplex read; zeros are shifted out
    pub fn read(&mut self, rx: &mut [u8], delay: Duration) -> Result<()> {
        let settings = self.settings;
        let segment = Segment::read(rx, delay, &settings)?;
        self.transfer_segments(&mut [segment])
    }

    /// Write `tx`, then read into `rx`, with chip select held in between
    pub fn write_then_read(&mut self, tx: &[u8], rx: &mut [u8]) -> Result<()> {
        let settings = self.settings;
        let mut segments = [
            Segment::write(tx, Duration::ZERO, &settings)?,
            Segment::read(rx, Duration::ZERO, &settings)?,
        ];
        self.transfer_segments(&mut segments)
    }

    /// Submit several segments as one message
    ///
    /// Chip select stays asserted across segments unless a segment sets
    /// `cs_change`. An empty slice is a no-op.
    pub fn transfer_segments(&mut self, segments: &mut [Segment<'_>]) -> Result<()> {
        let device = self.open_device()?;
        if segments.is_empty() {
            return Ok(());
        }

        let count = u8::try_from(segments.len()).map_err(|_| Error::TooManySegments {
            count: segments.len(),
        })?;
        let code = SPIDEV.message_code(count);

        log::debug!(
            "spidev: Transfer of {} segment(s), {} bytes (request {})",
            count,
            segments.iter().map(Segment::len).sum::<usize>(),
            code
        );

        device
            .control(code, ControlArg::Message(segments))
            .map_err(|errno| SpidevError::TransferFailed(errno.into()))
    }

    /// Release the device
    ///
    /// The connection is closed afterwards even if the driver reported an
    /// error. Closing twice returns [`SpidevError::Closed`].
    pub fn close(&mut self) -> Result<()> {
        let mut device = self.device.take().ok_or(SpidevError::Closed)?;
        log::debug!("spidev: Closing device");
        device
            .close()
            .map_err(|errno| SpidevError::CloseFailed(errno.into()))
    }
}

impl<D: ControlDevice> Drop for Connection<D> {
    fn drop(&mut self) {
        if self.device.is_some() {
            if let Err(e) = self.close() {
                log::warn!("spidev: {}", e);
            }
        }
    }
}

fn configure_error(setting: Setting, errno: Errno) -> SpidevError {
    let source = errno.into();
    match setting {
        Setting::Mode(mode) => SpidevError::SetModeFailed { mode, source },
        Setting::BitsPerWord(bits) => SpidevError::SetBitsPerWordFailed { bits, source },
        Setting::SpeedHz(speed) => SpidevError::SetSpeedFailed { speed, source },
        Setting::Order(order) => SpidevError::SetBitOrderFailed { order, source },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spibus_core::settings::{BitOrder, ModeFlags};
    use spibus_core::transfer::TransferDescriptor;
    use spibus_dummy::{ControlCall, DummyConfig, DummyDevice, RecordedArg, Response};

    fn message(call: &ControlCall) -> Vec<TransferDescriptor> {
        match &call.arg {
            RecordedArg::Message(segs) => segs.iter().map(|seg| seg.descriptor).collect(),
            other => panic!("expected a message, got {:?}", other),
        }
    }

    #[test]
    fn test_configure_then_transfer() {
        let mut dev = DummyDevice::new_default();
        let tx = [0x01, 0x02, 0x03];
        let mut rx = [0u8; 3];

        {
            let mut conn = Connection::new(&mut dev);
            conn.configure_raw(0, 0).unwrap();
            conn.configure_raw(2, 500_000).unwrap();
            conn.transfer(&tx, &mut rx, Duration::ZERO).unwrap();
            conn.close().unwrap();
        }

        let calls = dev.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(
            calls[0],
            ControlCall {
                code: SPIDEV.write_code(ConfigKey::Mode),
                arg: RecordedArg::WriteU8(0),
            }
        );
        assert_eq!(
            calls[1],
            ControlCall {
                code: SPIDEV.write_code(ConfigKey::Speed),
                arg: RecordedArg::WriteU32(500_000),
            }
        );
        assert_eq!(calls[2].code, SPIDEV.message_code(1));

        let descs = message(&calls[2]);
        assert_eq!(descs.len(), 1);
        assert_eq!(descs[0].len, 3);
        assert_eq!(descs[0].speed_hz, 500_000);
        assert_eq!(descs[0].bits_per_word, 0);
        assert_eq!(descs[0].delay_usecs, 0);

        // Loopback: the receive buffer is filled
        assert_eq!(rx, tx);
        assert!(dev.is_closed());
    }

    #[test]
    fn test_configure_updates_cache() {
        let mut dev = DummyDevice::new_default();
        let mut conn = Connection::new(&mut dev);

        conn.configure(Setting::Mode(ModeFlags::MODE_3)).unwrap();
        conn.configure(Setting::BitsPerWord(16)).unwrap();
        conn.configure(Setting::SpeedHz(1_000_000)).unwrap();
        conn.configure(Setting::Order(BitOrder::LsbFirst)).unwrap();

        let settings = *conn.settings();
        assert_eq!(settings.mode, ModeFlags::MODE_3);
        assert_eq!(settings.bits_per_word, 16);
        assert_eq!(settings.speed_hz, 1_000_000);
        assert_eq!(settings.bit_order, BitOrder::LsbFirst);

        let dev = conn.device().unwrap();
        assert_eq!(dev.mode(), 3);
        assert_eq!(dev.bits_per_word(), 16);
        assert_eq!(dev.max_speed_hz(), 1_000_000);
        assert_eq!(dev.lsb_first(), 1);
    }

    #[test]
    fn test_configure_raw_truncates() {
        let mut dev = DummyDevice::new_default();
        {
            let mut conn = Connection::new(&mut dev);
            conn.configure_raw(0, 0x103).unwrap();
            conn.configure_raw(2, 0x1_0000_0010).unwrap();
            assert_eq!(conn.settings().speed_hz, 0x10);
        }
        assert_eq!(dev.calls()[0].arg, RecordedArg::WriteU8(3));
        assert_eq!(dev.calls()[1].arg, RecordedArg::WriteU32(0x10));
    }

    #[test]
    fn test_unknown_key_makes_no_call() {
        let mut dev = DummyDevice::new_default();
        {
            let mut conn = Connection::new(&mut dev);
            for key in [4, -1, 100] {
                let err = conn.configure_raw(key, 1).unwrap_err();
                assert!(matches!(
                    err,
                    SpidevError::InvalidArgument(Error::UnknownKey(k)) if k == key
                ));
            }
            assert_eq!(*conn.settings(), Settings::default());
        }
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn test_failed_configure_keeps_cache() {
        let mut dev = DummyDevice::new_default();
        let mut conn = Connection::new(&mut dev);
        conn.configure(Setting::SpeedHz(500_000)).unwrap();

        conn.device_mut().unwrap().fail_next(Errno::EINVAL);
        let err = conn.configure(Setting::SpeedHz(2_000_000)).unwrap_err();
        match err {
            SpidevError::SetSpeedFailed { speed, ref source } => {
                assert_eq!(speed, 2_000_000);
                assert_eq!(source.raw_os_error(), Some(22));
            }
            ref other => panic!("unexpected error: {}", other),
        }
        assert_eq!(err.raw_os_error(), Some(22));
        assert_eq!(conn.settings().speed_hz, 500_000);

        // Rejected by the driver itself
        let err = conn.configure(Setting::BitsPerWord(64)).unwrap_err();
        assert!(matches!(err, SpidevError::SetBitsPerWordFailed { bits: 64, .. }));
        assert_eq!(conn.settings().bits_per_word, 0);
    }

    #[test]
    fn test_failed_configure_names_parameter() {
        let mut dev = DummyDevice::new_default();
        let mut conn = Connection::new(&mut dev);

        conn.device_mut().unwrap().fail_next(Errno::EINVAL);
        let err = conn.configure(Setting::Mode(ModeFlags::MODE_2)).unwrap_err();
        assert!(err.to_string().starts_with("Failed to set SPI mode to 0x02"));

        conn.device_mut().unwrap().fail_next(Errno::EINVAL);
        let err = conn
            .configure(Setting::Order(BitOrder::LsbFirst))
            .unwrap_err();
        assert!(matches!(
            err,
            SpidevError::SetBitOrderFailed {
                order: BitOrder::LsbFirst,
                ..
            }
        ));
        assert_eq!(conn.settings().mode, ModeFlags::MODE_0);
    }

    #[test]
    fn test_transfer_uses_cached_settings() {
        let mut dev = DummyDevice::new_default();
        let tx = [0xAA; 8];
        let mut rx = [0u8; 8];
        {
            let mut conn = Connection::new(&mut dev);
            conn.configure(Setting::BitsPerWord(16)).unwrap();
            conn.configure(Setting::SpeedHz(8_000_000)).unwrap();
            conn.transfer(&tx, &mut rx, Duration::from_micros(1_500))
                .unwrap();
        }

        let desc = message(&dev.calls()[2])[0];
        assert_eq!(desc.len, 8);
        assert_eq!(desc.speed_hz, 8_000_000);
        assert_eq!(desc.bits_per_word, 16);
        assert_eq!(desc.delay_usecs, 1_500);
    }

    #[test]
    fn test_invalid_transfer_makes_no_call() {
        let mut dev = DummyDevice::new_default();
        {
            let mut conn = Connection::new(&mut dev);
            let mut rx = [0u8; 2];

            assert!(matches!(
                conn.transfer(&[], &mut rx, Duration::ZERO),
                Err(SpidevError::InvalidArgument(Error::EmptyTxBuffer))
            ));
            assert!(matches!(
                conn.transfer(&[1], &mut [], Duration::ZERO),
                Err(SpidevError::InvalidArgument(Error::EmptyRxBuffer))
            ));
            assert!(matches!(
                conn.transfer(&[1, 2, 3], &mut rx, Duration::ZERO),
                Err(SpidevError::InvalidArgument(Error::LengthMismatch { tx: 3, rx: 2 }))
            ));
            assert!(matches!(
                conn.transfer(&[1, 2], &mut rx, Duration::from_micros(65_536)),
                Err(SpidevError::InvalidArgument(Error::DelayOutOfRange { micros: 65_536 }))
            ));
        }
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn test_transfer_failure_is_verbatim() {
        let mut dev = DummyDevice::new(DummyConfig {
            buf_size: 4,
            ..Default::default()
        });
        let mut conn = Connection::new(&mut dev);
        let tx = [0u8; 5];
        let mut rx = [0u8; 5];

        let err = conn.transfer(&tx, &mut rx, Duration::ZERO).unwrap_err();
        assert!(matches!(err, SpidevError::TransferFailed(_)));
        assert_eq!(err.raw_os_error(), Some(Errno::EMSGSIZE.raw()));
    }

    #[test]
    fn test_write_then_read() {
        let mut dev = DummyDevice::new(DummyConfig {
            response: Response::Fill(0xC2),
            ..Default::default()
        });
        let mut id = [0u8; 3];
        {
            let mut conn = Connection::new(&mut dev);
            conn.write_then_read(&[0x9F], &mut id).unwrap();
        }
        assert_eq!(id, [0xC2; 3]);

        let call = &dev.calls()[0];
        assert_eq!(call.code, SPIDEV.message_code(2));
        let RecordedArg::Message(segs) = &call.arg else {
            panic!("expected a message");
        };
        assert_eq!(segs[0].tx.as_deref(), Some(&[0x9F][..]));
        assert!(!segs[0].has_rx);
        assert_eq!(segs[1].descriptor.len, 3);
        assert!(segs[1].tx.is_none());
        assert!(segs[1].has_rx);
    }

    #[test]
    fn test_write_and_read() {
        let mut dev = DummyDevice::new(DummyConfig {
            response: Response::Fill(0x11),
            ..Default::default()
        });
        let mut rx = [0u8; 2];
        {
            let mut conn = Connection::new(&mut dev);
            conn.write(&[0x06], Duration::ZERO).unwrap();
            conn.read(&mut rx, Duration::ZERO).unwrap();
        }
        assert_eq!(rx, [0x11, 0x11]);
        assert_eq!(dev.calls().len(), 2);
        assert!(dev
            .calls()
            .iter()
            .all(|call| call.code == SPIDEV.message_code(1)));
    }

    #[test]
    fn test_transfer_segments() {
        let mut dev = DummyDevice::new_default();
        let settings = Settings::default();
        let tx = [1u8, 2];
        let mut rx = [0u8; 2];
        {
            let mut conn = Connection::new(&mut dev);
            conn.transfer_segments(&mut []).unwrap();

            let mut segments = [
                Segment::write(&[0x03], Duration::ZERO, &settings)
                    .unwrap()
                    .with_cs_change(true),
                Segment::full_duplex(&tx, &mut rx, Duration::ZERO, &settings)
                    .unwrap()
                    .with_speed_hz(250_000),
            ];
            conn.transfer_segments(&mut segments).unwrap();
        }
        assert_eq!(rx, tx);

        // The empty message never reached the device
        assert_eq!(dev.calls().len(), 1);
        let descs = message(&dev.calls()[0]);
        assert_eq!(descs[0].cs_change, 1);
        assert_eq!(descs[1].speed_hz, 250_000);
    }

    #[test]
    fn test_too_many_segments() {
        let mut dev = DummyDevice::new_default();
        let settings = Settings::default();
        let tx = [0u8; 1];
        {
            let mut conn = Connection::new(&mut dev);
            let mut segments: Vec<Segment<'_>> = (0..256)
                .map(|_| Segment::write(&tx, Duration::ZERO, &settings).unwrap())
                .collect();
            assert!(matches!(
                conn.transfer_segments(&mut segments),
                Err(SpidevError::InvalidArgument(Error::TooManySegments { count: 256 }))
            ));
        }
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn test_query() {
        let mut dev = DummyDevice::new_default();
        let mut conn = Connection::new(&mut dev);
        conn.configure(Setting::Mode(ModeFlags::MODE_1 | ModeFlags::CS_HIGH))
            .unwrap();
        conn.configure(Setting::SpeedHz(12_000_000)).unwrap();

        assert_eq!(
            conn.query(ConfigKey::Mode).unwrap(),
            Setting::Mode(ModeFlags::MODE_1 | ModeFlags::CS_HIGH)
        );
        assert_eq!(
            conn.query(ConfigKey::Speed).unwrap(),
            Setting::SpeedHz(12_000_000)
        );
        assert_eq!(
            conn.query(ConfigKey::Bits).unwrap(),
            Setting::BitsPerWord(8)
        );
        assert_eq!(
            conn.query(ConfigKey::Order).unwrap(),
            Setting::Order(BitOrder::MsbFirst)
        );

        conn.device_mut().unwrap().fail_next(Errno::ENOTTY);
        assert!(matches!(
            conn.query(ConfigKey::Bits),
            Err(SpidevError::QueryFailed {
                key: ConfigKey::Bits,
                ..
            })
        ));
    }

    #[test]
    fn test_close_twice() {
        let mut dev = DummyDevice::new_default();
        let mut conn = Connection::new(&mut dev);
        assert!(conn.is_open());
        conn.close().unwrap();
        assert!(!conn.is_open());
        assert!(matches!(conn.close(), Err(SpidevError::Closed)));
    }

    #[test]
    fn test_operations_after_close() {
        let mut dev = DummyDevice::new_default();
        {
            let mut conn = Connection::new(&mut dev);
            conn.close().unwrap();

            let mut rx = [0u8; 1];
            assert!(matches!(
                conn.configure(Setting::SpeedHz(1)),
                Err(SpidevError::Closed)
            ));
            assert!(matches!(
                conn.transfer(&[0], &mut rx, Duration::ZERO),
                Err(SpidevError::Closed)
            ));
            assert!(matches!(conn.query(ConfigKey::Mode), Err(SpidevError::Closed)));
            assert!(conn.device().is_none());
        }
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn test_close_failure_still_closes() {
        let mut dev = DummyDevice::new_default();
        dev.fail_close(Errno(5));
        let mut conn = Connection::new(&mut dev);

        let err = conn.close().unwrap_err();
        assert!(matches!(err, SpidevError::CloseFailed(_)));
        assert_eq!(err.raw_os_error(), Some(5));
        assert!(!conn.is_open());
        assert!(matches!(conn.close(), Err(SpidevError::Closed)));
    }

    #[test]
    fn test_drop_closes() {
        let mut dev = DummyDevice::new_default();
        {
            let _conn = Connection::new(&mut dev);
        }
        assert!(dev.is_closed());

        // A failing close on drop is only logged
        let mut dev = DummyDevice::new_default();
        dev.fail_close(Errno(5));
        drop(Connection::new(&mut dev));
        assert!(dev.is_closed());
    }

    #[test]
    fn test_into_inner_does_not_close() {
        let conn = Connection::new(DummyDevice::new_default());
        let dev = conn.into_inner().unwrap();
        assert!(!dev.is_closed());
    }

    #[test]
    fn test_apply_config() {
        let mut dev = DummyDevice::new_default();
        let config = SpidevConfig::new("/dev/spidev0.0")
            .with_mode(ModeFlags::MODE_2)
            .with_speed(4_000_000);
        {
            let mut conn = Connection::new(&mut dev);
            conn.apply(&config).unwrap();
            assert_eq!(conn.settings().speed_hz, 4_000_000);
        }
        let codes: Vec<_> = dev.calls().iter().map(|call| call.code).collect();
        assert_eq!(
            codes,
            vec![
                SPIDEV.write_code(ConfigKey::Mode),
                SPIDEV.write_code(ConfigKey::Speed)
            ]
        );
    }

    #[test]
    fn test_open_missing_device() {
        let err = Connection::open(250, 250).unwrap_err();
        assert!(matches!(err, SpidevError::OpenFailed { .. }));
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}
