//! Info command

use spibus_core::device::ControlDevice;
use spibus_core::settings::{ConfigKey, Setting};
use spibus_linux::Connection;

/// Read every setting back from the driver
pub fn read_settings<D: ControlDevice>(
    conn: &mut Connection<D>,
) -> Result<Vec<Setting>, Box<dyn std::error::Error>> {
    let mut settings = Vec::with_capacity(ConfigKey::ALL.len());
    for key in ConfigKey::ALL {
        settings.push(conn.query(key)?);
    }
    Ok(settings)
}

/// Print the driver's current settings
pub fn run_info<D: ControlDevice>(
    conn: &mut Connection<D>,
) -> Result<(), Box<dyn std::error::Error>> {
    let settings = read_settings(conn)?;

    println!("Device settings:");
    for setting in &settings {
        println!("  {:<6} {}", setting.key().name(), setting);
    }

    #[cfg(feature = "spidev")]
    println!(
        "Kernel buffer size: {} bytes",
        spibus_linux::kernel_buf_size()
    );

    Ok(())
}
