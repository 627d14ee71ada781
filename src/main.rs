//! spibus - Linux spidev SPI tool
//!
//! Sends bytes to SPI devices through the Linux spidev driver, reads the
//! driver's settings back, and writes new ones.
//!
//! # Architecture
//!
//! Every driver opens into the same `Connection`, which owns a
//! `ControlDevice`:
//! - **spidev** - `/dev/spidevX.Y` character devices, driven with `ioctl(2)`
//! - **dummy** - An in-memory emulator for trying commands without hardware
//!
//! The commands are written against `Connection` alone, so they behave the
//! same on either driver.

mod cli;
mod commands;
mod drivers;

use clap::Parser;
use cli::{Cli, Commands};
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    match cli.command {
        Commands::Transfer {
            driver,
            data,
            settings,
            delay_us,
            read,
        } => {
            let mut conn = drivers::open_driver(&driver)?;
            let rx = commands::run_transfer(
                &mut conn,
                &data.0,
                &settings,
                Duration::from_micros(delay_us),
                read,
            )?;
            println!("{}", commands::format_hex(&rx));
            conn.close()?;
        }
        Commands::Info { driver } => {
            let mut conn = drivers::open_driver(&driver)?;
            commands::run_info(&mut conn)?;
            conn.close()?;
        }
        Commands::Configure { driver, settings } => {
            let mut conn = drivers::open_driver(&driver)?;
            commands::run_configure(&mut conn, &settings)?;
            conn.close()?;
        }
        Commands::ListDrivers => {
            commands::list_drivers();
        }
    }

    Ok(())
}
