//! CLI command implementations
//!
//! Every command works on a `Connection` over any `ControlDevice`, so the
//! same code drives a real spidev node and the in-memory dummy.

mod configure;
mod info;
mod list;
mod transfer;

pub use configure::{parse_setting, run_configure};
pub use info::{read_settings, run_info};
pub use list::list_drivers;
pub use transfer::{format_hex, run_transfer};
