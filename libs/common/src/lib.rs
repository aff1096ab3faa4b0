//! tempudp basic library
//!
//! Provides helpers shared by the tempudp service binaries:
//! - logging bootstrap with a reloadable level filter
//! - graceful shutdown and SIGHUP reload signal handling
//! - hex / ASCII formatting for packet dumps

pub mod hex;
pub mod logging;
pub mod shutdown;

pub use hex::{ascii_preview, parse_hex, to_hex_spaced};
pub use logging::{get_log_level, init_with_config, set_log_level, LogConfig};
pub use shutdown::{cancel_on_shutdown, reload_on_hangup, wait_for_shutdown};
