//! Temperature UDP service (tempsrv)
//!
//! Receives ModBus-RTU read responses from DS18B20 sensor modules over UDP,
//! tracks per-device liveness and publishes readings and status changes.
//!
//! ```text
//! UDP socket ──► receiver (classify + decode) ──┐
//!                                               ├─► mpsc ──► tracker actor ──► EventSink
//! sweep timer ──────────── Sweep { now } ───────┘                │
//!                                                          watch snapshot ──► statuses()
//! ```

pub mod actor;
pub mod clock;
pub mod config;
pub mod events;
pub mod receiver;
pub mod report;
pub mod runtime;
pub mod service;
pub mod tracker;

pub use actor::{spawn_tracker, Command, TrackerHandle, TrackerSnapshot};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use events::{EventSink, LogSink, TrackerEvent};
pub use receiver::{IngestCounters, PacketRouter, RawPacket};
pub use report::status_report;
pub use service::{ServiceHandle, TemperatureService};
pub use tracker::{DeviceState, DeviceStatus, DeviceTracker, PeerActivity, PeerState};
