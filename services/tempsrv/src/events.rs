//! Outbound tracker events and the sinks that receive them

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use tempudp_protocol::{HeartbeatKind, SensorErrorCode, TemperatureReading, TextEncoding};

use crate::tracker::DeviceStatus;

/// Events emitted by the device tracker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TrackerEvent {
    ReadingUpdated {
        device_address: u8,
        temperature_c: f64,
        temperature_f: f64,
        raw_value: i16,
        in_range: bool,
        error_code: Option<SensorErrorCode>,
        timestamp: DateTime<Utc>,
    },
    StatusChanged {
        device_address: u8,
        status: DeviceStatus,
        timestamp: DateTime<Utc>,
    },
    HeartbeatReceived {
        source: SocketAddr,
        kind: HeartbeatKind,
        encoding: Option<TextEncoding>,
        text: Option<String>,
        /// Devices whose liveness this heartbeat refreshed
        devices: Vec<u8>,
        timestamp: DateTime<Utc>,
    },
}

impl TrackerEvent {
    pub fn reading(reading: &TemperatureReading, timestamp: DateTime<Utc>) -> Self {
        Self::ReadingUpdated {
            device_address: reading.device_address,
            temperature_c: reading.temperature_c,
            temperature_f: reading.temperature_f(),
            raw_value: reading.raw_value,
            in_range: reading.in_range,
            error_code: reading.error_code,
            timestamp,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ReadingUpdated { .. } => "reading_updated",
            Self::StatusChanged { .. } => "status_changed",
            Self::HeartbeatReceived { .. } => "heartbeat_received",
        }
    }

    pub fn device_address(&self) -> Option<u8> {
        match self {
            Self::ReadingUpdated { device_address, .. }
            | Self::StatusChanged { device_address, .. } => Some(*device_address),
            Self::HeartbeatReceived { .. } => None,
        }
    }
}

/// Receives tracker events
///
/// Called from the tracker actor; implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &TrackerEvent);
}

impl EventSink for mpsc::UnboundedSender<TrackerEvent> {
    fn emit(&self, event: &TrackerEvent) {
        if self.send(event.clone()).is_err() {
            warn!("Event receiver dropped, {} event lost", event.event_type());
        }
    }
}

impl EventSink for broadcast::Sender<TrackerEvent> {
    fn emit(&self, event: &TrackerEvent) {
        // No subscribers is not an error
        if self.send(event.clone()).is_err() {
            debug!("No subscribers for {} event", event.event_type());
        }
    }
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&self, event: &TrackerEvent) {
        (**self).emit(event)
    }
}

impl<S: EventSink> EventSink for Vec<S> {
    fn emit(&self, event: &TrackerEvent) {
        for sink in self {
            sink.emit(event);
        }
    }
}

/// Writes every event as one JSON line at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &TrackerEvent) {
        match serde_json::to_string(event) {
            Ok(line) => info!(target: "tempsrv::events", "{}", line),
            Err(e) => warn!("Failed to serialize {} event: {}", event.event_type(), e),
        }
    }
}
