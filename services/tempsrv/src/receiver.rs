//! UDP ingestion
//!
//! The receive loop only classifies and decodes; every state change goes to the
//! tracker actor as a [`Command`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use common::{ascii_preview, to_hex_spaced};
use errors::{TempUdpError, TempUdpResult};
use tempudp_protocol::{Classification, FrameClassifier, TemperatureDecoder};

use crate::actor::{Command, TrackerHandle};
use crate::clock::Clock;

/// One received datagram
#[derive(Debug, Clone)]
pub struct RawPacket {
    pub source: SocketAddr,
    pub payload: Bytes,
    pub received_at: DateTime<Utc>,
}

/// Ingestion counters
#[derive(Debug, Default)]
pub struct IngestStats {
    pub packets_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub data_frames: AtomicU64,
    pub heartbeats: AtomicU64,
    pub corrupt_frames: AtomicU64,
    pub unrecognized: AtomicU64,
    pub receive_errors: AtomicU64,
}

impl IngestStats {
    pub fn record_packet(&self, len: usize) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub fn increment_data_frames(&self) {
        self.data_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_heartbeats(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_corrupt(&self) {
        self.corrupt_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_unrecognized(&self) {
        self.unrecognized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_errors(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn counters(&self) -> IngestCounters {
        IngestCounters {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            data_frames: self.data_frames.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            corrupt_frames: self.corrupt_frames.load(Ordering::Relaxed),
            unrecognized: self.unrecognized.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`IngestStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestCounters {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub data_frames: u64,
    pub heartbeats: u64,
    pub corrupt_frames: u64,
    pub unrecognized: u64,
    pub receive_errors: u64,
}

/// Turns datagrams into tracker commands
#[derive(Debug, Clone)]
pub struct PacketRouter {
    classifier: FrameClassifier,
    decoder: TemperatureDecoder,
    stats: Arc<IngestStats>,
}

impl PacketRouter {
    pub fn new(classifier: FrameClassifier, decoder: TemperatureDecoder) -> Self {
        Self {
            classifier,
            decoder,
            stats: Arc::new(IngestStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<IngestStats> {
        Arc::clone(&self.stats)
    }

    /// Classify a packet; `None` means it is dropped without touching state
    pub fn route(&self, packet: &RawPacket) -> Option<Command> {
        self.stats.record_packet(packet.payload.len());

        match self.classifier.classify(&packet.payload) {
            Classification::DataFrame(frame) => {
                self.stats.increment_data_frames();
                Some(Command::Frame {
                    source: packet.source,
                    reading: self.decoder.decode(&frame),
                    received_at: packet.received_at,
                })
            },
            Classification::Heartbeat(heartbeat) => {
                self.stats.increment_heartbeats();
                debug!(
                    "{:?} packet from {} ({} bytes, encoding {})",
                    heartbeat.kind,
                    packet.source,
                    heartbeat.raw.len(),
                    heartbeat
                        .text
                        .as_ref()
                        .map_or("none", |t| t.encoding.label())
                );
                Some(Command::Heartbeat {
                    source: packet.source,
                    packet: heartbeat,
                    received_at: packet.received_at,
                })
            },
            Classification::Unrecognized(rejection) => {
                debug!(
                    "Dropped packet from {}: {} | hex={} | ascii={}",
                    packet.source,
                    rejection.reason,
                    to_hex_spaced(&packet.payload),
                    ascii_preview(&packet.payload)
                );
                match rejection.plausible_address {
                    Some(address) if rejection.reason.is_corruption() => {
                        self.stats.increment_corrupt();
                        Some(Command::CorruptFrame {
                            address,
                            received_at: packet.received_at,
                        })
                    },
                    _ => {
                        self.stats.increment_unrecognized();
                        None
                    },
                }
            },
        }
    }
}

/// Bind the ingestion socket
pub async fn bind(endpoint: &str) -> TempUdpResult<UdpSocket> {
    UdpSocket::bind(endpoint)
        .await
        .map_err(|e| TempUdpError::Bind {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
}

/// Spawn the receive loop
pub fn spawn_receiver(
    socket: UdpSocket,
    router: PacketRouter,
    tracker: TrackerHandle,
    clock: Arc<dyn Clock>,
    buffer_size: usize,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; buffer_size.max(1)];
        if let Ok(addr) = socket.local_addr() {
            info!("UDP receiver listening on {}", addr);
        }

        loop {
            let (len, source) = tokio::select! {
                result = socket.recv_from(&mut buf) => match result {
                    Ok(received) => received,
                    Err(e) => {
                        // ICMP port-unreachable and friends surface here; keep going
                        router.stats.increment_errors();
                        warn!("UDP receive error: {}", e);
                        continue;
                    },
                },
                () = token.cancelled() => {
                    info!("UDP receiver received cancellation signal, shutting down");
                    break;
                }
            };

            let packet = RawPacket {
                source,
                payload: Bytes::copy_from_slice(&buf[..len]),
                received_at: clock.now(),
            };

            if let Some(command) = router.route(&packet) {
                if let Err(e) = tracker.send(command).await {
                    warn!("Stopping receiver: {}", e);
                    break;
                }
            }
        }

        info!("UDP receiver terminated");
    })
}
