//! Tracker actor
//!
//! One task owns the [`DeviceTracker`]. The receiver and the sweep timer feed it
//! through a bounded queue; readers see a snapshot published over a watch
//! channel after every command.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use errors::{TempUdpError, TempUdpResult};
use tempudp_protocol::{HeartbeatPacket, TemperatureReading};

use crate::events::EventSink;
use crate::tracker::{DeviceState, DeviceTracker, PeerState};

/// Work item for the tracker
#[derive(Debug, Clone)]
pub enum Command {
    Frame {
        source: SocketAddr,
        reading: TemperatureReading,
        received_at: DateTime<Utc>,
    },
    Heartbeat {
        source: SocketAddr,
        packet: HeartbeatPacket,
        received_at: DateTime<Utc>,
    },
    CorruptFrame {
        address: u8,
        received_at: DateTime<Utc>,
    },
    Sweep {
        now: DateTime<Utc>,
    },
}

/// Read-only copy of the tracker state
#[derive(Debug, Clone, Default)]
pub struct TrackerSnapshot {
    pub devices: Vec<DeviceState>,
    pub peers: Vec<PeerState>,
}

impl TrackerSnapshot {
    fn of(tracker: &DeviceTracker) -> Self {
        Self {
            devices: tracker.snapshot(),
            peers: tracker.peers(),
        }
    }
}

/// Cloneable handle to a running tracker actor
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<Arc<TrackerSnapshot>>,
}

impl TrackerHandle {
    pub async fn send(&self, command: Command) -> TempUdpResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| TempUdpError::TrackerUnavailable("command queue closed".to_string()))
    }

    /// Current device states, ordered by address
    pub fn statuses(&self) -> Vec<DeviceState> {
        self.snapshot.borrow().devices.clone()
    }

    pub fn peers(&self) -> Vec<PeerState> {
        self.snapshot.borrow().peers.clone()
    }

    pub fn snapshot(&self) -> Arc<TrackerSnapshot> {
        Arc::clone(&self.snapshot.borrow())
    }

    /// Watch receiver that wakes on every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<TrackerSnapshot>> {
        self.snapshot.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

struct TrackerActor<S> {
    tracker: DeviceTracker,
    sink: S,
    commands: mpsc::Receiver<Command>,
    snapshot: watch::Sender<Arc<TrackerSnapshot>>,
}

impl<S: EventSink> TrackerActor<S> {
    fn handle(&mut self, command: Command) {
        let events = match command {
            Command::Frame {
                source,
                reading,
                received_at,
            } => self.tracker.on_valid_frame(source, reading, received_at),
            Command::Heartbeat {
                source,
                packet,
                received_at,
            } => self.tracker.on_heartbeat(source, &packet, received_at),
            Command::CorruptFrame {
                address,
                received_at,
            } => {
                if !self.tracker.on_corrupt_frame(address, received_at) {
                    return;
                }
                Vec::new()
            },
            Command::Sweep { now } => self.tracker.sweep(now),
        };

        // Snapshot before events
        self.snapshot
            .send_replace(Arc::new(TrackerSnapshot::of(&self.tracker)));
        for event in &events {
            self.sink.emit(event);
        }
    }

    async fn run(mut self, token: CancellationToken) {
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle(command),
                    None => break,
                },
                () = token.cancelled() => {
                    debug!("Tracker actor received cancellation signal, draining queue");
                    self.commands.close();
                    while let Some(command) = self.commands.recv().await {
                        self.handle(command);
                    }
                    break;
                }
            }
        }
        info!("Tracker actor terminated with {} devices", self.tracker.len());
    }
}

/// Spawn the actor that owns `tracker`
pub fn spawn_tracker<S>(
    tracker: DeviceTracker,
    sink: S,
    queue_capacity: usize,
    token: CancellationToken,
) -> (TrackerHandle, JoinHandle<()>)
where
    S: EventSink + 'static,
{
    let (command_tx, command_rx) = mpsc::channel(queue_capacity.max(1));
    let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(TrackerSnapshot::of(&tracker)));

    let actor = TrackerActor {
        tracker,
        sink,
        commands: command_rx,
        snapshot: snapshot_tx,
    };
    let handle = tokio::spawn(actor.run(token));

    (
        TrackerHandle {
            commands: command_tx,
            snapshot: snapshot_rx,
        },
        handle,
    )
}
