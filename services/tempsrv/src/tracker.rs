//! Per-device liveness state machine
//!
//! ```text
//! UNSEEN ──valid frame──► ONLINE ──sweep (silent > timeout)──► OFFLINE
//!                            ▲                                    │
//!                            └────────────valid frame─────────────┘
//! ```
//!
//! The tracker is plain data: every operation takes an explicit timestamp and
//! returns the events it produced. The actor owns the only instance.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};

use tempudp_protocol::{HeartbeatKind, HeartbeatPacket, TemperatureReading};

use crate::events::TrackerEvent;

/// Hosts without devices kept for their registration text
pub const MAX_REGISTERED_PEERS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "ONLINE"),
            Self::Offline => write!(f, "OFFLINE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceState {
    pub device_address: u8,
    pub last_reading: Option<TemperatureReading>,
    pub last_seen_at: DateTime<Utc>,
    pub status: DeviceStatus,
    /// Endpoint of the most recent valid frame
    pub source: SocketAddr,
}

/// Last kind of traffic seen from a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerActivity {
    Data,
    Heartbeat,
    Registration,
    Generic,
}

impl From<HeartbeatKind> for PeerActivity {
    fn from(kind: HeartbeatKind) -> Self {
        match kind {
            HeartbeatKind::Heartbeat => Self::Heartbeat,
            HeartbeatKind::Registration => Self::Registration,
            HeartbeatKind::Generic => Self::Generic,
        }
    }
}

/// What is known about one sending host
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerState {
    pub source: SocketAddr,
    pub last_kind: PeerActivity,
    pub last_seen_at: DateTime<Utc>,
    pub registration_text: Option<String>,
    pub devices: BTreeSet<u8>,
}

impl PeerState {
    fn new(source: SocketAddr, last_kind: PeerActivity, at: DateTime<Utc>) -> Self {
        Self {
            source,
            last_kind,
            last_seen_at: at,
            registration_text: None,
            devices: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeviceTracker {
    devices: BTreeMap<u8, DeviceState>,
    peers: HashMap<IpAddr, PeerState>,
    offline_timeout: Duration,
    nudge_on_corrupt: bool,
}

impl DeviceTracker {
    pub fn new(offline_timeout: std::time::Duration, nudge_on_corrupt: bool) -> Self {
        Self {
            devices: BTreeMap::new(),
            peers: HashMap::new(),
            offline_timeout: Duration::from_std(offline_timeout)
                .unwrap_or_else(|_| Duration::seconds(10)),
            nudge_on_corrupt,
        }
    }

    pub fn offline_timeout(&self) -> Duration {
        self.offline_timeout
    }

    /// Record a validated reading; creates the device on first sighting
    pub fn on_valid_frame(
        &mut self,
        source: SocketAddr,
        reading: TemperatureReading,
        timestamp: DateTime<Utc>,
    ) -> Vec<TrackerEvent> {
        let address = reading.device_address;
        let mut events = vec![TrackerEvent::reading(&reading, timestamp)];

        let came_online = match self.devices.get_mut(&address) {
            Some(state) => {
                let was_offline = state.status == DeviceStatus::Offline;
                state.last_reading = Some(reading);
                state.last_seen_at = timestamp;
                state.status = DeviceStatus::Online;
                state.source = source;
                if was_offline {
                    info!("Device {} back online from {}", address, source);
                }
                was_offline
            },
            None => {
                info!("New device {} online from {}", address, source);
                self.devices.insert(
                    address,
                    DeviceState {
                        device_address: address,
                        last_reading: Some(reading),
                        last_seen_at: timestamp,
                        status: DeviceStatus::Online,
                        source,
                    },
                );
                true
            },
        };

        if came_online {
            events.push(TrackerEvent::StatusChanged {
                device_address: address,
                status: DeviceStatus::Online,
                timestamp,
            });
        }

        self.attach_device_to_peer(source, address, timestamp);
        events
    }

    fn attach_device_to_peer(&mut self, source: SocketAddr, address: u8, at: DateTime<Utc>) {
        let ip = source.ip();
        // A device address belongs to one host at a time
        for (peer_ip, peer) in self.peers.iter_mut() {
            if *peer_ip != ip {
                peer.devices.remove(&address);
            }
        }
        self.peers
            .retain(|_, peer| !peer.devices.is_empty() || peer.registration_text.is_some());

        let peer = self
            .peers
            .entry(ip)
            .or_insert_with(|| PeerState::new(source, PeerActivity::Data, at));
        peer.source = source;
        peer.last_kind = PeerActivity::Data;
        peer.last_seen_at = at;
        peer.devices.insert(address);
    }

    /// Refresh liveness of every device known behind the sending host
    ///
    /// Never creates a device and never changes a status. Unknown hosts are
    /// only remembered when they register.
    pub fn on_heartbeat(
        &mut self,
        source: SocketAddr,
        packet: &HeartbeatPacket,
        timestamp: DateTime<Utc>,
    ) -> Vec<TrackerEvent> {
        let registers = packet.kind == HeartbeatKind::Registration;
        if registers && !self.peers.contains_key(&source.ip()) {
            self.make_room_for_peer();
        }

        let mut refreshed = Vec::new();
        let peer = match self.peers.entry(source.ip()) {
            Entry::Occupied(entry) => Some(entry.into_mut()),
            Entry::Vacant(entry) if registers => {
                Some(entry.insert(PeerState::new(source, packet.kind.into(), timestamp)))
            },
            Entry::Vacant(_) => None,
        };
        if let Some(peer) = peer {
            peer.source = source;
            peer.last_kind = packet.kind.into();
            peer.last_seen_at = timestamp;
            if registers {
                peer.registration_text = packet.text.as_ref().map(|t| t.text.clone());
            }
            for address in &peer.devices {
                if let Some(state) = self.devices.get_mut(address) {
                    state.last_seen_at = timestamp;
                    refreshed.push(*address);
                }
            }
        }

        debug!(
            "{:?} packet from {} refreshed devices {:?}",
            packet.kind, source, refreshed
        );

        vec![TrackerEvent::HeartbeatReceived {
            source,
            kind: packet.kind,
            encoding: packet.text.as_ref().map(|t| t.encoding),
            text: packet.text.as_ref().map(|t| t.text.clone()),
            devices: refreshed,
            timestamp,
        }]
    }

    /// Evict the stalest device-less host once the registration cap is reached
    fn make_room_for_peer(&mut self) {
        let idle: Vec<(IpAddr, DateTime<Utc>)> = self
            .peers
            .iter()
            .filter(|(_, peer)| peer.devices.is_empty())
            .map(|(ip, peer)| (*ip, peer.last_seen_at))
            .collect();
        if idle.len() < MAX_REGISTERED_PEERS {
            return;
        }
        if let Some((ip, _)) = idle.into_iter().min_by_key(|(_, seen)| *seen) {
            debug!("Peer table full, forgetting {}", ip);
            self.peers.remove(&ip);
        }
    }

    /// Liveness nudge from a damaged frame; returns whether a record was touched
    pub fn on_corrupt_frame(&mut self, address: u8, timestamp: DateTime<Utc>) -> bool {
        if !self.nudge_on_corrupt {
            return false;
        }
        match self.devices.get_mut(&address) {
            Some(state) => {
                state.last_seen_at = timestamp;
                debug!("Corrupt frame nudged liveness of device {}", address);
                true
            },
            None => false,
        }
    }

    /// Mark every online device silent for longer than the timeout as offline
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<TrackerEvent> {
        let mut events = Vec::new();
        for state in self.devices.values_mut() {
            if state.status == DeviceStatus::Online && now - state.last_seen_at > self.offline_timeout
            {
                state.status = DeviceStatus::Offline;
                info!(
                    "Device {} offline: silent for {}s",
                    state.device_address,
                    (now - state.last_seen_at).num_seconds()
                );
                events.push(TrackerEvent::StatusChanged {
                    device_address: state.device_address,
                    status: DeviceStatus::Offline,
                    timestamp: now,
                });
            }
        }
        events
    }

    pub fn get(&self, address: u8) -> Option<&DeviceState> {
        self.devices.get(&address)
    }

    /// All devices, ordered by address
    pub fn snapshot(&self) -> Vec<DeviceState> {
        self.devices.values().cloned().collect()
    }

    pub fn peers(&self) -> Vec<PeerState> {
        let mut peers: Vec<_> = self.peers.values().cloned().collect();
        peers.sort_by_key(|p| p.source);
        peers
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
