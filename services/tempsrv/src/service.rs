//! Service wiring: socket, tracker actor, receiver and sweep

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use errors::{TempUdpError, TempUdpResult};

use crate::actor::{spawn_tracker, TrackerHandle};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::events::EventSink;
use crate::receiver::{self, IngestCounters, IngestStats, PacketRouter};
use crate::report::status_report;
use crate::runtime::start_sweep_task;
use crate::tracker::{DeviceState, DeviceTracker, PeerState};

pub struct TemperatureService;

impl TemperatureService {
    /// Bind the UDP port and start all tasks
    pub async fn start<S>(config: &AppConfig, sink: S) -> TempUdpResult<ServiceHandle>
    where
        S: EventSink + 'static,
    {
        Self::start_with_clock(config, sink, Arc::new(SystemClock)).await
    }

    pub async fn start_with_clock<S>(
        config: &AppConfig,
        sink: S,
        clock: Arc<dyn Clock>,
    ) -> TempUdpResult<ServiceHandle>
    where
        S: EventSink + 'static,
    {
        config.validate()?;
        let socket = receiver::bind(&config.bind_endpoint()).await?;
        Self::start_with_socket(config, socket, sink, clock)
    }

    /// Start on an already bound socket; `config.udp` address and port are ignored
    pub fn start_with_socket<S>(
        config: &AppConfig,
        socket: UdpSocket,
        sink: S,
        clock: Arc<dyn Clock>,
    ) -> TempUdpResult<ServiceHandle>
    where
        S: EventSink + 'static,
    {
        config.validate_runtime()?;
        let router = PacketRouter::new(config.classifier()?, config.decoder());
        let stats = router.stats();
        let local_addr = socket.local_addr()?;

        let token = CancellationToken::new();
        let tracker = DeviceTracker::new(config.offline_timeout(), config.tracker.nudge_on_corrupt);
        let (handle, actor_task) =
            spawn_tracker(tracker, sink, config.tracker.queue_capacity, token.clone());

        let receiver_task = receiver::spawn_receiver(
            socket,
            router,
            handle.clone(),
            Arc::clone(&clock),
            config.udp.recv_buffer_size,
            token.clone(),
        );
        let (sweep_task, _) = start_sweep_task(
            handle.clone(),
            Arc::clone(&clock),
            config.sweep_interval(),
            &token,
        );

        info!(
            "{} started on {} (offline timeout {}s, sweep every {}ms)",
            config.service.name,
            local_addr,
            config.tracker.offline_timeout_secs,
            config.tracker.sweep_interval_ms
        );

        Ok(ServiceHandle {
            local_addr,
            tracker: handle,
            stats,
            clock,
            token,
            receiver_task,
            sweep_task,
            actor_task,
        })
    }
}

/// Running service
pub struct ServiceHandle {
    local_addr: SocketAddr,
    tracker: TrackerHandle,
    stats: Arc<IngestStats>,
    clock: Arc<dyn Clock>,
    token: CancellationToken,
    receiver_task: JoinHandle<()>,
    sweep_task: JoinHandle<()>,
    actor_task: JoinHandle<()>,
}

impl ServiceHandle {
    /// Bound UDP address (resolves port 0)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn tracker(&self) -> &TrackerHandle {
        &self.tracker
    }

    pub fn statuses(&self) -> Vec<DeviceState> {
        self.tracker.statuses()
    }

    pub fn peers(&self) -> Vec<PeerState> {
        self.tracker.peers()
    }

    pub fn stats(&self) -> IngestCounters {
        self.stats.counters()
    }

    pub fn status_report(&self) -> String {
        status_report(&self.tracker.statuses(), self.clock.now())
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop receiving, let the tracker drain its queue, return the final states
    pub async fn shutdown(self) -> TempUdpResult<Vec<DeviceState>> {
        info!("Starting graceful shutdown...");
        self.token.cancel();

        let mut failed = Vec::new();
        for (name, task) in [
            ("receiver", self.receiver_task),
            ("sweep", self.sweep_task),
            ("tracker", self.actor_task),
        ] {
            if let Err(e) = task.await {
                error!("{} task failed during shutdown: {}", name, e);
                failed.push(format!("{}: {}", name, e));
            }
        }

        if !failed.is_empty() {
            return Err(TempUdpError::ShutdownError(failed.join("; ")));
        }

        let states = self.tracker.statuses();
        info!("Shutdown completed with {} tracked devices", states.len());
        Ok(states)
    }
}
