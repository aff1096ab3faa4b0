//! UDP device simulator
//!
//! Sends FC03 read responses the way a DS18B20 module does, optionally mixed
//! with text heartbeats and deliberately damaged frames.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use common::{to_hex_spaced, LogConfig};
use errors::{TempUdpError, TempUdpResult};
use tempudp_protocol::{encode_read_response, EncodeError, TextEncoding};

#[derive(Parser, Clone, Debug)]
#[command(
    name = "tempsim",
    version = env!("CARGO_PKG_VERSION"),
    about = "Simulated DS18B20 ModBus-RTU device sending over UDP",
    long_about = None
)]
struct Args {
    /// Receiver endpoint
    #[arg(short = 't', long, default_value = "127.0.0.1:8889")]
    target: SocketAddr,

    /// ModBus device address (0-247)
    #[arg(short = 'a', long, default_value_t = 1)]
    address: u8,

    /// Starting temperature in °C
    #[arg(long, default_value_t = 25.0, allow_hyphen_values = true)]
    temperature: f64,

    /// Change per frame in °C
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    step: f64,

    /// Extra registers appended after the temperature register
    #[arg(long, default_value_t = 0)]
    extra_registers: usize,

    /// Milliseconds between frames
    #[arg(short = 'i', long, default_value_t = 1000)]
    interval_ms: u64,

    /// Stop after this many frames
    #[arg(short = 'n', long)]
    count: Option<u64>,

    /// Send a text heartbeat after every N frames
    #[arg(long)]
    heartbeat_every: Option<u64>,

    /// Heartbeat text
    #[arg(long, default_value = "heartbeat")]
    heartbeat_text: String,

    /// Heartbeat text encoding (utf-8, gbk, big5, shift_jis, ...)
    #[arg(long, default_value = "utf-8")]
    heartbeat_encoding: String,

    /// Flip a CRC bit in every Nth frame
    #[arg(long)]
    corrupt_every: Option<u64>,

    /// Log level
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

fn temperature_word(celsius: f64) -> u16 {
    let tenths = (celsius * 10.0).round().clamp(f64::from(i16::MIN), f64::from(i16::MAX));
    tenths as i16 as u16
}

fn every(n: Option<u64>, seq: u64) -> bool {
    matches!(n, Some(n) if n > 0 && seq % n == 0)
}

/// Name the CLI flag responsible for an unbuildable frame
fn frame_error(e: EncodeError) -> TempUdpError {
    let field = match e {
        EncodeError::InvalidAddress(_) => "address",
        EncodeError::TooManyRegisters(_) | EncodeError::NoRegisters => "extra_registers",
    };
    TempUdpError::invalid_config(field, e.to_string())
}

struct Simulator {
    args: Args,
    heartbeat: Vec<u8>,
}

impl Simulator {
    fn new(args: Args) -> TempUdpResult<Self> {
        let encoding = TextEncoding::from_label(&args.heartbeat_encoding).ok_or_else(|| {
            TempUdpError::invalid_config(
                "heartbeat_encoding",
                format!("unknown encoding '{}'", args.heartbeat_encoding),
            )
        })?;
        let heartbeat = encoding.encode(&args.heartbeat_text).ok_or_else(|| {
            TempUdpError::invalid_config(
                "heartbeat_text",
                format!("not representable in {}", encoding),
            )
        })?;
        let simulator = Self { args, heartbeat };
        simulator.frame(1)?;
        Ok(simulator)
    }

    /// Frame number `seq` (1-based)
    fn frame(&self, seq: u64) -> TempUdpResult<Vec<u8>> {
        let celsius = self.args.temperature + self.args.step * (seq - 1) as f64;
        let mut registers = vec![temperature_word(celsius)];
        registers.extend((0..self.args.extra_registers).map(|i| i as u16));

        let mut frame = encode_read_response(self.args.address, &registers)
            .map_err(frame_error)?;
        if every(self.args.corrupt_every, seq) {
            let last = frame.len() - 1;
            frame[last] ^= 0x01;
        }
        Ok(frame)
    }

    async fn run(&self, socket: &UdpSocket, token: &CancellationToken) -> TempUdpResult<u64> {
        let mut interval = tokio::time::interval(Duration::from_millis(self.args.interval_ms.max(1)));
        let mut seq = 0u64;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = token.cancelled() => break,
            }
            if self.args.count.is_some_and(|count| seq >= count) {
                break;
            }
            seq += 1;

            let frame = self.frame(seq)?;
            socket.send_to(&frame, self.args.target).await?;
            debug!("Frame #{} -> {}: {}", seq, self.args.target, to_hex_spaced(&frame));

            if every(self.args.heartbeat_every, seq) {
                socket.send_to(&self.heartbeat, self.args.target).await?;
                debug!("Heartbeat -> {}: {}", self.args.target, to_hex_spaced(&self.heartbeat));
            }
        }
        Ok(seq)
    }
}

#[tokio::main]
async fn main() -> TempUdpResult<()> {
    let args = Args::parse();
    common::init_with_config(LogConfig {
        service_name: "tempsim".to_string(),
        level: args.log_level.clone(),
        ..LogConfig::default()
    })?;

    let target = args.target;
    let simulator = Simulator::new(args)?;
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    info!(
        "Simulating device {} -> {} from {}",
        simulator.args.address,
        target,
        socket.local_addr()?
    );

    let token = CancellationToken::new();
    let signal_watcher = common::cancel_on_shutdown(token.clone());
    let sent = simulator.run(&socket, &token).await;
    token.cancel();
    let _ = signal_watcher.await;

    match sent {
        Ok(sent) => {
            info!("Sent {} frames", sent);
            Ok(())
        },
        Err(e) => {
            warn!("Simulator stopped: {}", e);
            Err(e)
        },
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use tempudp_protocol::{classify, decode, Classification};

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["tempsim"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_temperature_word() {
        assert_eq!(temperature_word(30.0), 0x012C);
        assert_eq!(temperature_word(-20.0), 0xFF38);
        assert_eq!(temperature_word(9999.0), 0x7FFF);
    }

    #[test]
    fn test_frames_decode_with_step_and_corruption() {
        let sim = Simulator::new(args(&[
            "-a", "12", "--temperature", "-5", "--step", "0.5", "--corrupt-every", "3",
            "--extra-registers", "3",
        ]))
        .unwrap();

        let Classification::DataFrame(frame) = classify(&sim.frame(2).unwrap()) else {
            panic!("frame 2 must be valid");
        };
        assert_eq!(frame.byte_count, 8);
        let reading = decode(&frame);
        assert_eq!(reading.device_address, 12);
        assert_eq!(reading.temperature_c, -4.5);

        assert!(matches!(
            classify(&sim.frame(3).unwrap()),
            Classification::Unrecognized(_)
        ));
    }

    #[test]
    fn test_gbk_heartbeat_payload() {
        let sim = Simulator::new(args(&[
            "--heartbeat-text", "心跳包 heartbeat", "--heartbeat-encoding", "gbk",
        ]))
        .unwrap();
        assert!(std::str::from_utf8(&sim.heartbeat).is_err());
        assert_eq!(classify(&sim.heartbeat).kind_name(), "heartbeat");
    }

    #[test]
    fn test_bad_frame_args_name_their_flag() {
        let field_of = |extra: &[&str]| match Simulator::new(args(extra)) {
            Err(TempUdpError::InvalidConfig { field, .. }) => field,
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("arguments should be rejected"),
        };
        assert_eq!(field_of(&["--extra-registers", "200"]), "extra_registers");
        assert_eq!(field_of(&["-a", "250"]), "address");
    }

    #[test]
    fn test_unknown_encoding_rejected() {
        assert!(Simulator::new(args(&["--heartbeat-encoding", "latin1"])).is_err());
    }
}
