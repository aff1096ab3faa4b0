//! Human-readable device status report

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::tracker::{DeviceState, DeviceStatus};

/// Multi-line status summary, one line per device
pub fn status_report(states: &[DeviceState], now: DateTime<Utc>) -> String {
    let online = states
        .iter()
        .filter(|s| s.status == DeviceStatus::Online)
        .count();

    let faulted = states
        .iter()
        .filter(|s| s.last_reading.as_ref().is_some_and(|r| r.is_fault()))
        .count();

    let mut report = format!(
        "Device status: {} devices, {} online, {} offline, {} faulted",
        states.len(),
        online,
        states.len() - online,
        faulted
    );

    for state in states {
        let silent = (now - state.last_seen_at).num_seconds().max(0);
        let status = match state.status {
            DeviceStatus::Online => format!("ONLINE (seen {}s ago)", silent),
            DeviceStatus::Offline => format!("OFFLINE for {}s", silent),
        };

        // Writing to String buffer is infallible
        let _ = write!(
            report,
            "\n  device {:>3}  {:<22}",
            state.device_address, status
        );

        match &state.last_reading {
            Some(reading) => {
                let _ = write!(
                    report,
                    "  {:>6.1} °C {:>6.1} °F  raw=0x{:04X}",
                    reading.temperature_c,
                    reading.temperature_f(),
                    reading.raw_value as u16
                );
                if let Some(code) = reading.error_code {
                    let _ = write!(report, "  fault: {}", code.description());
                }
            },
            None => report.push_str("  no reading"),
        }

        let _ = write!(report, "  from {}", state.source);
    }

    report
}
