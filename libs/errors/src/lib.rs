//! Unified error handling for tempudp services
//!
//! Protocol-level rejections (bad CRC, short frames, noise) are ordinary values in
//! `tempudp-protocol` and never surface here. This crate covers the fallible
//! service plumbing: configuration, sockets, logging setup and task wiring.

use thiserror::Error;

// ============================================================================
// TempUdpError - Main error type
// ============================================================================

/// Main error type for tempudp services
#[derive(Debug, Error)]
pub enum TempUdpError {
    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] Box<figment::Error>),

    // ======================================
    // Network Errors
    // ======================================
    #[error("Failed to bind {endpoint}: {reason}")]
    Bind { endpoint: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ======================================
    // Service & Runtime Errors
    // ======================================
    #[error("Service startup failed: {0}")]
    StartupFailed(String),

    #[error("Tracker unavailable: {0}")]
    TrackerUnavailable(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

/// Result type alias using TempUdpError
pub type TempUdpResult<T> = Result<T, TempUdpError>;

impl TempUdpError {
    /// Stable error code for logs
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::ConfigLoad(_) => "CONFIG_LOAD_ERROR",
            Self::Bind { .. } => "BIND_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::StartupFailed(_) => "STARTUP_FAILED",
            Self::TrackerUnavailable(_) => "TRACKER_UNAVAILABLE",
            Self::ShutdownError(_) => "SHUTDOWN_ERROR",
        }
    }

    /// Build an `InvalidConfig` error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// Conversion traits for common error types
impl From<figment::Error> for TempUdpError {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::TempUdpError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::TempUdpError::Configuration(format!($fmt, $($arg)*))
    };
}

// Tests
#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TempUdpError::invalid_config("udp.port", "must be non-zero").error_code(),
            "INVALID_CONFIG"
        );
        assert_eq!(
            TempUdpError::TrackerUnavailable("closed".into()).error_code(),
            "TRACKER_UNAVAILABLE"
        );
    }

    #[test]
    fn test_conversions() {
        let io = TempUdpError::from(std::io::Error::other("boom"));
        assert_eq!(io.error_code(), "IO_ERROR");

        let cfg = config_error!("bad value {}", 3);
        assert_eq!(cfg.error_code(), "CONFIGURATION_ERROR");
        assert_eq!(cfg.to_string(), "Configuration error: bad value 3");
    }

    #[test]
    fn test_invalid_config_display() {
        let err = TempUdpError::invalid_config("tracker.sweep_interval_ms", "must be > 0");
        assert_eq!(
            err.to_string(),
            "Invalid configuration: tracker.sweep_interval_ms: must be > 0"
        );
    }
}
