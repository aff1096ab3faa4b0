//! Protocol constants for ModBus-RTU over UDP temperature devices
//!
//! Frame layout of a read-register response as sent by the devices:
//!
//! ```text
//! | addr | 0x03 | byte_count | register data ... | CRC lo | CRC hi |
//!    1      1        1          byte_count           2 (little-endian)
//! ```

// ============================================================================
// Frame Constants
// ============================================================================

/// Highest ModBus slave address; 248..=255 are reserved
pub const MODBUS_DEVICE_ADDR_MAX: u8 = 247;

/// Function code of the only supported response: Read Holding Registers
pub const MODBUS_FUNCTION_CODE_READ: u8 = 0x03;

/// Address + function code + byte count
pub const FRAME_HEADER_LEN: usize = 3;

/// Trailing CRC16 length
pub const CRC_LEN: usize = 2;

/// Shortest payload that can hold address, function code, byte count and CRC
pub const MIN_FRAME_LEN: usize = FRAME_HEADER_LEN + CRC_LEN;

/// A temperature register is one 16-bit word
pub const MIN_REGISTER_BYTES: usize = 2;

/// ModBus CRC16 seed
pub const CRC16_SEED: u16 = 0xFFFF;

/// ModBus CRC16 polynomial (reflected 0x8005)
pub const CRC16_POLYNOMIAL: u16 = 0xA001;

// ============================================================================
// DS18B20 Temperature Constants
// ============================================================================

/// Register value is tenths of a degree Celsius
pub const TEMPERATURE_SCALE: f64 = 10.0;

/// DS18B20 lower physical limit (°C)
pub const TEMPERATURE_MIN: f64 = -55.0;

/// DS18B20 upper physical limit (°C)
pub const TEMPERATURE_MAX: f64 = 125.0;

/// Raw register value reported when the probe is disconnected
pub const RAW_SENSOR_DISCONNECTED: u16 = 0x7FFF;

/// Raw register value reported when the probe failed to initialize
pub const RAW_SENSOR_INIT_FAILED: u16 = 0x0550;

// ============================================================================
// Text Packet Indicators
// ============================================================================

/// Case-insensitive substrings marking a heartbeat packet
pub const HEARTBEAT_INDICATORS: &[&str] = &[
    "heartbeat",
    "ping",
    "alive",
    "keep-alive",
    "heart_beat",
    "keepalive",
];

/// Case-insensitive substrings marking a registration packet
pub const REGISTRATION_INDICATORS: &[&str] = &[
    "register",
    "registration",
    "connect",
    "login",
    "device_info",
    "client_info",
];

// ============================================================================
// Helper Functions
// ============================================================================

/// Total frame length for a given register byte count
///
/// # Example
/// ```
/// use tempudp_protocol::constants::frame_len;
/// assert_eq!(frame_len(2), 7);
/// ```
#[inline]
pub const fn frame_len(byte_count: usize) -> usize {
    FRAME_HEADER_LEN + byte_count + CRC_LEN
}
