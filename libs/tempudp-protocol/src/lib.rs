//! ModBus-RTU over UDP protocol layer for DS18B20 temperature devices
//!
//! Pure and synchronous: every function takes bytes and returns values. Socket
//! handling and device state live in the service.
//!
//! ```
//! use tempudp_protocol::{classify, decode, encode_read_response, Classification};
//!
//! let payload = encode_read_response(1, &[0x012C]).unwrap();
//! let Classification::DataFrame(frame) = classify(&payload) else {
//!     panic!("not a data frame");
//! };
//! assert_eq!(decode(&frame).temperature_c, 30.0);
//! ```

pub mod classifier;
pub mod constants;
pub mod crc;
pub mod encoding;
pub mod frame;
pub mod temperature;

pub use classifier::{classify, Classification, FrameClassifier, HeartbeatKind, HeartbeatPacket};
pub use encoding::{decode_text, DecodedText, EncodingDetector, TextEncoding};
pub use frame::{encode_read_response, EncodeError, ModbusFrame, RejectReason, Rejection};
pub use temperature::{
    decode, default_sentinels, SensorErrorCode, SensorSentinel, TemperatureDecoder,
    TemperatureReading,
};
