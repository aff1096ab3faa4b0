//! ModBus-RTU read-register response frames
//!
//! Parsing never fails loudly: a payload that is not a well-formed response is
//! reported as a [`Rejection`] value so the caller can drop it and move on.

use thiserror::Error;
use tracing::debug;

use crate::constants::{
    frame_len, FRAME_HEADER_LEN, MIN_FRAME_LEN, MIN_REGISTER_BYTES, MODBUS_DEVICE_ADDR_MAX,
    MODBUS_FUNCTION_CODE_READ,
};
use crate::crc;

/// Maximum registers in one FC03 response: (253 - 2) / 2
pub const MODBUS_MAX_READ_REGISTERS: usize = 125;

/// Why a payload was not accepted as a data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("payload too short: {0} bytes")]
    TooShort(usize),

    #[error("device address {0} out of range")]
    InvalidAddress(u8),

    #[error("unsupported function code 0x{0:02X}")]
    UnsupportedFunction(u8),

    #[error("byte count {0} is less than one register")]
    InvalidByteCount(u8),

    #[error("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("CRC mismatch: received 0x{received:04X}, computed 0x{computed:04X}")]
    CrcMismatch { received: u16, computed: u16 },
}

impl RejectReason {
    /// A read response that got damaged on the way, as opposed to noise
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::InvalidByteCount(_) | Self::LengthMismatch { .. } | Self::CrcMismatch { .. }
        )
    }
}

/// A dropped payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectReason,
    /// Set when the payload looked like a damaged frame from a valid address
    pub plausible_address: Option<u8>,
}

impl Rejection {
    pub fn noise(reason: RejectReason) -> Self {
        Self {
            reason,
            plausible_address: None,
        }
    }

    pub fn corrupt(address: u8, reason: RejectReason) -> Self {
        Self {
            reason,
            plausible_address: Some(address),
        }
    }
}

/// Error building a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("device address {0} out of range")]
    InvalidAddress(u8),

    #[error(
        "{0} registers do not fit one response (max {max})",
        max = MODBUS_MAX_READ_REGISTERS
    )]
    TooManyRegisters(usize),

    #[error("a response needs at least one register")]
    NoRegisters,
}

/// Decoded FC03 response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModbusFrame {
    pub device_address: u8,
    pub function_code: u8,
    pub byte_count: u8,
    pub register_bytes: Vec<u8>,
    pub crc_received: u16,
    pub crc_computed: u16,
}

impl ModbusFrame {
    /// Parse a read-register response
    pub fn parse(payload: &[u8]) -> Result<Self, Rejection> {
        if payload.len() < MIN_FRAME_LEN {
            return Err(Rejection::noise(RejectReason::TooShort(payload.len())));
        }

        let device_address = payload[0];
        if device_address > MODBUS_DEVICE_ADDR_MAX {
            return Err(Rejection::noise(RejectReason::InvalidAddress(
                device_address,
            )));
        }

        let function_code = payload[1];
        if function_code != MODBUS_FUNCTION_CODE_READ {
            return Err(Rejection::noise(RejectReason::UnsupportedFunction(
                function_code,
            )));
        }

        let byte_count = payload[2];
        if (byte_count as usize) < MIN_REGISTER_BYTES {
            return Err(Rejection::corrupt(
                device_address,
                RejectReason::InvalidByteCount(byte_count),
            ));
        }

        let expected = frame_len(byte_count as usize);
        if payload.len() != expected {
            return Err(Rejection::corrupt(
                device_address,
                RejectReason::LengthMismatch {
                    expected,
                    actual: payload.len(),
                },
            ));
        }

        let body_end = FRAME_HEADER_LEN + byte_count as usize;
        let crc_received = u16::from_le_bytes([payload[body_end], payload[body_end + 1]]);
        let crc_computed = crc::crc16_modbus(&payload[..body_end]);

        debug!(
            "FC03 frame: addr={}, byte_count={}, CRC recv={:04X} calc={:04X}",
            device_address, byte_count, crc_received, crc_computed
        );

        if crc_received != crc_computed {
            return Err(Rejection::corrupt(
                device_address,
                RejectReason::CrcMismatch {
                    received: crc_received,
                    computed: crc_computed,
                },
            ));
        }

        Ok(Self {
            device_address,
            function_code,
            byte_count,
            register_bytes: payload[FRAME_HEADER_LEN..body_end].to_vec(),
            crc_received,
            crc_computed,
        })
    }

    /// First register word, big-endian
    pub fn first_register(&self) -> Option<u16> {
        match self.register_bytes.as_slice() {
            [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }
}

/// Build an FC03 response frame carrying `registers`, CRC included
pub fn encode_read_response(device_address: u8, registers: &[u16]) -> Result<Vec<u8>, EncodeError> {
    if device_address > MODBUS_DEVICE_ADDR_MAX {
        return Err(EncodeError::InvalidAddress(device_address));
    }
    if registers.is_empty() {
        return Err(EncodeError::NoRegisters);
    }
    if registers.len() > MODBUS_MAX_READ_REGISTERS {
        return Err(EncodeError::TooManyRegisters(registers.len()));
    }

    let byte_count = registers.len() * 2;
    let mut frame = Vec::with_capacity(frame_len(byte_count));
    frame.push(device_address);
    frame.push(MODBUS_FUNCTION_CODE_READ);
    frame.push(byte_count as u8);
    for register in registers {
        frame.extend_from_slice(&register.to_be_bytes());
    }
    crc::append_crc(&mut frame);
    Ok(frame)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    fn with_crc(body: &[u8]) -> Vec<u8> {
        let mut frame = body.to_vec();
        crc::append_crc(&mut frame);
        frame
    }

    #[test]
    fn test_parse_single_register() {
        let payload = with_crc(&[0x01, 0x03, 0x02, 0x01, 0x2C]);
        let frame = ModbusFrame::parse(&payload).unwrap();

        assert_eq!(frame.device_address, 1);
        assert_eq!(frame.function_code, 0x03);
        assert_eq!(frame.byte_count, 2);
        assert_eq!(frame.register_bytes, vec![0x01, 0x2C]);
        assert_eq!(frame.first_register(), Some(0x012C));
        assert_eq!(frame.crc_received, frame.crc_computed);
    }

    #[test]
    fn test_parse_multi_register_uses_first() {
        let payload = encode_read_response(9, &[0x00FA, 0x7FFF, 0x0000, 0x0001]).unwrap();
        assert_eq!(payload.len(), 13);

        let frame = ModbusFrame::parse(&payload).unwrap();
        assert_eq!(frame.byte_count, 8);
        assert_eq!(frame.first_register(), Some(0x00FA));
    }

    #[test]
    fn test_too_short() {
        let err = ModbusFrame::parse(&[0x01, 0x03, 0x02, 0x01]).unwrap_err();
        assert_eq!(err.reason, RejectReason::TooShort(4));
        assert_eq!(err.plausible_address, None);
    }

    #[test]
    fn test_invalid_address() {
        let payload = with_crc(&[248, 0x03, 0x02, 0x01, 0x2C]);
        let err = ModbusFrame::parse(&payload).unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidAddress(248));
        assert!(!err.reason.is_corruption());
    }

    #[test]
    fn test_unsupported_function() {
        let payload = with_crc(&[0x01, 0x04, 0x02, 0x01, 0x2C]);
        let err = ModbusFrame::parse(&payload).unwrap_err();
        assert_eq!(err.reason, RejectReason::UnsupportedFunction(0x04));
        assert_eq!(err.plausible_address, None);
    }

    #[test]
    fn test_byte_count_too_small() {
        let payload = with_crc(&[0x02, 0x03, 0x01, 0x2C]);
        let err = ModbusFrame::parse(&payload).unwrap_err();
        assert_eq!(err.reason, RejectReason::InvalidByteCount(1));
        assert_eq!(err.plausible_address, Some(2));
    }

    #[test]
    fn test_length_mismatch() {
        // Declares four data bytes, carries two
        let payload = with_crc(&[0x03, 0x03, 0x04, 0x01, 0x2C]);
        let err = ModbusFrame::parse(&payload).unwrap_err();
        assert_eq!(
            err.reason,
            RejectReason::LengthMismatch {
                expected: 9,
                actual: 7
            }
        );
        assert_eq!(err.plausible_address, Some(3));
    }

    #[test]
    fn test_trailing_garbage_is_length_mismatch() {
        let mut payload = with_crc(&[0x01, 0x03, 0x02, 0x01, 0x2C]);
        payload.push(0x00);
        let err = ModbusFrame::parse(&payload).unwrap_err();
        assert!(matches!(err.reason, RejectReason::LengthMismatch { .. }));
    }

    #[test]
    fn test_crc_mismatch() {
        let mut payload = with_crc(&[0x01, 0x03, 0x02, 0x01, 0x2C]);
        let last = payload.len() - 1;
        payload[last] ^= 0xFF;

        let err = ModbusFrame::parse(&payload).unwrap_err();
        assert!(matches!(err.reason, RejectReason::CrcMismatch { .. }));
        assert!(err.reason.is_corruption());
        assert_eq!(err.plausible_address, Some(1));
    }

    #[test]
    fn test_encode_errors() {
        assert_eq!(
            encode_read_response(250, &[1]).unwrap_err(),
            EncodeError::InvalidAddress(250)
        );
        assert_eq!(encode_read_response(1, &[]).unwrap_err(), EncodeError::NoRegisters);
        assert_eq!(
            encode_read_response(1, &[0u16; 126]).unwrap_err(),
            EncodeError::TooManyRegisters(126)
        );
    }

    #[test]
    fn test_encode_matches_wire_layout() {
        let frame = encode_read_response(1, &[0x012C]).unwrap();
        assert_eq!(&frame[..5], &[0x01, 0x03, 0x02, 0x01, 0x2C]);
        let crc = crc::crc16_modbus(&frame[..5]);
        assert_eq!(&frame[5..], &crc.to_le_bytes());
    }

    #[test]
    fn test_reject_reason_display() {
        assert_eq!(
            RejectReason::UnsupportedFunction(0x83).to_string(),
            "unsupported function code 0x83"
        );
        assert_eq!(
            RejectReason::CrcMismatch {
                received: 0x1234,
                computed: 0xABCD
            }
            .to_string(),
            "CRC mismatch: received 0x1234, computed 0xABCD"
        );
    }
}
