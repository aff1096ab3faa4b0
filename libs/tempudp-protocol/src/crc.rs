//! ModBus CRC16
//!
//! Seed 0xFFFF, reflected polynomial 0xA001, transmitted low byte first.

use crate::constants::{CRC16_POLYNOMIAL, CRC16_SEED};

/// Calculate the ModBus CRC16 of `data`
///
/// # Example
/// ```
/// use tempudp_protocol::crc::crc16_modbus;
/// // Read Holding Registers request: slave 1, address 0, quantity 2
/// assert_eq!(crc16_modbus(&[0x01, 0x03, 0x00, 0x00, 0x00, 0x02]), 0x0BC4);
/// ```
pub fn crc16_modbus(data: &[u8]) -> u16 {
    let mut crc = CRC16_SEED;
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ CRC16_POLYNOMIAL;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Check `data` against a CRC taken from the wire
#[inline]
pub fn verify(data: &[u8], expected: u16) -> bool {
    crc16_modbus(data) == expected
}

/// Append the CRC of `frame` in wire order (low byte first)
pub fn append_crc(frame: &mut Vec<u8>) {
    let crc = crc16_modbus(frame);
    frame.extend_from_slice(&crc.to_le_bytes());
}
