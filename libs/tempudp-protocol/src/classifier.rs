//! Payload classification
//!
//! Every UDP payload ends up as exactly one of: a validated FC03 data frame, a
//! heartbeat/registration packet, or an unrecognized payload carrying the reason
//! it was dropped.

use serde::Serialize;
use tracing::debug;

use crate::constants::{
    HEARTBEAT_INDICATORS, MIN_FRAME_LEN, MODBUS_DEVICE_ADDR_MAX, MODBUS_FUNCTION_CODE_READ,
    REGISTRATION_INDICATORS,
};
use crate::encoding::{DecodedText, EncodingDetector};
use crate::frame::{ModbusFrame, RejectReason, Rejection};

/// What a text packet announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatKind {
    Heartbeat,
    Registration,
    Generic,
}

impl HeartbeatKind {
    /// Match indicator keywords case-insensitively; heartbeat keywords win
    pub fn from_text(text: &str) -> Self {
        let lower = text.to_lowercase();
        if HEARTBEAT_INDICATORS.iter().any(|i| lower.contains(i)) {
            Self::Heartbeat
        } else if REGISTRATION_INDICATORS.iter().any(|i| lower.contains(i)) {
            Self::Registration
        } else {
            Self::Generic
        }
    }
}

/// A non-data packet treated as a liveness signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatPacket {
    pub raw: Vec<u8>,
    pub text: Option<DecodedText>,
    pub kind: HeartbeatKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    DataFrame(ModbusFrame),
    Heartbeat(HeartbeatPacket),
    Unrecognized(Rejection),
}

impl Classification {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::DataFrame(_) => "data_frame",
            Self::Heartbeat(_) => "heartbeat",
            Self::Unrecognized(_) => "unrecognized",
        }
    }
}

/// Sorts raw payloads into data frames, heartbeats and noise
#[derive(Debug, Clone, Default)]
pub struct FrameClassifier {
    signatures: Vec<Vec<u8>>,
    detector: EncodingDetector,
}

impl FrameClassifier {
    pub fn new(signatures: Vec<Vec<u8>>, detector: EncodingDetector) -> Self {
        Self {
            signatures: signatures.into_iter().filter(|s| !s.is_empty()).collect(),
            detector,
        }
    }

    fn matches_signature(&self, payload: &[u8]) -> bool {
        self.signatures.iter().any(|sig| payload.starts_with(sig))
    }

    pub fn classify(&self, payload: &[u8]) -> Classification {
        if payload.len() < MIN_FRAME_LEN {
            return Classification::Unrecognized(Rejection::noise(RejectReason::TooShort(
                payload.len(),
            )));
        }

        let address = payload[0];
        if address > MODBUS_DEVICE_ADDR_MAX {
            return Classification::Unrecognized(Rejection::noise(RejectReason::InvalidAddress(
                address,
            )));
        }

        let function_code = payload[1];
        if function_code == MODBUS_FUNCTION_CODE_READ {
            return match ModbusFrame::parse(payload) {
                Ok(frame) => Classification::DataFrame(frame),
                Err(rejection) => Classification::Unrecognized(rejection),
            };
        }

        let signature_hit = self.matches_signature(payload);
        let text = self.detector.decode_text(payload);
        if !signature_hit && text.is_none() {
            debug!(
                "Unrecognized payload: {} bytes, function code 0x{:02X}",
                payload.len(),
                function_code
            );
            return Classification::Unrecognized(Rejection::noise(
                RejectReason::UnsupportedFunction(function_code),
            ));
        }

        let kind = text
            .as_ref()
            .map_or(HeartbeatKind::Generic, |t| HeartbeatKind::from_text(&t.text));
        Classification::Heartbeat(HeartbeatPacket {
            raw: payload.to_vec(),
            text,
            kind,
        })
    }
}

/// Classify with no marker signatures and the default encoding order
pub fn classify(payload: &[u8]) -> Classification {
    FrameClassifier::default().classify(payload)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::encoding::TextEncoding;
    use crate::frame::encode_read_response;

    #[test]
    fn test_data_frame() {
        let payload = encode_read_response(1, &[0x012C]).unwrap();
        match classify(&payload) {
            Classification::DataFrame(frame) => assert_eq!(frame.device_address, 1),
            other => panic!("expected data frame, got {:?}", other),
        }
    }

    #[test]
    fn test_flipped_crc_is_unrecognized_with_address() {
        let mut payload = encode_read_response(5, &[0x00FA]).unwrap();
        payload[5] ^= 0x01;
        match classify(&payload) {
            Classification::Unrecognized(rejection) => {
                assert!(matches!(rejection.reason, RejectReason::CrcMismatch { .. }));
                assert_eq!(rejection.plausible_address, Some(5));
            }
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_short_text_is_too_short() {
        let result = classify(b"ping");
        assert_eq!(
            result,
            Classification::Unrecognized(Rejection::noise(RejectReason::TooShort(4)))
        );
    }

    #[test]
    fn test_ascii_heartbeat() {
        match classify(b"HEARTBEAT dev=7") {
            Classification::Heartbeat(packet) => {
                assert_eq!(packet.kind, HeartbeatKind::Heartbeat);
                let text = packet.text.unwrap();
                assert_eq!(text.encoding, TextEncoding::Utf8);
                assert_eq!(text.text, "HEARTBEAT dev=7");
            }
            other => panic!("expected heartbeat, got {:?}", other),
        }
    }

    #[test]
    fn test_registration_and_generic_text() {
        let registration = classify(b"login sn=AB12");
        assert!(matches!(
            registration,
            Classification::Heartbeat(HeartbeatPacket { kind: HeartbeatKind::Registration, .. })
        ));

        let generic = classify(b"hello world");
        assert!(matches!(
            generic,
            Classification::Heartbeat(HeartbeatPacket { kind: HeartbeatKind::Generic, .. })
        ));
    }

    #[test]
    fn test_gbk_heartbeat() {
        let (bytes, _, _) = encoding_rs::GBK.encode("心跳包 heartbeat");
        assert!(std::str::from_utf8(&bytes).is_err());

        match classify(&bytes) {
            Classification::Heartbeat(packet) => {
                assert_eq!(packet.kind, HeartbeatKind::Heartbeat);
                assert_eq!(packet.text.unwrap().encoding, TextEncoding::Gbk);
                assert_eq!(packet.raw, bytes.to_vec());
            }
            other => panic!("expected heartbeat, got {:?}", other),
        }
    }

    #[test]
    fn test_binary_noise() {
        let result = classify(&[0x01, 0x06, 0x00, 0x01, 0x00, 0x03, 0x98, 0x0B]);
        assert_eq!(
            result,
            Classification::Unrecognized(Rejection::noise(RejectReason::UnsupportedFunction(
                0x06
            )))
        );
    }

    #[test]
    fn test_invalid_address_applies_to_text() {
        let result = classify(&[0xFF, b'p', b'i', b'n', b'g', b'!']);
        assert_eq!(
            result,
            Classification::Unrecognized(Rejection::noise(RejectReason::InvalidAddress(0xFF)))
        );
    }

    #[test]
    fn test_signature_marks_binary_heartbeat() {
        let classifier = FrameClassifier::new(
            vec![vec![0xAA, 0x55], Vec::new()],
            EncodingDetector::default(),
        );
        let payload = [0xAA, 0x55, 0x00, 0x01, 0x02, 0x03];
        assert!(classify(&payload).kind_name() == "unrecognized");

        match classifier.classify(&payload) {
            Classification::Heartbeat(packet) => {
                assert_eq!(packet.kind, HeartbeatKind::Generic);
                assert!(packet.text.is_none());
            }
            other => panic!("expected heartbeat, got {:?}", other),
        }
    }

    #[test]
    fn test_heartbeat_keyword_wins_over_registration() {
        assert_eq!(
            HeartbeatKind::from_text("Register then Keep-Alive"),
            HeartbeatKind::Heartbeat
        );
        assert_eq!(HeartbeatKind::from_text("DEVICE_INFO v2"), HeartbeatKind::Registration);
        assert_eq!(HeartbeatKind::from_text("温度传感器"), HeartbeatKind::Generic);
    }
}
