//! DS18B20 temperature register decoding

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{
    RAW_SENSOR_DISCONNECTED, RAW_SENSOR_INIT_FAILED, TEMPERATURE_MAX, TEMPERATURE_MIN,
    TEMPERATURE_SCALE,
};
use crate::frame::ModbusFrame;

/// Sensor fault attached to a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorErrorCode {
    SensorDisconnected,
    InitializationFailed,
    OutOfRange,
}

impl SensorErrorCode {
    pub fn description(&self) -> &'static str {
        match self {
            Self::SensorDisconnected => "sensor disconnected",
            Self::InitializationFailed => "sensor initialization failed",
            Self::OutOfRange => "temperature outside the -55..125 °C sensor range",
        }
    }
}

/// Raw register word that the firmware uses to report a fault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSentinel {
    pub raw: u16,
    pub code: SensorErrorCode,
}

/// Built-in sentinel table
pub fn default_sentinels() -> Vec<SensorSentinel> {
    vec![
        SensorSentinel {
            raw: RAW_SENSOR_DISCONNECTED,
            code: SensorErrorCode::SensorDisconnected,
        },
        SensorSentinel {
            raw: RAW_SENSOR_INIT_FAILED,
            code: SensorErrorCode::InitializationFailed,
        },
    ]
}

/// `-55.0 <= celsius <= 125.0`
#[inline]
pub fn is_in_range(celsius: f64) -> bool {
    (TEMPERATURE_MIN..=TEMPERATURE_MAX).contains(&celsius)
}

#[inline]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemperatureReading {
    pub device_address: u8,
    pub raw_value: i16,
    pub temperature_c: f64,
    pub in_range: bool,
    pub error_code: Option<SensorErrorCode>,
}

impl TemperatureReading {
    pub fn temperature_f(&self) -> f64 {
        celsius_to_fahrenheit(self.temperature_c)
    }

    pub fn is_fault(&self) -> bool {
        self.error_code.is_some()
    }
}

/// Turns validated frames into readings
#[derive(Debug, Clone)]
pub struct TemperatureDecoder {
    sentinels: Vec<SensorSentinel>,
}

impl Default for TemperatureDecoder {
    fn default() -> Self {
        Self::new(default_sentinels())
    }
}

impl TemperatureDecoder {
    pub fn new(sentinels: Vec<SensorSentinel>) -> Self {
        Self { sentinels }
    }

    /// Decode a single register word
    pub fn decode_register(&self, device_address: u8, word: u16) -> TemperatureReading {
        let raw_value = word as i16;
        let temperature_c = f64::from(raw_value) / TEMPERATURE_SCALE;
        let in_range = is_in_range(temperature_c);

        let error_code = self
            .sentinels
            .iter()
            .find(|s| s.raw == word)
            .map(|s| s.code)
            .or((!in_range).then_some(SensorErrorCode::OutOfRange));

        debug!(
            "Temperature decode: addr={}, raw=0x{:04X} ({}), {:.1}°C, in_range={}",
            device_address, word, raw_value, temperature_c, in_range
        );
        if let Some(code) = error_code {
            warn!(
                "Sensor fault on device {}: 0x{:04X} -> {}",
                device_address,
                word,
                code.description()
            );
        }

        TemperatureReading {
            device_address,
            raw_value,
            temperature_c,
            in_range,
            error_code,
        }
    }

    /// Decode the first register of a validated frame
    ///
    /// Parsed frames always carry at least one register; a hand-built frame
    /// with fewer than two data bytes reads as zero.
    pub fn decode(&self, frame: &ModbusFrame) -> TemperatureReading {
        let word = frame.first_register().unwrap_or_default();
        self.decode_register(frame.device_address, word)
    }
}

/// Decode with the built-in sentinel table
pub fn decode(frame: &ModbusFrame) -> TemperatureReading {
    TemperatureDecoder::default().decode(frame)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::classifier::{classify, Classification};
    use crate::frame::encode_read_response;

    fn frame_for(address: u8, word: u16) -> ModbusFrame {
        let payload = encode_read_response(address, &[word]).unwrap();
        ModbusFrame::parse(&payload).unwrap()
    }

    #[test]
    fn test_positive_reading() {
        let reading = decode(&frame_for(1, 0x012C));
        assert_eq!(reading.device_address, 1);
        assert_eq!(reading.raw_value, 300);
        assert_eq!(reading.temperature_c, 30.0);
        assert_eq!(reading.temperature_f(), 86.0);
        assert!(reading.in_range);
        assert_eq!(reading.error_code, None);
    }

    #[test]
    fn test_negative_reading() {
        let reading = decode(&frame_for(2, 0xFF38));
        assert_eq!(reading.raw_value, -200);
        assert_eq!(reading.temperature_c, -20.0);
        assert!(reading.in_range);
        assert_eq!(reading.error_code, None);
    }

    #[test]
    fn test_out_of_range_reading() {
        let reading = decode(&frame_for(3, 2000));
        assert_eq!(reading.temperature_c, 200.0);
        assert!(!reading.in_range);
        assert_eq!(reading.error_code, Some(SensorErrorCode::OutOfRange));
    }

    #[test]
    fn test_range_boundaries() {
        let decoder = TemperatureDecoder::default();
        assert!(decoder.decode_register(1, (-550i16) as u16).in_range);
        assert!(decoder.decode_register(1, 1250).in_range);
        assert!(!decoder.decode_register(1, (-551i16) as u16).in_range);
        assert!(!decoder.decode_register(1, 1251).in_range);
    }

    #[test]
    fn test_sentinels() {
        let disconnected = decode(&frame_for(4, 0x7FFF));
        assert_eq!(disconnected.error_code, Some(SensorErrorCode::SensorDisconnected));
        assert!(!disconnected.in_range);

        let init_failed = decode(&frame_for(4, 0x0550));
        assert_eq!(init_failed.error_code, Some(SensorErrorCode::InitializationFailed));
        assert_eq!(init_failed.temperature_c, 136.0);
    }

    #[test]
    fn test_custom_sentinel_inside_range() {
        let decoder = TemperatureDecoder::new(vec![SensorSentinel {
            raw: 0x0000,
            code: SensorErrorCode::SensorDisconnected,
        }]);
        let reading = decoder.decode_register(1, 0x0000);
        assert!(reading.in_range);
        assert_eq!(reading.error_code, Some(SensorErrorCode::SensorDisconnected));

        // Without the default table 0x7FFF is only out of range
        let reading = decoder.decode_register(1, 0x7FFF);
        assert_eq!(reading.error_code, Some(SensorErrorCode::OutOfRange));
    }

    #[test]
    fn test_range_law_holds_for_every_register_value() {
        let decoder = TemperatureDecoder::new(Vec::new());
        for raw in i16::MIN..=i16::MAX {
            let reading = decoder.decode_register(1, raw as u16);
            let celsius = f64::from(raw) / 10.0;
            assert_eq!(reading.temperature_c, celsius);
            assert_eq!(reading.in_range, (-55.0..=125.0).contains(&celsius));
            assert_eq!(reading.error_code.is_some(), !reading.in_range);
        }
    }

    #[test]
    fn test_encode_classify_decode_reproduces_register() {
        for word in [0x0000u16, 0x012C, 0xFF38, 0x04E2, 0xFC90, 0x7FFF, 0x8000] {
            let payload = encode_read_response(17, &[word, 0x1234]).unwrap();
            let frame = match classify(&payload) {
                Classification::DataFrame(frame) => frame,
                other => panic!("expected data frame, got {:?}", other),
            };
            let reading = decode(&frame);
            assert_eq!(reading.raw_value as u16, word);
            assert_eq!(reading.device_address, 17);
        }
    }

    #[test]
    fn test_serde_error_code() {
        assert_eq!(
            serde_json::to_string(&SensorErrorCode::InitializationFailed).unwrap(),
            r#""initialization_failed""#
        );
        let sentinel: SensorSentinel =
            serde_json::from_str(r#"{"raw":32767,"code":"sensor_disconnected"}"#).unwrap();
        assert_eq!(sentinel.raw, RAW_SENSOR_DISCONNECTED);
    }
}
