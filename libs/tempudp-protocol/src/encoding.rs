//! Text payload decoding
//!
//! Devices announce themselves with short text packets whose encoding depends on
//! the firmware vendor. Each candidate encoding is tried in priority order and
//! the first clean decode wins.

use std::fmt;

use encoding_rs::{Encoding, BIG5, EUC_KR, GB18030, GBK, SHIFT_JIS};
use serde::{Deserialize, Serialize};

/// Supported text encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextEncoding {
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,
    #[serde(rename = "gbk", alias = "gb2312")]
    Gbk,
    #[serde(rename = "gb18030")]
    Gb18030,
    #[serde(rename = "big5")]
    Big5,
    #[serde(rename = "shift_jis", alias = "sjis")]
    ShiftJis,
    #[serde(rename = "euc-kr")]
    EucKr,
}

impl TextEncoding {
    /// Default priority: UTF-8 first, then the common CJK multi-byte encodings
    pub const DEFAULT_PRIORITY: [TextEncoding; 4] = [
        TextEncoding::Utf8,
        TextEncoding::Gbk,
        TextEncoding::Big5,
        TextEncoding::ShiftJis,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Gbk => "gbk",
            Self::Gb18030 => "gb18030",
            Self::Big5 => "big5",
            Self::ShiftJis => "shift_jis",
            Self::EucKr => "euc-kr",
        }
    }

    /// Look up by configuration label, case-insensitive
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "gbk" | "gb2312" => Some(Self::Gbk),
            "gb18030" => Some(Self::Gb18030),
            "big5" => Some(Self::Big5),
            "shift_jis" | "sjis" => Some(Self::ShiftJis),
            "euc-kr" => Some(Self::EucKr),
            _ => None,
        }
    }

    fn codec(&self) -> &'static Encoding {
        match self {
            Self::Utf8 => encoding_rs::UTF_8,
            Self::Gbk => GBK,
            Self::Gb18030 => GB18030,
            Self::Big5 => BIG5,
            Self::ShiftJis => SHIFT_JIS,
            Self::EucKr => EUC_KR,
        }
    }

    /// Strict decode: `None` on any malformed sequence
    pub fn try_decode(&self, bytes: &[u8]) -> Option<String> {
        self.codec()
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|text| text.into_owned())
    }

    /// Encode `text`; `None` if a character has no mapping in this encoding
    pub fn encode(&self, text: &str) -> Option<Vec<u8>> {
        let (bytes, _, had_unmappable) = self.codec().encode(text);
        (!had_unmappable).then(|| bytes.into_owned())
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Successfully decoded text and the encoding that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedText {
    pub text: String,
    pub encoding: TextEncoding,
}

/// Printable means no control characters other than common whitespace, and no
/// U+FFFD smuggled in by the sender
pub fn is_printable(text: &str) -> bool {
    !text.is_empty()
        && text
            .chars()
            .all(|c| c != '\u{FFFD}' && (!c.is_control() || matches!(c, '\r' | '\n' | '\t')))
}

/// Ordered list of encodings to try
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingDetector {
    priority: Vec<TextEncoding>,
}

impl Default for EncodingDetector {
    fn default() -> Self {
        Self::new(TextEncoding::DEFAULT_PRIORITY.to_vec())
    }
}

impl EncodingDetector {
    pub fn new(priority: Vec<TextEncoding>) -> Self {
        Self { priority }
    }

    /// First encoding that decodes `bytes` cleanly into printable text
    pub fn decode_text(&self, bytes: &[u8]) -> Option<DecodedText> {
        self.priority.iter().find_map(|encoding| {
            encoding
                .try_decode(bytes)
                .filter(|text| is_printable(text))
                .map(|text| DecodedText {
                    text,
                    encoding: *encoding,
                })
        })
    }
}

/// Decode with the default priority list
pub fn decode_text(bytes: &[u8]) -> Option<DecodedText> {
    EncodingDetector::default().decode_text(bytes)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_utf8() {
        let decoded = decode_text(b"heartbeat 01").unwrap();
        assert_eq!(decoded.text, "heartbeat 01");
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
    }

    #[test]
    fn test_utf8_multibyte() {
        let decoded = decode_text("设备注册 register".as_bytes()).unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Utf8);
        assert_eq!(decoded.text, "设备注册 register");
    }

    #[test]
    fn test_gbk_falls_through_utf8() {
        let (bytes, _, had_errors) = GBK.encode("心跳包 heartbeat");
        assert!(!had_errors);
        assert!(std::str::from_utf8(&bytes).is_err());

        let decoded = decode_text(&bytes).unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Gbk);
        assert_eq!(decoded.text, "心跳包 heartbeat");
    }

    #[test]
    fn test_binary_frame_is_not_text() {
        // Control bytes decode in every ASCII-compatible encoding but are not printable
        assert_eq!(decode_text(&[0x01, 0x04, 0x02, 0x01, 0x2C, 0xB8, 0x44]), None);
        assert_eq!(decode_text(&[0x00, 0x00, 0x00, 0x00, 0x00]), None);
    }

    #[test]
    fn test_custom_priority() {
        let (bytes, _, _) = BIG5.encode("溫度");
        let detector = EncodingDetector::new(vec![TextEncoding::Utf8, TextEncoding::Big5]);
        let decoded = detector.decode_text(&bytes).unwrap();
        assert_eq!(decoded.encoding, TextEncoding::Big5);
        assert_eq!(decoded.text, "溫度");

        let utf8_only = EncodingDetector::new(vec![TextEncoding::Utf8]);
        assert_eq!(utf8_only.decode_text(&bytes), None);
    }

    #[test]
    fn test_encode_then_detect() {
        let bytes = TextEncoding::ShiftJis.encode("ハートビート heartbeat").unwrap();
        let detector = EncodingDetector::new(vec![TextEncoding::Utf8, TextEncoding::ShiftJis]);
        assert_eq!(detector.decode_text(&bytes).unwrap().encoding, TextEncoding::ShiftJis);

        assert_eq!(TextEncoding::Big5.encode("temp 😀"), None);
    }

    #[test]
    fn test_is_printable() {
        assert!(is_printable("ping\r\n"));
        assert!(is_printable("温度\t25"));
        assert!(!is_printable(""));
        assert!(!is_printable("a\u{0001}b"));
        assert!(!is_printable("bad \u{FFFD}"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(TextEncoding::from_label("GB2312"), Some(TextEncoding::Gbk));
        assert_eq!(TextEncoding::from_label(" utf8 "), Some(TextEncoding::Utf8));
        assert_eq!(TextEncoding::from_label("latin1"), None);
        assert_eq!(TextEncoding::ShiftJis.to_string(), "shift_jis");
    }

    #[test]
    fn test_serde_labels() {
        let parsed: Vec<TextEncoding> = serde_json::from_str(r#"["utf-8","gb2312","big5"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![TextEncoding::Utf8, TextEncoding::Gbk, TextEncoding::Big5]
        );
        assert_eq!(
            serde_json::to_string(&TextEncoding::EucKr).unwrap(),
            r#""euc-kr""#
        );
    }
}
