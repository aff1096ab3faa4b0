//! Hex and ASCII dump helpers for raw datagrams

use std::fmt::Write;

/// Encode bytes to uppercase hex separated by spaces
/// Example: [0x01, 0x03, 0x2C] -> "01 03 2C"
pub fn to_hex_spaced(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            result.push(' ');
        }
        // Writing to String buffer is infallible
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}

/// Render bytes as ASCII, replacing non-printable bytes with '.'
pub fn ascii_preview(data: &[u8]) -> String {
    data.iter()
        .map(|&b| {
            if (0x20..=0x7E).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

/// Parse a hex string such as "AA55", "aa 55" or "0xAA55" into bytes
///
/// Returns `None` on odd digit counts or non-hex characters.
pub fn parse_hex(input: &str) -> Option<Vec<u8>> {
    let trimmed = input.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = body
        .bytes()
        .filter(|b| !matches!(b, b' ' | b':' | b'-'))
        .collect();
    if digits.len() % 2 != 0 {
        return None;
    }

    digits
        .chunks(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}
