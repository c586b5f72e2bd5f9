//! Hex formatting for frame dumps

use std::fmt::Write;

/// Space separated uppercase hex, the form used in TX/RX debug lines
/// Example: [0x68, 0x0B, 0x00] -> "68 0B 00"
pub fn format_hex(data: &[u8]) -> String {
    let mut result = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            result.push(' ');
        }
        let _ = write!(&mut result, "{:02X}", byte);
    }
    result
}
