//! CRC-16 used by ecoNET frames
//!
//! Polynomial 0x1021, initial value 0, MSB first, no final XOR
//! (the XMODEM variant).

const POLY: u16 = 0x1021;

/// Compute the frame checksum over `data`
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0x0000;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
    }
    crc
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(crc16(b""), 0);
    }

    #[test]
    fn test_check_value() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_deterministic() {
        let data = [0x0B, 0x00, 0x01, 0x00, 0x64, 0x00, 0x43];
        assert_eq!(crc16(&data), crc16(&data));
    }

    #[test]
    fn test_single_bit_flip_changes_crc() {
        let data = *b"ecoNET frame body";
        let reference = crc16(&data);
        for i in 0..data.len() {
            for bit in 0..8 {
                let mut flipped = data;
                flipped[i] ^= 1 << bit;
                assert_ne!(crc16(&flipped), reference, "byte {} bit {}", i, bit);
            }
        }
    }
}
