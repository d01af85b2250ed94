use crate::error::ProtocolError;

/// Decodes a NAWS payload: exactly four bytes, width and height as big-endian
/// 16-bit values. Any other length is a decode error; the caller discards the
/// payload and leaves the existing window size untouched.
pub fn decode(payload: &[u8]) -> Result<(u16, u16), ProtocolError> {
    match payload.len() {
        4 => Ok((
            (u16::from(payload[0]) << 8) | u16::from(payload[1]),
            (u16::from(payload[2]) << 8) | u16::from(payload[3]),
        )),
        n => Err(ProtocolError::OutOfBand(format!("NAWS payload must be 4 bytes, got {n}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_standard_terminal() {
        let decoded = decode(&[0x00, 0x50, 0x00, 0x18]).unwrap();
        assert_eq!(decoded, (80, 24));
    }

    #[test]
    fn test_decode_wide_values() {
        let decoded = decode(&[0x01, 0x2c, 0x00, 0x40]).unwrap();
        assert_eq!(decoded, (300, 64));
    }

    #[test]
    fn test_decode_wrong_length_is_an_error() {
        assert!(decode(&[0x00, 0x50, 0x00]).is_err());
        assert!(decode(&[]).is_err());
        assert!(decode(&[0x00, 0x50, 0x00, 0x18, 0x00]).is_err());
    }
}
