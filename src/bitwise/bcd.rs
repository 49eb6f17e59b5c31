// Binary-Coded Decimal (BCD) encoding/decoding

use super::types::Endianness;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BcdError {
    /// `position` is the byte index inside the BCD field, in storage order
    #[error("Invalid BCD byte {byte:#04x} at position {position}")]
    InvalidDigit { position: usize, byte: u8 },

    #[error("Value {value} does not fit in {digits} BCD digits")]
    ValueTooLarge { value: u64, digits: usize },
}

pub type Result<T> = std::result::Result<T, BcdError>;

/// Widest BCD field whose every value fits a u64
pub const MAX_BCD_BYTES: usize = 9;

/// Split a BCD byte into its (tens, ones) digits
/// Example: 0x12 -> (1, 2), 0x95 -> (9, 5)
pub fn bcd_byte_to_digits(byte: u8) -> Option<(u8, u8)> {
    let tens = byte >> 4;
    let ones = byte & 0x0F;

    if tens > 9 || ones > 9 {
        return None;
    }

    Some((tens, ones))
}

/// Pack a value in 0..=99 into one BCD byte
fn two_digits_to_byte(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Decode a BCD field. Every byte contributes a factor of 100.
/// Example (big-endian): [0x12, 0x34, 0x56] -> 123456
pub fn bcd_to_int(bytes: &[u8], endianness: Endianness) -> Result<u64> {
    let mut value: u64 = 0;

    let mut decode = |position: usize, byte: u8| -> Result<()> {
        let (tens, ones) =
            bcd_byte_to_digits(byte).ok_or(BcdError::InvalidDigit { position, byte })?;
        value = value
            .checked_mul(100)
            .and_then(|v| v.checked_add(u64::from(tens * 10 + ones)))
            .ok_or(BcdError::ValueTooLarge {
                value: u64::MAX,
                digits: bytes.len() * 2,
            })?;
        Ok(())
    };

    match endianness {
        Endianness::Big => {
            for (position, &byte) in bytes.iter().enumerate() {
                decode(position, byte)?;
            }
        }
        Endianness::Little => {
            for (position, &byte) in bytes.iter().enumerate().rev() {
                decode(position, byte)?;
            }
        }
    }

    Ok(value)
}

/// Encode `value` into `num_bytes` BCD bytes
/// Example (big-endian): 123456, 3 -> [0x12, 0x34, 0x56]
pub fn int_to_bcd(value: u64, num_bytes: usize, endianness: Endianness) -> Result<Vec<u8>> {
    let mut result = vec![0u8; num_bytes];
    let mut remaining = value;

    // Fill least significant pair first
    for i in 0..num_bytes {
        let slot = match endianness {
            Endianness::Big => num_bytes - 1 - i,
            Endianness::Little => i,
        };
        result[slot] = two_digits_to_byte((remaining % 100) as u8);
        remaining /= 100;
    }

    if remaining > 0 {
        return Err(BcdError::ValueTooLarge {
            value,
            digits: num_bytes * 2,
        });
    }

    Ok(result)
}

/// Largest value a BCD field of `num_bytes` can hold
pub fn bcd_max(num_bytes: usize) -> u64 {
    10u64.saturating_pow(2 * num_bytes as u32).saturating_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bcd_byte_conversion() {
        assert_eq!(bcd_byte_to_digits(0x12), Some((1, 2)));
        assert_eq!(bcd_byte_to_digits(0x95), Some((9, 5)));
        assert_eq!(bcd_byte_to_digits(0x00), Some((0, 0)));
        assert_eq!(bcd_byte_to_digits(0xAB), None);
        assert_eq!(bcd_byte_to_digits(0x1A), None);
    }

    #[test]
    fn test_bcd_to_int_be() {
        assert_eq!(bcd_to_int(&[0x12, 0x34, 0x56], Endianness::Big).unwrap(), 123456);
        // 146.520 MHz stored in kHz
        assert_eq!(bcd_to_int(&[0x14, 0x65, 0x20], Endianness::Big).unwrap(), 146520);
    }

    #[test]
    fn test_most_significant_byte_weight() {
        // 0x13 leading a 3-byte field contributes 13 * 10000
        assert_eq!(bcd_to_int(&[0x13, 0x00, 0x00], Endianness::Big).unwrap(), 130000);
    }

    #[test]
    fn test_bcd_to_int_le() {
        assert_eq!(bcd_to_int(&[0x56, 0x34, 0x12], Endianness::Little).unwrap(), 123456);
    }

    #[test]
    fn test_invalid_nibble_rejected() {
        assert_eq!(
            bcd_to_int(&[0x01, 0x0A, 0x00], Endianness::Big),
            Err(BcdError::InvalidDigit {
                position: 1,
                byte: 0x0A
            })
        );
        assert!(bcd_to_int(&[0xA0], Endianness::Big).is_err());
        assert!(bcd_to_int(&[0x00, 0x00, 0xA0], Endianness::Little).is_err());
    }

    #[test]
    fn test_int_to_bcd() {
        assert_eq!(int_to_bcd(123456, 3, Endianness::Big).unwrap(), vec![0x12, 0x34, 0x56]);
        assert_eq!(int_to_bcd(14652, 3, Endianness::Big).unwrap(), vec![0x01, 0x46, 0x52]);
        assert_eq!(int_to_bcd(123456, 3, Endianness::Little).unwrap(), vec![0x56, 0x34, 0x12]);
        assert_eq!(int_to_bcd(0, 2, Endianness::Big).unwrap(), vec![0x00, 0x00]);

        assert_eq!(
            int_to_bcd(1234567, 3, Endianness::Big),
            Err(BcdError::ValueTooLarge {
                value: 1234567,
                digits: 6
            })
        );
    }

    #[test]
    fn test_too_many_digits() {
        let widest = [0x99; MAX_BCD_BYTES];
        assert_eq!(
            bcd_to_int(&widest, Endianness::Big).unwrap(),
            bcd_max(MAX_BCD_BYTES)
        );
        assert_eq!(
            bcd_to_int(&[0x99; 10], Endianness::Big),
            Err(BcdError::ValueTooLarge {
                value: u64::MAX,
                digits: 20
            })
        );
    }

    #[test]
    fn test_bcd_max() {
        assert_eq!(bcd_max(1), 99);
        assert_eq!(bcd_max(3), 999_999);
    }
}
