// Integer and bitfield element encoding over raw byte slices

use super::types::Endianness;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElementError {
    #[error("Unsupported element width: {0} bytes")]
    UnsupportedWidth(usize),

    #[error("Value {value} does not fit in {bytes} bytes")]
    ValueTooWide { value: i128, bytes: usize },
}

pub type Result<T> = std::result::Result<T, ElementError>;

fn check_width(bytes: usize) -> Result<()> {
    if bytes == 0 || bytes > 8 {
        return Err(ElementError::UnsupportedWidth(bytes));
    }
    Ok(())
}

/// Read an unsigned integer spanning the whole slice (1 to 8 bytes)
pub fn read_uint(data: &[u8], endianness: Endianness) -> Result<u64> {
    check_width(data.len())?;

    let fold = |acc: u64, &byte: &u8| (acc << 8) | u64::from(byte);
    let value = match endianness {
        Endianness::Big => data.iter().fold(0, fold),
        Endianness::Little => data.iter().rev().fold(0, fold),
    };
    Ok(value)
}

/// Encode `value` into exactly `bytes` bytes
pub fn write_uint(value: u64, bytes: usize, endianness: Endianness) -> Result<Vec<u8>> {
    check_width(bytes)?;
    if bytes < 8 && value >> (8 * bytes) != 0 {
        return Err(ElementError::ValueTooWide {
            value: i128::from(value),
            bytes,
        });
    }

    let be = value.to_be_bytes();
    let mut out = be[8 - bytes..].to_vec();
    if endianness.is_little() {
        out.reverse();
    }
    Ok(out)
}

/// Interpret the low `bytes` bytes of `raw` as two's complement
pub fn sign_extend(raw: u64, bytes: usize) -> i64 {
    let unused = 64 - 8 * bytes as u32;
    ((raw << unused) as i64) >> unused
}

/// Read a signed integer spanning the whole slice
pub fn read_int(data: &[u8], endianness: Endianness) -> Result<i64> {
    let raw = read_uint(data, endianness)?;
    Ok(sign_extend(raw, data.len()))
}

/// Encode a signed value into exactly `bytes` bytes of two's complement
pub fn write_int(value: i64, bytes: usize, endianness: Endianness) -> Result<Vec<u8>> {
    check_width(bytes)?;
    let bits = 8 * bytes as u32;
    if bits < 64 {
        let min = -(1i64 << (bits - 1));
        let max = (1i64 << (bits - 1)) - 1;
        if value < min || value > max {
            return Err(ElementError::ValueTooWide {
                value: i128::from(value),
                bytes,
            });
        }
    }

    let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };
    write_uint(value as u64 & mask, bytes, endianness)
}

fn bit_mask(shift: u8, width: u8) -> u8 {
    (((1u16 << width) - 1) << shift) as u8
}

/// Extract `width` bits starting `shift` bits above the least significant bit
pub fn read_bits(byte: u8, shift: u8, width: u8) -> u8 {
    (byte & bit_mask(shift, width)) >> shift
}

/// Replace `width` bits of `byte`, leaving all other bits as they were
pub fn write_bits(byte: u8, shift: u8, width: u8, value: u8) -> u8 {
    let mask = bit_mask(shift, width);
    (byte & !mask) | ((value << shift) & mask)
}
