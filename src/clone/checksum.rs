// Checksums over inclusive byte ranges of an image

use super::session::CloneError;
use crate::memmap::{ImageError, MemoryImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// Sum of bytes mod 256 (Yaesu)
    Sum8,
    /// Negated 8-bit sum
    TwosComplement8,
    Xor8,
    /// 16-bit sum stored big-endian in two bytes
    Sum16Be,
}

impl ChecksumAlgorithm {
    /// Bytes the stored value occupies
    pub fn width(&self) -> usize {
        match self {
            ChecksumAlgorithm::Sum16Be => 2,
            _ => 1,
        }
    }

    fn compute(&self, data: &[u8]) -> u16 {
        match self {
            ChecksumAlgorithm::Sum8 => u16::from(data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))),
            ChecksumAlgorithm::TwosComplement8 => {
                let sum = data.iter().fold(0u8, |acc, &b| acc.wrapping_add(b));
                u16::from(sum.wrapping_neg())
            }
            ChecksumAlgorithm::Xor8 => u16::from(data.iter().fold(0u8, |acc, &b| acc ^ b)),
            ChecksumAlgorithm::Sum16Be => data
                .iter()
                .fold(0u16, |acc, &b| acc.wrapping_add(u16::from(b))),
        }
    }
}

/// Checksum over `start..=end`, stored at `store_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumDescriptor {
    pub start: usize,
    pub end: usize,
    pub store_at: usize,
    pub algorithm: ChecksumAlgorithm,
}

impl ChecksumDescriptor {
    pub const fn new(start: usize, end: usize, store_at: usize, algorithm: ChecksumAlgorithm) -> Self {
        Self {
            start,
            end,
            store_at,
            algorithm,
        }
    }

    /// Yaesu 8-bit sum stored in the byte after the range
    pub const fn yaesu(start: usize, end: usize) -> Self {
        Self::new(start, end, end + 1, ChecksumAlgorithm::Sum8)
    }

    fn range<'a>(&self, image: &'a MemoryImage) -> Result<&'a [u8], ImageError> {
        if self.end < self.start {
            return Err(ImageError::OutOfBounds {
                offset: self.start,
                len: 0,
                size: image.len(),
            });
        }
        image.get(self.start, self.end - self.start + 1)
    }

    pub fn compute(&self, image: &MemoryImage) -> Result<u16, ImageError> {
        Ok(self.algorithm.compute(self.range(image)?))
    }

    pub fn stored(&self, image: &MemoryImage) -> Result<u16, ImageError> {
        let bytes = image.get(self.store_at, self.algorithm.width())?;
        Ok(bytes.iter().fold(0u16, |acc, &b| (acc << 8) | u16::from(b)))
    }

    /// Compare the stored value against a fresh computation
    pub fn verify(&self, image: &MemoryImage) -> Result<(), CloneError> {
        let computed = self.compute(image)?;
        let stored = self.stored(image)?;
        if computed != stored {
            return Err(CloneError::Checksum {
                start: self.start,
                end: self.end,
                store_at: self.store_at,
                stored,
                computed,
            });
        }
        Ok(())
    }

    /// Write the computed value into the image
    pub fn update(&self, image: &mut MemoryImage) -> Result<(), ImageError> {
        let value = self.compute(image)?;
        match self.algorithm.width() {
            2 => image.set_bytes(self.store_at, &value.to_be_bytes()),
            _ => image.set_byte(self.store_at, value as u8),
        }
    }
}

/// Verify every descriptor, failing on the first mismatch
pub fn verify_all(checksums: &[ChecksumDescriptor], image: &MemoryImage) -> Result<(), CloneError> {
    checksums.iter().try_for_each(|c| c.verify(image))
}

/// Recompute in declared order, so enclosing ranges cover fresh inner values
pub fn update_all(checksums: &[ChecksumDescriptor], image: &mut MemoryImage) -> Result<(), ImageError> {
    checksums.iter().try_for_each(|c| c.update(image))
}
