// Fixed-size memory image holding a radio's raw clone dump

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("Range {offset:#06x}+{len} is outside the {size}-byte image")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("Image size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ImageError>;

/// Byte buffer for a full device dump.
///
/// The length is fixed when the image is created; every accessor is bounds
/// checked against it and nothing can grow or shrink the buffer afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryImage {
    data: Box<[u8]>,
}

impl MemoryImage {
    /// Create a zero-filled image of `size` bytes
    pub fn new_zeroed(size: usize) -> Self {
        Self {
            data: vec![0u8; size].into_boxed_slice(),
        }
    }

    /// Wrap a downloaded or loaded buffer, requiring it to be exactly `expected` bytes
    pub fn from_bytes(data: Vec<u8>, expected: usize) -> Result<Self> {
        if data.len() != expected {
            return Err(ImageError::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data: data.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn check_range(&self, offset: usize, len: usize) -> Result<std::ops::Range<usize>> {
        let end = offset.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => Ok(offset..end),
            None => Err(ImageError::OutOfBounds {
                offset,
                len,
                size: self.data.len(),
            }),
        }
    }

    /// Borrow `len` bytes starting at `offset`
    pub fn get(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let range = self.check_range(offset, len)?;
        Ok(&self.data[range])
    }

    /// Mutably borrow `len` bytes starting at `offset`
    pub fn get_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        let range = self.check_range(offset, len)?;
        Ok(&mut self.data[range])
    }

    pub fn byte(&self, offset: usize) -> Result<u8> {
        Ok(self.get(offset, 1)?[0])
    }

    pub fn set_byte(&mut self, offset: usize, value: u8) -> Result<()> {
        self.get_mut(offset, 1)?[0] = value;
        Ok(())
    }

    /// Overwrite bytes starting at `offset`
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        self.get_mut(offset, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Fill `len` bytes starting at `offset` with `value`
    pub fn fill(&mut self, offset: usize, len: usize, value: u8) -> Result<()> {
        self.get_mut(offset, len)?.fill(value);
        Ok(())
    }

    /// The whole image, verbatim
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Hex dump of `[start, end)`, clamped to the image
    pub fn printable(&self, start: usize, end: usize) -> String {
        let end = end.min(self.data.len());
        let start = start.min(end);
        hexdump(start, &self.data[start..end])
    }
}

impl AsRef<[u8]> for MemoryImage {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl fmt::Display for MemoryImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemoryImage({} bytes)", self.data.len())
    }
}

/// hexdump -C style listing; offsets are absolute from `base`
pub fn hexdump(base: usize, data: &[u8]) -> String {
    let mut output = String::new();

    for (i, chunk) in data.chunks(16).enumerate() {
        output.push_str(&format!("{:08x}  ", base + i * 16));

        for j in 0..16 {
            if j == 8 {
                output.push(' ');
            }
            match chunk.get(j) {
                Some(byte) => output.push_str(&format!("{:02x} ", byte)),
                None => output.push_str("   "),
            }
        }

        output.push_str(" |");
        for &byte in chunk {
            if byte.is_ascii_graphic() || byte == b' ' {
                output.push(byte as char);
            } else {
                output.push('.');
            }
        }
        output.push_str("|\n");
    }

    output
}
