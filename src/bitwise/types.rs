// Common type definitions for memory layouts

use super::bcd::bcd_max;
use serde::{Deserialize, Serialize};

/// Byte order for multi-byte values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

impl Endianness {
    pub fn is_big(&self) -> bool {
        matches!(self, Endianness::Big)
    }

    pub fn is_little(&self) -> bool {
        matches!(self, Endianness::Little)
    }
}

/// Storage type named by a layout declaration keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Unsigned { bytes: usize, endian: Endianness },
    Signed { bytes: usize, endian: Endianness },
    /// Width comes from the declaration's `[n]` suffix
    Bcd { endian: Endianness },
}

impl Primitive {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        use Endianness::{Big, Little};

        let unsigned = |bytes, endian| Some(Primitive::Unsigned { bytes, endian });
        let signed = |bytes, endian| Some(Primitive::Signed { bytes, endian });

        match keyword {
            "u8" | "char" => unsigned(1, Big),
            "u16" => unsigned(2, Big),
            "u24" => unsigned(3, Big),
            "u32" => unsigned(4, Big),
            "ul16" => unsigned(2, Little),
            "ul24" => unsigned(3, Little),
            "ul32" => unsigned(4, Little),
            "i8" => signed(1, Big),
            "i16" => signed(2, Big),
            "i24" => signed(3, Big),
            "i32" => signed(4, Big),
            "il16" => signed(2, Little),
            "il24" => signed(3, Little),
            "il32" => signed(4, Little),
            "bbcd" => Some(Primitive::Bcd { endian: Big }),
            "lbcd" => Some(Primitive::Bcd { endian: Little }),
            _ => None,
        }
    }

    /// Bytes occupied by one element
    pub fn size(&self) -> usize {
        match self {
            Primitive::Unsigned { bytes, .. } | Primitive::Signed { bytes, .. } => *bytes,
            Primitive::Bcd { .. } => 1,
        }
    }

    pub fn is_bcd(&self) -> bool {
        matches!(self, Primitive::Bcd { .. })
    }
}

/// Resolved type of a leaf field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Unsigned { bytes: usize, endian: Endianness },
    Signed { bytes: usize, endian: Endianness },
    Bcd { bytes: usize, endian: Endianness },
    /// Sub-range of one storage byte, `shift` counted from the least significant bit
    Bits { shift: u8, width: u8 },
}

impl LeafKind {
    /// Bytes of image the leaf touches
    pub fn storage_bytes(&self) -> usize {
        match self {
            LeafKind::Unsigned { bytes, .. }
            | LeafKind::Signed { bytes, .. }
            | LeafKind::Bcd { bytes, .. } => *bytes,
            LeafKind::Bits { .. } => 1,
        }
    }

    /// Largest value `set` accepts
    pub fn max_value(&self) -> u64 {
        match self {
            LeafKind::Unsigned { bytes, .. } => u64::MAX >> (64 - 8 * *bytes as u32),
            LeafKind::Signed { bytes, .. } => (1u64 << (8 * *bytes as u32 - 1)) - 1,
            LeafKind::Bcd { bytes, .. } => bcd_max(*bytes),
            LeafKind::Bits { width, .. } => (1u64 << *width) - 1,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, LeafKind::Signed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(
            Primitive::from_keyword("ul16"),
            Some(Primitive::Unsigned {
                bytes: 2,
                endian: Endianness::Little
            })
        );
        assert_eq!(
            Primitive::from_keyword("i24"),
            Some(Primitive::Signed {
                bytes: 3,
                endian: Endianness::Big
            })
        );
        assert_eq!(Primitive::from_keyword("char"), Primitive::from_keyword("u8"));
        assert!(Primitive::from_keyword("bbcd").unwrap().is_bcd());
        assert_eq!(Primitive::from_keyword("u64"), None);
    }

    #[test]
    fn test_leaf_limits() {
        let u24 = LeafKind::Unsigned {
            bytes: 3,
            endian: Endianness::Big,
        };
        assert_eq!(u24.max_value(), 0xFF_FFFF);
        assert_eq!(u24.storage_bytes(), 3);

        let i16 = LeafKind::Signed {
            bytes: 2,
            endian: Endianness::Little,
        };
        assert_eq!(i16.max_value(), 0x7FFF);

        let bits = LeafKind::Bits { shift: 4, width: 4 };
        assert_eq!(bits.max_value(), 15);
        assert_eq!(bits.storage_bytes(), 1);

        let bcd = LeafKind::Bcd {
            bytes: 3,
            endian: Endianness::Big,
        };
        assert_eq!(bcd.max_value(), 999_999);
    }

    #[test]
    fn test_default_endianness() {
        assert!(Endianness::default().is_big());
        assert!(Endianness::Little.is_little());
    }
}
