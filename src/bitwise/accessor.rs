// Typed and raw field access over a memory image

use super::bcd::{bcd_to_int, int_to_bcd, BcdError};
use super::elements::{
    read_bits, read_int, read_uint, write_bits, write_int, write_uint, ElementError,
};
use super::schema::{Location, Schema, SchemaError};
use super::types::LeafKind;
use crate::memmap::{ImageError, MemoryImage};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Index {index} out of range for `{path}` ({count} elements)")]
    IndexOutOfRange {
        path: String,
        index: usize,
        count: usize,
    },

    #[error("`{path}` takes {expected} indices, got {actual}")]
    IndexCount {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("`{path}` is not an array")]
    NotAnArray { path: String },

    #[error("Raw write to `{path}` needs {expected} bytes, got {actual}")]
    SizeMismatch {
        path: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid BCD byte {byte:#04x} at {offset:#06x} in `{path}`")]
    InvalidBcd {
        path: String,
        offset: usize,
        byte: u8,
    },

    #[error("Value {value} does not fit `{path}`")]
    ValueOutOfRange { path: String, value: i128 },

    #[error("`{path}` is a composite field; use raw access")]
    NotALeaf { path: String },

    #[error("`{path}` is signed; use get_signed")]
    SignedField { path: String },

    #[error("Layout needs {extent} bytes but the image holds {size}")]
    ImageTooSmall { extent: usize, size: usize },

    #[error(transparent)]
    Element(#[from] ElementError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

pub type Result<T> = std::result::Result<T, AccessError>;

fn leaf_of(loc: &Location) -> Result<LeafKind> {
    loc.leaf.ok_or_else(|| AccessError::NotALeaf {
        path: loc.path.clone(),
    })
}

fn out_of_range(loc: &Location, value: i128) -> AccessError {
    AccessError::ValueOutOfRange {
        path: loc.path.clone(),
        value,
    }
}

fn decode(image: &MemoryImage, loc: &Location) -> Result<u64> {
    let leaf = leaf_of(loc)?;
    let bytes = image.get(loc.offset, leaf.storage_bytes())?;

    match leaf {
        LeafKind::Unsigned { endian, .. } => Ok(read_uint(bytes, endian)?),
        LeafKind::Signed { .. } => Err(AccessError::SignedField {
            path: loc.path.clone(),
        }),
        LeafKind::Bcd { endian, .. } => bcd_to_int(bytes, endian).map_err(|e| match e {
            BcdError::InvalidDigit { position, byte } => AccessError::InvalidBcd {
                path: loc.path.clone(),
                offset: loc.offset + position,
                byte,
            },
            BcdError::ValueTooLarge { value, .. } => out_of_range(loc, i128::from(value)),
        }),
        LeafKind::Bits { shift, width } => Ok(u64::from(read_bits(bytes[0], shift, width))),
    }
}

fn decode_signed(image: &MemoryImage, loc: &Location) -> Result<i64> {
    match leaf_of(loc)? {
        LeafKind::Signed { bytes, endian } => {
            let data = image.get(loc.offset, bytes)?;
            Ok(read_int(data, endian)?)
        }
        // Unsigned leaves are at most 4 bytes wide, so they always fit
        _ => Ok(decode(image, loc)? as i64),
    }
}

/// Read-only view binding a compiled layout to an image
pub struct Accessor<'a> {
    schema: &'a Schema,
    image: &'a MemoryImage,
}

impl<'a> Accessor<'a> {
    /// Fails when the layout reaches past the end of the image
    pub fn bind(schema: &'a Schema, image: &'a MemoryImage) -> Result<Self> {
        check_extent(schema, image)?;
        Ok(Self { schema, image })
    }

    pub fn get(&self, loc: &Location) -> Result<u64> {
        decode(self.image, loc)
    }

    pub fn get_signed(&self, loc: &Location) -> Result<i64> {
        decode_signed(self.image, loc)
    }

    /// Bytes of any node, leaf or composite
    pub fn get_raw(&self, loc: &Location) -> Result<&'a [u8]> {
        Ok(self.image.get(loc.offset, loc.len)?)
    }

    /// Look up and decode a concrete address such as `memory[3].tone`
    pub fn value(&self, address: &str) -> Result<u64> {
        let loc = self.schema.locate(address)?;
        self.get(&loc)
    }
}

/// Mutable view; every write touches only the addressed field's bytes
pub struct AccessorMut<'a> {
    schema: &'a Schema,
    image: &'a mut MemoryImage,
}

impl<'a> AccessorMut<'a> {
    pub fn bind(schema: &'a Schema, image: &'a mut MemoryImage) -> Result<Self> {
        check_extent(schema, image)?;
        Ok(Self { schema, image })
    }

    pub fn get(&self, loc: &Location) -> Result<u64> {
        decode(self.image, loc)
    }

    pub fn get_signed(&self, loc: &Location) -> Result<i64> {
        decode_signed(self.image, loc)
    }

    pub fn get_raw(&self, loc: &Location) -> Result<&[u8]> {
        Ok(self.image.get(loc.offset, loc.len)?)
    }

    pub fn set(&mut self, loc: &Location, value: u64) -> Result<()> {
        let leaf = leaf_of(loc)?;
        if value > leaf.max_value() {
            return Err(out_of_range(loc, i128::from(value)));
        }

        match leaf {
            LeafKind::Unsigned { bytes, endian } => {
                let encoded =
                    write_uint(value, bytes, endian).map_err(|_| out_of_range(loc, value.into()))?;
                self.image.set_bytes(loc.offset, &encoded)?;
            }
            LeafKind::Signed { bytes, endian } => {
                let encoded = write_int(value as i64, bytes, endian)
                    .map_err(|_| out_of_range(loc, value.into()))?;
                self.image.set_bytes(loc.offset, &encoded)?;
            }
            LeafKind::Bcd { bytes, endian } => {
                let encoded =
                    int_to_bcd(value, bytes, endian).map_err(|_| out_of_range(loc, value.into()))?;
                self.image.set_bytes(loc.offset, &encoded)?;
            }
            LeafKind::Bits { shift, width } => {
                let current = self.image.byte(loc.offset)?;
                let updated = write_bits(current, shift, width, value as u8);
                self.image.set_byte(loc.offset, updated)?;
            }
        }
        Ok(())
    }

    pub fn set_signed(&mut self, loc: &Location, value: i64) -> Result<()> {
        match leaf_of(loc)? {
            LeafKind::Signed { bytes, endian } => {
                let encoded = write_int(value, bytes, endian)
                    .map_err(|_| out_of_range(loc, value.into()))?;
                self.image.set_bytes(loc.offset, &encoded)?;
                Ok(())
            }
            _ => {
                let unsigned =
                    u64::try_from(value).map_err(|_| out_of_range(loc, value.into()))?;
                self.set(loc, unsigned)
            }
        }
    }

    /// Overwrite a node's full extent; `data` must match it exactly
    pub fn set_raw(&mut self, loc: &Location, data: &[u8]) -> Result<()> {
        if data.len() != loc.len {
            return Err(AccessError::SizeMismatch {
                path: loc.path.clone(),
                expected: loc.len,
                actual: data.len(),
            });
        }
        self.image.set_bytes(loc.offset, data)?;
        Ok(())
    }

    /// Look up and encode a concrete address such as `memory[3].tone`
    pub fn set_value(&mut self, address: &str, value: u64) -> Result<()> {
        let loc = self.schema.locate(address)?;
        self.set(&loc, value)
    }
}

fn check_extent(schema: &Schema, image: &MemoryImage) -> Result<()> {
    if schema.extent() > image.len() {
        return Err(AccessError::ImageTooSmall {
            extent: schema.extent(),
            size: image.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LAYOUT: &str = r#"
        u8 flags_a:1, flags_b:1, flags_c:2, flags_d:4;
        bbcd freq[3];
        lbcd small[2];
        i16 delta;
        ul16 word;
        u8 name[4];
    "#;

    fn setup() -> (Schema, MemoryImage) {
        let schema = Schema::compile(LAYOUT).unwrap();
        let image = MemoryImage::new_zeroed(schema.extent());
        (schema, image)
    }

    #[test]
    fn test_bind_checks_extent() {
        let schema = Schema::compile(LAYOUT).unwrap();
        let short = MemoryImage::new_zeroed(schema.extent() - 1);
        assert!(matches!(
            Accessor::bind(&schema, &short),
            Err(AccessError::ImageTooSmall { .. })
        ));
    }

    #[test]
    fn test_bitfield_isolation() {
        let (schema, mut image) = setup();
        let mut acc = AccessorMut::bind(&schema, &mut image).unwrap();

        let names = ["flags_a", "flags_b", "flags_c", "flags_d"];
        let values = [1u64, 0, 3, 9];
        for (name, value) in names.iter().zip(values) {
            acc.set_value(name, value).unwrap();
        }

        // Rewrite each sub-field and confirm the other three hold
        let updates = [0u64, 1, 1, 6];
        let mut expected = values;
        for (i, name) in names.iter().enumerate() {
            acc.set_value(name, updates[i]).unwrap();
            expected[i] = updates[i];
            for (j, other) in names.iter().enumerate() {
                let loc = schema.locate(other).unwrap();
                assert_eq!(acc.get(&loc).unwrap(), expected[j], "{} after writing {}", other, name);
            }
        }
        assert_eq!(image.byte(0).unwrap(), 0b0_1_01_0110);
    }

    #[test]
    fn test_bcd_fields() {
        let (schema, mut image) = setup();
        image.set_bytes(1, &[0x13, 0x00, 0x00]).unwrap();

        let acc = Accessor::bind(&schema, &image).unwrap();
        assert_eq!(acc.value("freq").unwrap(), 130000);

        image.set_bytes(1, &[0x14, 0x0A, 0x20]).unwrap();
        let acc = Accessor::bind(&schema, &image).unwrap();
        assert_eq!(
            acc.value("freq"),
            Err(AccessError::InvalidBcd {
                path: "freq".to_string(),
                offset: 2,
                byte: 0x0A
            })
        );

        let mut acc = AccessorMut::bind(&schema, &mut image).unwrap();
        acc.set_value("small", 1234).unwrap();
        assert!(matches!(
            acc.set_value("freq", 1_000_000),
            Err(AccessError::ValueOutOfRange { .. })
        ));
        assert_eq!(image.get(4, 2).unwrap(), &[0x34, 0x12]);
    }

    #[test]
    fn test_scalars() {
        let (schema, mut image) = setup();
        let mut acc = AccessorMut::bind(&schema, &mut image).unwrap();

        let delta = schema.locate("delta").unwrap();
        acc.set_signed(&delta, -300).unwrap();
        assert_eq!(acc.get_signed(&delta).unwrap(), -300);
        assert!(matches!(acc.get(&delta), Err(AccessError::SignedField { .. })));
        assert!(acc.set_signed(&delta, 40000).is_err());

        let word = schema.locate("word").unwrap();
        acc.set(&word, 0xBEEF).unwrap();
        assert_eq!(acc.get_raw(&word).unwrap(), &[0xEF, 0xBE]);
        assert!(matches!(
            acc.set(&word, 0x1_0000),
            Err(AccessError::ValueOutOfRange { .. })
        ));
        assert!(acc.set_signed(&word, -1).is_err());
    }

    #[test]
    fn test_raw_access() {
        let (schema, mut image) = setup();
        let mut acc = AccessorMut::bind(&schema, &mut image).unwrap();

        let name = schema.locate("name").unwrap();
        acc.set_raw(&name, b"ABCD").unwrap();
        assert_eq!(acc.get_raw(&name).unwrap(), b"ABCD");
        assert!(matches!(acc.get(&name), Err(AccessError::NotALeaf { .. })));

        assert_eq!(
            acc.set_raw(&name, b"ABC"),
            Err(AccessError::SizeMismatch {
                path: "name".to_string(),
                expected: 4,
                actual: 3
            })
        );

        assert_eq!(acc.get(&schema.locate("name[2]").unwrap()).unwrap(), u64::from(b'C'));
    }
}
