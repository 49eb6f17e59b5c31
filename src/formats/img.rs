// .img container: raw image, magic separator, base64 JSON metadata

use super::metadata::Metadata;
use crate::memmap::{ImageError, MemoryImage};
use base64::{engine::general_purpose, Engine as _};
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ImgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode metadata: {0}")]
    MetadataDecode(String),

    #[error("Failed to parse metadata JSON: {0}")]
    MetadataJson(#[from] serde_json::Error),

    #[error("Failed to decode base64 metadata: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error(transparent)]
    Image(#[from] ImageError),
}

pub type Result<T> = std::result::Result<T, ImgError>;

/// Separates the image bytes from the metadata trailer
pub const MAGIC: &[u8] = b"\x00\xffchirp\xeeimg\x00\x01";

/// Load a .img file whose image part must be exactly `expected_size` bytes.
/// Files without a trailer load with default metadata.
pub fn load_img(path: impl AsRef<Path>, expected_size: usize) -> Result<(MemoryImage, Metadata)> {
    let data = fs::read(path.as_ref())?;

    let (binary, metadata) = match find_magic(&data) {
        Some(idx) => (
            data[..idx].to_vec(),
            decode_metadata(&data[idx + MAGIC.len()..])?,
        ),
        None => (data, Metadata::default()),
    };

    debug!(
        "Loaded {} ({} bytes, {} {})",
        path.as_ref().display(),
        binary.len(),
        metadata.vendor,
        metadata.model
    );
    Ok((MemoryImage::from_bytes(binary, expected_size)?, metadata))
}

/// Write the image followed by the metadata trailer
pub fn save_img(path: impl AsRef<Path>, image: &MemoryImage, metadata: &Metadata) -> Result<()> {
    let encoded = general_purpose::STANDARD.encode(metadata.to_json()?.as_bytes());

    let mut out = Vec::with_capacity(image.len() + MAGIC.len() + encoded.len());
    out.extend_from_slice(image.as_bytes());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(encoded.as_bytes());

    fs::write(path, out)?;
    Ok(())
}

/// Load a bare dump of exactly `expected_size` bytes
pub fn load_raw(path: impl AsRef<Path>, expected_size: usize) -> Result<MemoryImage> {
    let data = fs::read(path)?;
    Ok(MemoryImage::from_bytes(data, expected_size)?)
}

/// Write the image bytes verbatim
pub fn save_raw(path: impl AsRef<Path>, image: &MemoryImage) -> Result<()> {
    fs::write(path, image.as_bytes())?;
    Ok(())
}

fn find_magic(data: &[u8]) -> Option<usize> {
    data.windows(MAGIC.len()).position(|window| window == MAGIC)
}

fn decode_metadata(encoded: &[u8]) -> Result<Metadata> {
    let compact: Vec<u8> = encoded
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    let decoded = general_purpose::STANDARD.decode(compact)?;
    let json = String::from_utf8(decoded).map_err(|e| ImgError::MetadataDecode(e.to_string()))?;
    Ok(Metadata::from_json(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample() -> MemoryImage {
        MemoryImage::from_bytes((0..32u8).collect(), 32).unwrap()
    }

    #[test]
    fn test_magic_finding() {
        let data = b"hello\x00\xffchirp\xeeimg\x00\x01world";
        assert_eq!(find_magic(data), Some(5));
        assert_eq!(find_magic(b"no magic here"), None);
    }

    #[test]
    fn test_save_load_img() -> Result<()> {
        let tempfile = NamedTempFile::new()?;
        let path = tempfile.path();

        let metadata = Metadata::new("Yaesu", "VX-7").with_rclass("VX7Radio");
        save_img(path, &sample(), &metadata)?;

        let (image, loaded) = load_img(path, 32)?;
        assert_eq!(image, sample());
        assert_eq!(loaded, metadata);
        Ok(())
    }

    #[test]
    fn test_size_must_match() -> Result<()> {
        let tempfile = NamedTempFile::new()?;
        save_img(tempfile.path(), &sample(), &Metadata::default())?;

        assert!(matches!(
            load_img(tempfile.path(), 33),
            Err(ImgError::Image(ImageError::SizeMismatch {
                expected: 33,
                actual: 32
            }))
        ));
        Ok(())
    }

    #[test]
    fn test_load_without_trailer() -> Result<()> {
        let mut tempfile = NamedTempFile::new()?;
        tempfile.write_all(&[1, 2, 3, 4, 5])?;

        let (image, metadata) = load_img(tempfile.path(), 5)?;
        assert_eq!(image.as_bytes(), &[1, 2, 3, 4, 5]);
        assert_eq!(metadata.vendor, "");
        Ok(())
    }

    #[test]
    fn test_foreign_file() -> Result<()> {
        // Trailer as written by other tools, with a newline after the base64
        let mut tempfile = NamedTempFile::new()?;
        tempfile.write_all(&[0xAA, 0xBB, 0xCC, 0xDD])?;
        tempfile.write_all(MAGIC)?;
        let json = r#"{"vendor":"Yaesu","model":"VX-7","chirp_version":"0.1.0"}"#;
        tempfile.write_all(general_purpose::STANDARD.encode(json).as_bytes())?;
        tempfile.write_all(b"\n")?;
        tempfile.flush()?;

        let (image, metadata) = load_img(tempfile.path(), 4)?;
        assert_eq!(image.as_bytes(), &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert!(metadata.describes("Yaesu", "VX-7"));
        Ok(())
    }

    #[test]
    fn test_bad_trailer() -> Result<()> {
        let mut tempfile = NamedTempFile::new()?;
        tempfile.write_all(&[0u8; 4])?;
        tempfile.write_all(MAGIC)?;
        tempfile.write_all(b"!!!not base64")?;

        assert!(matches!(
            load_img(tempfile.path(), 4),
            Err(ImgError::Base64Decode(_))
        ));
        Ok(())
    }

    #[test]
    fn test_raw_round_trip() -> Result<()> {
        let tempfile = NamedTempFile::new()?;
        save_raw(tempfile.path(), &sample())?;
        assert_eq!(load_raw(tempfile.path(), 32)?, sample());
        assert!(load_raw(tempfile.path(), 16).is_err());
        Ok(())
    }
}
