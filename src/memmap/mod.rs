// Raw memory image storage
pub mod image;

pub use image::{hexdump, ImageError, MemoryImage};
