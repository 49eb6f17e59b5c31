// File format handlers
pub mod img;
pub mod metadata;

pub use img::{load_img, load_raw, save_img, save_raw, ImgError};
pub use metadata::Metadata;
