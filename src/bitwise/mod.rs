// Declarative memory layouts for radio images
// Layout text is parsed with nom, compiled into resolved field paths,
// then read and written through an accessor bound to a MemoryImage

pub mod accessor;
pub mod bcd;
pub mod elements;
pub mod parser;
pub mod schema;
pub mod types;

pub use accessor::{AccessError, Accessor, AccessorMut};
pub use bcd::{bcd_to_int, int_to_bcd, BcdError};
pub use schema::{FieldPath, Location, Schema, SchemaError};
pub use types::{Endianness, LeafKind};
