// Serial communication module for radio I/O
pub mod comm;
pub mod link;

#[cfg(test)]
pub mod mock;

pub use comm::{list_ports, SerialConfig, SerialError, SerialPort};
pub use link::CloneLink;
