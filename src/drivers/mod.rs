// Radio driver framework
pub mod registry;
pub mod traits;

// Drivers
pub mod vx7;

pub use registry::{get_driver, list_drivers, list_drivers_by_vendor, register_driver, DriverInfo};
pub use traits::{CloneModeRadio, Radio, RadioError, RadioResult};
pub use vx7::Vx7Radio;

/// Initialize and register all available radio drivers
///
/// Call once at startup, before listing or looking up drivers.
pub fn init_drivers() {
    register_driver(DriverInfo::new(
        Vx7Radio::VENDOR,
        Vx7Radio::MODEL,
        "Tri-band handheld (VHF/UHF, 0.5-999 MHz receive)",
        true,
    ));
}

/// Registered driver whose image format matches `data`
pub fn detect_model(data: &[u8]) -> Option<DriverInfo> {
    if Vx7Radio::match_model(data) {
        return get_driver(Vx7Radio::VENDOR, Vx7Radio::MODEL);
    }
    None
}
