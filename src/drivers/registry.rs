// Driver registry for managing radio drivers

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Information about a radio driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    pub vendor: String,
    pub model: String,
    pub description: String,
    pub is_clone_mode: bool,
}

impl DriverInfo {
    pub fn new(
        vendor: impl Into<String>,
        model: impl Into<String>,
        description: impl Into<String>,
        is_clone_mode: bool,
    ) -> Self {
        Self {
            vendor: vendor.into(),
            model: model.into(),
            description: description.into(),
            is_clone_mode,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.vendor, self.model)
    }
}

lazy_static::lazy_static! {
    static ref DRIVER_REGISTRY: Mutex<HashMap<String, DriverInfo>> = Mutex::new(HashMap::new());
}

/// The registry only holds plain data, so a poisoned lock is still usable
fn registry() -> MutexGuard<'static, HashMap<String, DriverInfo>> {
    DRIVER_REGISTRY
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn key(vendor: &str, model: &str) -> String {
    format!("{}::{}", vendor, model)
}

/// Register a driver in the global registry
pub fn register_driver(info: DriverInfo) {
    registry().insert(key(&info.vendor, &info.model), info);
}

/// Get information about a specific driver
pub fn get_driver(vendor: &str, model: &str) -> Option<DriverInfo> {
    registry().get(&key(vendor, model)).cloned()
}

/// List all registered drivers, sorted by vendor then model
pub fn list_drivers() -> Vec<DriverInfo> {
    let mut drivers: Vec<DriverInfo> = registry().values().cloned().collect();
    drivers.sort_by(|a, b| (&a.vendor, &a.model).cmp(&(&b.vendor, &b.model)));
    drivers
}

/// List drivers grouped by vendor
pub fn list_drivers_by_vendor() -> HashMap<String, Vec<DriverInfo>> {
    let mut by_vendor: HashMap<String, Vec<DriverInfo>> = HashMap::new();

    for info in list_drivers() {
        by_vendor.entry(info.vendor.clone()).or_default().push(info);
    }

    by_vendor
}
