// Metadata trailer of .img files

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata stored after the image bytes of a .img file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Metadata {
    /// Driver class name
    #[serde(default)]
    pub rclass: String,

    #[serde(default)]
    pub vendor: String,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub variant: String,

    /// Version of the tool that wrote the file
    #[serde(default)]
    pub chirp_version: String,

    /// Keys written by other tools, kept so they survive a save
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl Metadata {
    pub fn new(vendor: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            vendor: vendor.into(),
            model: model.into(),
            chirp_version: crate::VERSION.to_string(),
            ..Default::default()
        }
    }

    pub fn with_rclass(mut self, rclass: impl Into<String>) -> Self {
        self.rclass = rclass.into();
        self
    }

    /// True when the file names this vendor and model
    pub fn describes(&self, vendor: &str, model: &str) -> bool {
        self.vendor == vendor && self.model == model
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
