//! Configuration constants and types for the stack device.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Capacity of a freshly constructed stack.
pub const DEFAULT_CAPACITY: u32 = 10;

/// Name used for the chrdev region, the device class and the node.
pub const DEVICE_NAME: &str = "int_stack";

/// Directory the device namespace publishes nodes under.
pub const NODE_DIR: &str = "/dev";

/// Full path of the published node.
pub const DEVICE_PATH: &str = "/dev/int_stack";

/// Minor number of the single node.
pub const DEVICE_MINOR: u32 = 0;

/// Size of one stack element on the wire.
pub const ELEMENT_SIZE: usize = std::mem::size_of::<i32>();

/// Name the presence gate registers with the bus.
pub const DRIVER_NAME: &str = "int_stack_usbkey";

/// Control interface parameters.
pub mod ioctl_params {
    /// Ioctl magic ('S').
    pub const MAGIC: u8 = b'S';

    /// Ordinal of SET_CAPACITY.
    pub const SET_CAPACITY_NR: u8 = 1;

    /// Argument size of SET_CAPACITY (a u32).
    pub const SET_CAPACITY_ARG_SIZE: usize = 4;
}

/// Sony DualShock 4 [CUH-ZCT1x].
pub const DS4_V1: TokenIdentity = TokenIdentity::new(0x054c, 0x05c4);

/// Sony DualShock 4 [CUH-ZCT2x].
pub const DS4_V2: TokenIdentity = TokenIdentity::new(0x054c, 0x09cc);

/// Bus-level identity of a hardware token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenIdentity {
    /// USB vendor id.
    pub vendor_id: u16,
    /// USB product id.
    pub product_id: u16,
}

impl TokenIdentity {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for TokenIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// Configuration for the presence gate and the device it publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Name of the chrdev region, class and node.
    pub device_name: String,

    /// Directory the node is created in.
    pub node_dir: PathBuf,

    /// Capacity of the stack built on first open.
    pub default_capacity: u32,

    /// Tokens whose presence publishes the node.
    pub identities: Vec<TokenIdentity>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            device_name: DEVICE_NAME.to_string(),
            node_dir: PathBuf::from(NODE_DIR),
            default_capacity: DEFAULT_CAPACITY,
            identities: vec![DS4_V1, DS4_V2],
        }
    }
}

impl GateConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: GateConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Path of the node this configuration publishes.
    pub fn node_path(&self) -> PathBuf {
        self.node_dir.join(&self.device_name)
    }

    /// Whether a token identity is recognized.
    pub fn recognizes(&self, id: TokenIdentity) -> bool {
        self.identities.contains(&id)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() || self.device_name.contains('/') {
            return Err(Error::Config(format!(
                "Device name must be a single non-empty path component, got {:?}",
                self.device_name
            )));
        }
        if self.default_capacity == 0 {
            return Err(Error::Config(
                "Default capacity must be greater than 0".to_string(),
            ));
        }
        if self.identities.is_empty() {
            return Err(Error::Config(
                "At least one token identity is required".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for id in &self.identities {
            if !seen.insert(id) {
                return Err(Error::Config(format!("Duplicate token identity {}", id)));
            }
        }
        Ok(())
    }
}
