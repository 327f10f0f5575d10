use serde::{Deserialize, Serialize};

pub mod hex_bytes;

/// Seed used when the sensor was paired from a VirtualBox guest
pub const VIRTUALBOX_SEED: &[u8] = b"VirtualBox\x000\x00";

/// Host identity the flash encryption keys are derived from.
///
/// Windows pairs the sensor with a seed built from the machine product
/// name and serial number, each NUL terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seed(#[serde(with = "hex_bytes")] Vec<u8>);

impl Default for Seed {
    fn default() -> Self {
        Self::virtualbox()
    }
}

impl Seed {
    pub fn virtualbox() -> Self {
        Self(VIRTUALBOX_SEED.to_vec())
    }

    pub fn from_system_id(product_name: &str, product_serial: &str) -> Self {
        let mut seed = Vec::with_capacity(product_name.len() + product_serial.len() + 2);
        seed.extend_from_slice(product_name.as_bytes());
        seed.push(0);
        seed.extend_from_slice(product_serial.as_bytes());
        seed.push(0);
        Self(seed)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Seed {
    fn from(value: Vec<u8>) -> Self {
        Self(value)
    }
}
