use core::time::Duration;

use derive_builder::Builder;
use p256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::{
    common::{Seed, hex_bytes},
    l1,
    l2::init::InitCommand,
    l3::ecdh,
};

/// Payloads of the init exchanges, overridable for firmware variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitSequence {
    #[serde(with = "hex_bytes")]
    pub get_rom_info: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub send_init_2: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub get_partition_header: Vec<u8>,
    /// Vendor blob, empty until configured
    #[serde(with = "hex_bytes")]
    pub send_init_4: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub get_flash_info: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub read_flash_tls_data: Vec<u8>,
}

impl Default for InitSequence {
    fn default() -> Self {
        let payload = |cmd: InitCommand| cmd.default_payload().unwrap_or_default().to_vec();
        Self {
            get_rom_info: payload(InitCommand::GetRomInfo),
            send_init_2: payload(InitCommand::SendInit2),
            get_partition_header: payload(InitCommand::GetPartitionHeader),
            send_init_4: payload(InitCommand::SendInit4),
            get_flash_info: payload(InitCommand::GetFlashInfo),
            read_flash_tls_data: payload(InitCommand::ReadFlashTlsData),
        }
    }
}

impl InitSequence {
    pub fn payload(&self, cmd: InitCommand) -> &[u8] {
        match cmd {
            InitCommand::GetRomInfo => &self.get_rom_info,
            InitCommand::SendInit2 => &self.send_init_2,
            InitCommand::GetPartitionHeader => &self.get_partition_header,
            InitCommand::SendInit4 => &self.send_init_4,
            InitCommand::GetFlashInfo => &self.get_flash_info,
            InitCommand::ReadFlashTlsData => &self.read_flash_tls_data,
        }
    }

    /// First command without a payload.
    pub fn missing(&self) -> Option<InitCommand> {
        InitCommand::ALL
            .into_iter()
            .find(|cmd| self.payload(*cmd).is_empty())
    }
}

/// Public key the device ECDH block is signed with, big endian coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManufacturerKey {
    #[serde(with = "hex_bytes")]
    pub x: [u8; 32],
    #[serde(with = "hex_bytes")]
    pub y: [u8; 32],
}

impl Default for ManufacturerKey {
    fn default() -> Self {
        Self {
            x: ecdh::DEVICE_KEY_X,
            y: ecdh::DEVICE_KEY_Y,
        }
    }
}

impl ManufacturerKey {
    pub fn verifying_key(&self) -> Result<VerifyingKey, ecdh::Error> {
        ecdh::manufacturer_key(&self.x, &self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into), default)]
#[serde(default)]
pub struct DriverConfig {
    #[serde(rename = "usb_timeout_ms", with = "duration_ms")]
    pub usb_timeout: Duration,
    pub response_buffer_len: usize,
    pub seed: Seed,
    pub manufacturer_key: ManufacturerKey,
    pub init_sequence: InitSequence,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            usb_timeout: l1::USB_TIMEOUT,
            response_buffer_len: l1::USB_BUFFER_SIZE,
            seed: Seed::default(),
            manufacturer_key: ManufacturerKey::default(),
            init_sequence: InitSequence::default(),
        }
    }
}

mod duration_ms {
    use core::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
