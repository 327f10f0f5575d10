use log::{debug, warn};

/// Length of the ROM info reply
pub const ROM_INFO_LEN: usize = 38;
/// Last byte of the ROM info reply on a sensor paired with a host
pub const PROVISIONED: u8 = 0x07;
/// Last byte of the ROM info reply on a factory fresh sensor
pub const NOT_PROVISIONED: u8 = 0x02;

pub const GET_ROM_INFO: &[u8] = &[0x01];
pub const SEND_INIT_2: &[u8] = &[0x19];
/// Read the partition table header
pub const GET_PARTITION_HEADER: &[u8] = &[0x43, 0x02];
pub const GET_FLASH_INFO: &[u8] = &[0x3e];
/// Read 0x1000 bytes at offset 0 of partition 1, which holds the TLS data
pub const READ_FLASH_TLS_DATA: &[u8] = &[
    0x40, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x00,
];

/// Commands sent to the sensor before its flash can be parsed, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitCommand {
    GetRomInfo,
    SendInit2,
    GetPartitionHeader,
    /// Vendor specific blob replayed from a Windows session
    SendInit4,
    GetFlashInfo,
    ReadFlashTlsData,
}

impl InitCommand {
    pub const ALL: [InitCommand; 6] = [
        Self::GetRomInfo,
        Self::SendInit2,
        Self::GetPartitionHeader,
        Self::SendInit4,
        Self::GetFlashInfo,
        Self::ReadFlashTlsData,
    ];

    /// Built in payload, `None` for the vendor blob which has to be configured.
    pub fn default_payload(self) -> Option<&'static [u8]> {
        match self {
            Self::GetRomInfo => Some(GET_ROM_INFO),
            Self::SendInit2 => Some(SEND_INIT_2),
            Self::GetPartitionHeader => Some(GET_PARTITION_HEADER),
            Self::SendInit4 => None,
            Self::GetFlashInfo => Some(GET_FLASH_INFO),
            Self::ReadFlashTlsData => Some(READ_FLASH_TLS_DATA),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RomInfo {
    Provisioned,
    /// Sensor was never paired, carries the init byte it reported
    NotProvisioned(u8),
    /// Reply of unexpected length, carries the length
    Unknown(usize),
}

/// Classify the reply to [`InitCommand::GetRomInfo`].
pub fn check_rom_info(response: &[u8]) -> RomInfo {
    if response.len() != ROM_INFO_LEN {
        warn!("Unknown reply at init ({} bytes)", response.len());
        return RomInfo::Unknown(response.len());
    }

    match response[ROM_INFO_LEN - 1] {
        PROVISIONED => {
            debug!("Sensor is initialized");
            RomInfo::Provisioned
        }
        init_byte => RomInfo::NotProvisioned(init_byte),
    }
}
