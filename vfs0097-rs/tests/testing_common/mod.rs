#![allow(dead_code, unused_imports)]

pub mod flash;
pub mod mocks;

pub use flash::{FlashBuilder, SealedKey, ecdh_block, sealed_private_key};
pub use mocks::ScriptedTransport;

use std::env;
use std::sync::Once;

use p256::ecdsa::SigningKey;
use p256::elliptic_curve::sec1::ToEncodedPoint;

use vfs0097_rs::{
    DriverConfig, DriverConfigBuilder, Vfs0097,
    config::{InitSequence, ManufacturerKey},
    l2::init::{NOT_PROVISIONED, PROVISIONED, ROM_INFO_LEN},
};

/// Stand in for the vendor init blob
pub const INIT_4_BLOB: &[u8] = &[0x06, 0x02, 0x00, 0x00, 0x01, 0x39, 0x17];

/// Scalar of the key signing the test ECDH blocks
pub const TEST_MANUFACTURER_D: [u8; 32] = [0x42; 32];
/// Scalar of the test device private key
pub const TEST_DEVICE_D: [u8; 32] = [
    0xc9, 0xaf, 0xa9, 0xd8, 0x45, 0xba, 0x75, 0x16, 0x6b, 0x5c, 0x21, 0x57, 0x67, 0xb1, 0xd6, 0x93,
    0x4e, 0x50, 0xc3, 0xdb, 0x36, 0xe8, 0x9b, 0x12, 0x7b, 0x8a, 0x62, 0x2b, 0x12, 0x0f, 0x67, 0x21,
];
/// Scalar of the test device ECDH key
pub const TEST_ECDH_D: [u8; 32] = [0x17; 32];

pub type Vfs0097TestInstance = Vfs0097<ScriptedTransport>;

static LOGGER_INIT: Once = Once::new();

pub fn setup_logging() {
    LOGGER_INIT.call_once(|| {
        let default_level = "info";
        let default_log_level = env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());

        env_logger::builder()
            .is_test(true)
            .parse_filters(&default_log_level)
            .init();
    });
}

pub fn test_manufacturer() -> SigningKey {
    SigningKey::from_slice(&TEST_MANUFACTURER_D).expect("failed to create manufacturer key")
}

pub fn test_config() -> DriverConfig {
    let point = test_manufacturer().verifying_key().to_encoded_point(false);
    let manufacturer_key = ManufacturerKey {
        x: point.x().expect("x").as_slice().try_into().expect("32 bytes"),
        y: point.y().expect("y").as_slice().try_into().expect("32 bytes"),
    };

    DriverConfigBuilder::default()
        .manufacturer_key(manufacturer_key)
        .init_sequence(InitSequence {
            send_init_4: INIT_4_BLOB.to_vec(),
            ..Default::default()
        })
        .build()
        .expect("failed to build config")
}

pub fn rom_info(init_byte: u8) -> Vec<u8> {
    let mut rom = vec![0_u8; ROM_INFO_LEN];
    rom[ROM_INFO_LEN - 1] = init_byte;
    rom
}

/// Replies for a full open of a paired sensor, ending with `flash`.
pub fn open_script(flash: Vec<u8>) -> ScriptedTransport {
    ScriptedTransport::new()
        .reply(rom_info(PROVISIONED))
        .reply(vec![0x00, 0x00])
        .reply(vec![0x00, 0x00, 0x01, 0x00])
        .reply(vec![0x00, 0x00])
        .reply(vec![0x00, 0x00, 0x10, 0x00])
        .reply(flash)
}

/// Flash partition with a certificate, a private key sealed for the
/// default seed and an ECDH block signed by the test manufacturer.
pub fn paired_flash() -> Vec<u8> {
    let config = test_config();
    FlashBuilder::new()
        .block(3, b"device certificate")
        .block(4, &sealed_private_key(config.seed.as_bytes(), &TEST_DEVICE_D).body)
        .block(6, &ecdh_block(&test_manufacturer(), &TEST_ECDH_D))
        .end()
        .build()
}

pub fn get_vfs0097_test_instance(transport: ScriptedTransport) -> Vfs0097TestInstance {
    Vfs0097::new(transport, test_config())
}
