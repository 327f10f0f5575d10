//! Device ECDH key stored in flash block 6.
//!
//! The first 0x90 bytes are signed by the manufacturer key and hold the
//! device public key as little endian coordinates. They are followed by the
//! DER signature length (`u32` LE), the signature and zero padding.

use log::{debug, error, warn};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::{Signature, VerifyingKey};
use p256::{EncodedPoint, FieldBytes, PublicKey};
use sha2::{Digest, Sha256};

use super::keys::{COORD_LEN, be_from_le};
use crate::{error, reader::ByteReader};

/// Length of the signed part of the block
pub const SIGNED_LEN: usize = 0x90;
pub const X_OFFSET: usize = 0x08;
pub const Y_OFFSET: usize = 0x4c;

/// X coordinate of the manufacturer key, big endian
pub const DEVICE_KEY_X: [u8; 32] = [
    0xf7, 0x27, 0x65, 0x3b, 0x4e, 0x16, 0xce, 0x06, 0x65, 0xa6, 0x89, 0x4d, 0x7f, 0x3a, 0x30, 0xd7,
    0xd0, 0xa0, 0xbe, 0x31, 0x0d, 0x12, 0x92, 0xa7, 0x43, 0x67, 0x1f, 0xdf, 0x69, 0xf6, 0xa8, 0xd3,
];
/// Y coordinate of the manufacturer key, big endian
pub const DEVICE_KEY_Y: [u8; 32] = [
    0xa8, 0x55, 0x38, 0xf8, 0xb6, 0xbe, 0xc5, 0x0d, 0x6e, 0xef, 0x8b, 0xd5, 0xf4, 0xd0, 0x7a, 0x88,
    0x62, 0x43, 0xc5, 0x8b, 0x23, 0x93, 0x94, 0x8d, 0xf7, 0x61, 0xa8, 0x47, 0x21, 0xa6, 0xca, 0x94,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Truncated(error::Error),
    /// Device coordinates are not a point on P-256
    PublicKey,
    /// Configured manufacturer key is not a point on P-256
    ManufacturerKey,
}

#[cfg(feature = "display")]
impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Truncated(err) => f.write_fmt(format_args!("truncated ecdh block: {}", err)),
            Self::PublicKey => f.write_str("ecdh block holds an invalid public point"),
            Self::ManufacturerKey => f.write_str("invalid manufacturer key"),
        }
    }
}

impl From<error::Error> for Error {
    fn from(err: error::Error) -> Self {
        Self::Truncated(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Signed by the manufacturer key
    Trusted,
    /// Well formed signature which does not verify
    Untrusted,
    /// Signature missing or not valid DER
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdhKey {
    pub public_key: PublicKey,
    pub signature: SignatureStatus,
}

/// Build a verifying key from big endian coordinates.
pub fn manufacturer_key(x: &[u8; 32], y: &[u8; 32]) -> Result<VerifyingKey, Error> {
    let point =
        EncodedPoint::from_affine_coordinates(FieldBytes::from_slice(x), FieldBytes::from_slice(y), false);
    VerifyingKey::from_encoded_point(&point).map_err(|_| Error::ManufacturerKey)
}

pub fn parse_ecdh(body: &[u8], manufacturer: &VerifyingKey) -> Result<EcdhKey, Error> {
    let mut reader = ByteReader::new(body);

    reader.set_pos(X_OFFSET)?;
    let x = be_from_le(reader.get_data(COORD_LEN)?);
    reader.set_pos(Y_OFFSET)?;
    let y = be_from_le(reader.get_data(COORD_LEN)?);
    debug!("ecdh x: {}", hex::encode(&x[..]));
    debug!("ecdh y: {}", hex::encode(&y[..]));

    let point = EncodedPoint::from_affine_coordinates(
        FieldBytes::from_slice(&x[..]),
        FieldBytes::from_slice(&y[..]),
        false,
    );
    let public_key = PublicKey::from_sec1_bytes(point.as_bytes()).map_err(|_| {
        error!("ECDH key is not on the curve");
        Error::PublicKey
    })?;

    let signature = verify_signature(body, &mut reader, manufacturer);
    Ok(EcdhKey {
        public_key,
        signature,
    })
}

fn verify_signature(
    body: &[u8],
    reader: &mut ByteReader<'_>,
    manufacturer: &VerifyingKey,
) -> SignatureStatus {
    let der = match reader
        .set_pos(SIGNED_LEN)
        .and_then(|_| reader.get_u32_le())
        .and_then(|len| reader.get_data(len as usize))
    {
        Ok(der) => der,
        Err(err) => {
            error!("ECDH signature missing: {:?}", err);
            return SignatureStatus::Malformed;
        }
    };

    let padding_start = reader.pos();
    reader
        .rest()
        .iter()
        .enumerate()
        .filter(|(_, b)| **b != 0)
        .for_each(|(i, _)| warn!("Expected zero at {}", padding_start + i));

    let signature = match Signature::from_der(der) {
        Ok(signature) => signature,
        Err(err) => {
            error!("ECDH signature is not valid DER: {}", err);
            return SignatureStatus::Malformed;
        }
    };

    let digest = Sha256::digest(&body[..SIGNED_LEN]);
    match manufacturer.verify_prehash(&digest, &signature) {
        Ok(()) => SignatureStatus::Trusted,
        Err(_) => {
            error!("Untrusted device");
            SignatureStatus::Untrusted
        }
    }
}
