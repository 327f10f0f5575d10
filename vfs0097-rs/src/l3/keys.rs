//! Unwrapping of the device private key stored in flash block 4.
//!
//! The block is `prefix (0x02) || iv (16) || ciphertext || hmac (32)`. The
//! AES master key is derived from the host seed, so a sensor paired with a
//! different machine fails the HMAC check.

use aes::Aes256;
use aes::cipher::{BlockDecrypt, KeyInit};
use hmac::{Hmac, Mac};
use log::{debug, error};
use p256::{EncodedPoint, FieldBytes, PublicKey, SecretKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::prf::{SHA256_LEN, prf_key};

/// Password the AES master key is derived from
pub const PRE_KEY: [u8; 32] = [
    0x71, 0x7c, 0xd7, 0x2d, 0x09, 0x62, 0xbc, 0x4a, 0x28, 0x46, 0x13, 0x8d, 0xbb, 0x2c, 0x24, 0x19,
    0x25, 0x12, 0xa7, 0x64, 0x07, 0x06, 0x5f, 0x38, 0x38, 0x46, 0x13, 0x9d, 0x4b, 0xec, 0x20, 0x33,
];
pub const LABEL: &[u8] = b"GWK";
/// Seed for the key validating the encrypted block
pub const SIGN_KEY: [u8; 32] = [
    0x3a, 0x4c, 0x76, 0xb7, 0x6a, 0x97, 0x98, 0x1d, 0x12, 0x74, 0x24, 0x7e, 0x16, 0x3e, 0x9a, 0x4c,
    0x1a, 0x1e, 0x7c, 0x8d, 0x0a, 0xb7, 0xea, 0x4d, 0x1c, 0x0a, 0x7b, 0xd1, 0x0b, 0x12, 0xf5, 0xbf,
];
pub const LABEL_SIGN: &[u8] = b"GWK_SIGN";

pub const PRIVATE_KEY_PREFIX: u8 = 2;
pub const IV_LEN: usize = 16;
/// X, Y and D as 32 byte little endian integers followed by padding
pub const PLAINTEXT_LEN: usize = 0x70;
pub const COORD_LEN: usize = 32;
pub const MIN_BODY_LEN: usize = 1 + IV_LEN + PLAINTEXT_LEN + SHA256_LEN;

const AES_BLOCK_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Unexpected first byte of the block
    Prefix(u8),
    /// Block shorter than the fixed layout: minimum, actual
    Length(usize, usize),
    /// HMAC over the encrypted part does not match
    Signature,
    Decrypt,
    /// X/Y is not a point on P-256
    PublicKey,
    /// D is not a valid P-256 scalar
    PrivateKey,
    /// D does not generate (X, Y)
    KeyMismatch,
}

#[cfg(feature = "display")]
impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Prefix(prefix) => f.write_fmt(format_args!(
                "unknown private key prefix {:#04x}",
                prefix
            )),
            Self::Length(min, act) => f.write_fmt(format_args!(
                "private key block too short: expected at least {} bytes, got {}",
                min, act
            )),
            Self::Signature => f.write_str("private key signature mismatch"),
            Self::Decrypt => f.write_str("unable to decrypt private key"),
            Self::PublicKey => f.write_str("private key block holds an invalid public point"),
            Self::PrivateKey => f.write_str("private key block holds an invalid scalar"),
            Self::KeyMismatch => f.write_str("private key does not match its public point"),
        }
    }
}

/// Keys derived from the host seed.
pub struct DerivedKeys {
    pub aes_master: Zeroizing<[u8; 32]>,
    pub validation: Zeroizing<[u8; 32]>,
}

impl DerivedKeys {
    pub fn from_seed(seed: &[u8]) -> Self {
        let aes_master = prf_key(&PRE_KEY, LABEL, seed);
        let validation = prf_key(&aes_master[..], LABEL_SIGN, &SIGN_KEY);
        Self {
            aes_master,
            validation,
        }
    }
}

pub fn unwrap_private_key(seed: &[u8], body: &[u8]) -> Result<SecretKey, Error> {
    let keys = DerivedKeys::from_seed(seed);

    match body.first() {
        Some(&PRIVATE_KEY_PREFIX) => {}
        Some(&prefix) => {
            error!("Unknown private key prefix {:02x}", prefix);
            return Err(Error::Prefix(prefix));
        }
        None => return Err(Error::Length(MIN_BODY_LEN, 0)),
    }
    if body.len() < MIN_BODY_LEN {
        return Err(Error::Length(MIN_BODY_LEN, body.len()));
    }

    let (encrypted, mac) = body[1..].split_at(body.len() - 1 - SHA256_LEN);
    let mut hmac = <Hmac<Sha256> as Mac>::new_from_slice(&keys.validation[..])
        .map_err(|_| Error::Signature)?;
    hmac.update(encrypted);
    if hmac.verify_slice(mac).is_err() {
        error!(
            "Signature verification failed. This device was probably paired with another computer."
        );
        return Err(Error::Signature);
    }

    let (iv, ciphertext) = encrypted.split_at(IV_LEN);
    let mut plaintext = Zeroizing::new([0_u8; PLAINTEXT_LEN]);
    plaintext.copy_from_slice(&ciphertext[..PLAINTEXT_LEN]);
    aes_256_cbc_decrypt(&keys.aes_master[..], iv, &mut plaintext[..])?;

    let x = be_from_le(&plaintext[..COORD_LEN]);
    let y = be_from_le(&plaintext[COORD_LEN..2 * COORD_LEN]);
    let d = be_from_le(&plaintext[2 * COORD_LEN..3 * COORD_LEN]);
    debug!("private key x: {}", hex::encode(&x[..]));
    debug!("private key y: {}", hex::encode(&y[..]));

    let point = EncodedPoint::from_affine_coordinates(
        FieldBytes::from_slice(&x[..]),
        FieldBytes::from_slice(&y[..]),
        false,
    );
    let public = PublicKey::from_sec1_bytes(point.as_bytes()).map_err(|_| {
        error!("Private key public point is not on the curve");
        Error::PublicKey
    })?;
    let secret = SecretKey::from_slice(&d[..]).map_err(|_| {
        error!("Private key scalar is out of range");
        Error::PrivateKey
    })?;

    if secret.public_key() != public {
        error!("Failed to validate private key");
        return Err(Error::KeyMismatch);
    }
    Ok(secret)
}

/// Big endian copy of a little endian integer.
pub(crate) fn be_from_le(le: &[u8]) -> Zeroizing<[u8; COORD_LEN]> {
    let mut be = Zeroizing::new([0_u8; COORD_LEN]);
    be.copy_from_slice(le);
    be.reverse();
    be
}

/// In place AES-256-CBC decryption without padding.
fn aes_256_cbc_decrypt(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), Error> {
    if data.len() % AES_BLOCK_LEN != 0 || iv.len() != AES_BLOCK_LEN {
        return Err(Error::Decrypt);
    }
    let cipher = Aes256::new_from_slice(key).map_err(|_| Error::Decrypt)?;

    let mut prev = [0_u8; AES_BLOCK_LEN];
    prev.copy_from_slice(iv);
    for block in data.chunks_exact_mut(AES_BLOCK_LEN) {
        let mut current = [0_u8; AES_BLOCK_LEN];
        current.copy_from_slice(block);
        cipher.decrypt_block(aes::Block::from_mut_slice(block));
        block.iter_mut().zip(prev.iter()).for_each(|(b, p)| *b ^= p);
        prev = current;
    }
    Ok(())
}
