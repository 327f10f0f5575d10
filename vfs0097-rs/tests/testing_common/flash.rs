use aes::Aes256;
use aes::cipher::{BlockEncrypt, KeyInit};
use p256::SecretKey;
use p256::ecdsa::signature::hazmat::PrehashSigner;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::{Digest, Sha256};

use vfs0097_rs::l2::flash::END_OF_BLOCKS;
use vfs0097_rs::l3::{
    ecdh::{SIGNED_LEN, X_OFFSET, Y_OFFSET},
    keys::{DerivedKeys, PLAINTEXT_LEN, PRIVATE_KEY_PREFIX},
    prf::hmac_sha256,
};

const IV: [u8; 16] = [0x5a; 16];

/// Builds the TLS flash partition as the sensor returns it.
#[derive(Default)]
pub struct FlashBuilder {
    payload: Vec<u8>,
}

impl FlashBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block(self, id: u16, body: &[u8]) -> Self {
        let hash = Sha256::digest(body);
        self.raw_block(id, body, &hash)
    }

    /// Block whose hash does not match its body.
    pub fn corrupted_block(self, id: u16, body: &[u8]) -> Self {
        let mut hash = Sha256::digest(body);
        hash[0] ^= 0xff;
        self.raw_block(id, body, &hash)
    }

    /// End marker followed by its empty size field, as the sensor writes it.
    pub fn end(mut self) -> Self {
        self.payload.extend_from_slice(&END_OF_BLOCKS.to_le_bytes());
        self.payload.extend_from_slice(&0_u16.to_le_bytes());
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.build_with_size(self.payload.len() as u32)
    }

    /// Container announcing `size` payload bytes.
    pub fn build_with_size(&self, size: u32) -> Vec<u8> {
        let mut out = vec![0x00, 0x00];
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(&[0x00, 0x00]);
        out.extend_from_slice(&self.payload);
        out
    }

    fn raw_block(mut self, id: u16, body: &[u8], hash: &[u8]) -> Self {
        self.payload.extend_from_slice(&id.to_le_bytes());
        self.payload
            .extend_from_slice(&(body.len() as u16).to_le_bytes());
        self.payload.extend_from_slice(hash);
        self.payload.extend_from_slice(body);
        self
    }
}

pub struct SealedKey {
    pub body: Vec<u8>,
    pub secret: SecretKey,
}

fn le(be: &[u8]) -> Vec<u8> {
    be.iter().rev().copied().collect()
}

/// Encrypt and sign a private key the way the sensor stores it.
pub fn sealed_private_key(seed: &[u8], d: &[u8; 32]) -> SealedKey {
    let keys = DerivedKeys::from_seed(seed);
    let secret = SecretKey::from_slice(d).expect("failed to create device key");
    let point = secret.public_key().to_encoded_point(false);

    let mut plaintext = Vec::new();
    plaintext.extend(le(point.x().expect("x")));
    plaintext.extend(le(point.y().expect("y")));
    plaintext.extend(le(d));
    plaintext.resize(PLAINTEXT_LEN, 0);

    let cipher = Aes256::new_from_slice(&keys.aes_master[..]).expect("failed to create cipher");
    let mut prev = IV;
    for block in plaintext.chunks_exact_mut(16) {
        block.iter_mut().zip(prev.iter()).for_each(|(b, p)| *b ^= p);
        cipher.encrypt_block(aes::Block::from_mut_slice(block));
        prev.copy_from_slice(block);
    }

    let mut encrypted = IV.to_vec();
    encrypted.extend(plaintext);
    let mac = hmac_sha256(&keys.validation[..], &encrypted);

    let mut body = vec![PRIVATE_KEY_PREFIX];
    body.extend(encrypted);
    body.extend(mac);
    SealedKey { body, secret }
}

/// ECDH block for the key with scalar `d`, signed by `signer`.
pub fn ecdh_block(signer: &SigningKey, d: &[u8; 32]) -> Vec<u8> {
    let public = SecretKey::from_slice(d)
        .expect("failed to create ecdh key")
        .public_key()
        .to_encoded_point(false);

    let mut body = vec![0_u8; SIGNED_LEN];
    body[X_OFFSET..X_OFFSET + 32].copy_from_slice(&le(public.x().expect("x")));
    body[Y_OFFSET..Y_OFFSET + 32].copy_from_slice(&le(public.y().expect("y")));

    let digest = Sha256::digest(&body);
    let signature: Signature = signer.sign_prehash(&digest).expect("failed to sign");
    let der = signature.to_der();
    body.extend_from_slice(&(der.as_bytes().len() as u32).to_le_bytes());
    body.extend_from_slice(der.as_bytes());
    body.resize(body.len() + 16, 0);
    body
}
