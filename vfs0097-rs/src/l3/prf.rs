use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

pub const SHA256_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

fn hmac_init(key: &[u8]) -> HmacSha256 {
    // HMAC hashes oversized keys and pads short ones
    HmacSha256::new_from_slice(key).expect("HMAC can take a key of any size")
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; SHA256_LEN] {
    let mut mac = hmac_init(key);
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// TLS 1.2 P_SHA256 expansion of `secret` over `label || seed`, filling `out`.
pub fn prf_sha256(secret: &[u8], label: &[u8], seed: &[u8], out: &mut [u8]) {
    let keyed = hmac_init(secret);

    // A(1)
    let mut a = {
        let mut mac = keyed.clone();
        mac.update(label);
        mac.update(seed);
        Zeroizing::new(<[u8; SHA256_LEN]>::from(mac.finalize().into_bytes()))
    };

    for chunk in out.chunks_mut(SHA256_LEN) {
        let mut mac = keyed.clone();
        mac.update(&a[..]);
        mac.update(label);
        mac.update(seed);
        let block = Zeroizing::new(<[u8; SHA256_LEN]>::from(mac.finalize().into_bytes()));
        chunk.copy_from_slice(&block[..chunk.len()]);

        let mut mac = keyed.clone();
        mac.update(&a[..]);
        *a = mac.finalize().into_bytes().into();
    }
}

/// Derive a 32 byte key.
pub fn prf_key(secret: &[u8], label: &[u8], seed: &[u8]) -> Zeroizing<[u8; SHA256_LEN]> {
    let mut key = Zeroizing::new([0_u8; SHA256_LEN]);
    prf_sha256(secret, label, seed, &mut key[..]);
    key
}
