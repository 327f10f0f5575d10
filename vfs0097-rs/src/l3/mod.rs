pub mod ecdh;
pub mod handshake;
pub mod keys;
pub mod prf;

use core::cell::OnceCell;

use log::{debug, error, info, warn};
use p256::SecretKey;
use p256::ecdsa::VerifyingKey;

use crate::l2::flash::{BlockId, FlashData};
use ecdh::{EcdhKey, SignatureStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Ecdh(ecdh::Error),
    Handshake(handshake::Error),
}

#[cfg(feature = "display")]
impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ecdh(err) => f.write_fmt(format_args!("ecdh error: {}", err)),
            Self::Handshake(err) => f.write_fmt(format_args!("handshake error: {}", err)),
        }
    }
}

impl From<ecdh::Error> for Error {
    fn from(err: ecdh::Error) -> Self {
        Self::Ecdh(err)
    }
}

impl From<handshake::Error> for Error {
    fn from(err: handshake::Error) -> Self {
        Self::Handshake(err)
    }
}

/// Key material recovered from the flash of a paired sensor.
///
/// Every item can be set once per session, later blocks of the same kind
/// are ignored.
#[derive(Debug, Default)]
pub struct TlsKeys {
    certificate: OnceCell<Vec<u8>>,
    private_key: OnceCell<SecretKey>,
    ecdh: OnceCell<EcdhKey>,
}

impl TlsKeys {
    pub fn certificate(&self) -> Option<&[u8]> {
        self.certificate.get().map(Vec::as_slice)
    }

    pub fn private_key(&self) -> Option<&SecretKey> {
        self.private_key.get()
    }

    pub fn ecdh(&self) -> Option<&EcdhKey> {
        self.ecdh.get()
    }

    /// Device key is present and signed by the manufacturer.
    pub fn is_trusted(&self) -> bool {
        self.ecdh()
            .is_some_and(|key| key.signature == SignatureStatus::Trusted)
    }

    /// Hand every verified flash block to its handler.
    ///
    /// Invalid blocks are logged and leave the corresponding slot empty.
    pub fn install(&mut self, flash: &FlashData<'_>, seed: &[u8], manufacturer: &VerifyingKey) {
        for block in &flash.blocks {
            match block.id {
                BlockId::Empty(id) => debug!("Ignoring block {}", id),
                BlockId::Certificate => {
                    if self.certificate.set(block.body.to_vec()).is_err() {
                        warn!("Duplicate certificate block ignored");
                    } else {
                        info!("Certificate installed ({} bytes)", block.body.len());
                    }
                }
                BlockId::PrivateKey => {
                    if self.private_key.get().is_some() {
                        warn!("Duplicate private key block ignored");
                        continue;
                    }
                    match keys::unwrap_private_key(seed, block.body) {
                        Ok(key) => {
                            let _ = self.private_key.set(key);
                            info!("Private key installed");
                        }
                        Err(err) => error!("Failed to load private key: {:?}", err),
                    }
                }
                BlockId::Ecdh => {
                    if self.ecdh.get().is_some() {
                        warn!("Duplicate ECDH block ignored");
                        continue;
                    }
                    match ecdh::parse_ecdh(block.body, manufacturer) {
                        Ok(key) => {
                            info!("ECDH key installed, signature {:?}", key.signature);
                            let _ = self.ecdh.set(key);
                        }
                        Err(err) => error!("Failed to load ECDH key: {:?}", err),
                    }
                }
                BlockId::Unknown(id) => {
                    warn!("Unhandled block id {:04x} ({} bytes)", id, block.body.len())
                }
            }
        }
    }
}
