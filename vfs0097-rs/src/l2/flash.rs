//! Parser for the TLS partition read from the sensor flash.
//!
//! The partition starts with an 8 byte header (2 skipped bytes, a little
//! endian `u32` payload size, 2 skipped bytes) followed by blocks:
//!
//! | field | size |
//! |-------|------|
//! | id    | 2    |
//! | size  | 2    |
//! | hash  | 32   |
//! | body  | size |
//!
//! The hash is the SHA-256 of the body. Id `0xffff` followed by its size
//! field ends the list, anything after it is ignored.

use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::{error, reader::ByteReader};

pub const HEADER_LEN: usize = 8;
pub const BLOCK_HEADER_LEN: usize = 4;
pub const HASH_LEN: usize = 32;
pub const END_OF_BLOCKS: u16 = 0xffff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Header(error::Error),
    /// Payload size in the header does not match what was read: declared, actual
    SizeMismatch(usize, usize),
}

#[cfg(feature = "display")]
impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Header(err) => f.write_fmt(format_args!("invalid flash header: {}", err)),
            Self::SizeMismatch(declared, actual) => f.write_fmt(format_args!(
                "flash payload size mismatch: header declares {} bytes, got {}",
                declared, actual
            )),
        }
    }
}

impl From<error::Error> for Error {
    fn from(err: error::Error) -> Self {
        Self::Header(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockId {
    /// Ids 0 to 2 carry nothing the driver needs
    Empty(u16),
    Certificate,
    PrivateKey,
    Ecdh,
    Unknown(u16),
}

impl From<u16> for BlockId {
    fn from(value: u16) -> Self {
        match value {
            0..=2 => Self::Empty(value),
            3 => Self::Certificate,
            4 => Self::PrivateKey,
            6 => Self::Ecdh,
            _ => Self::Unknown(value),
        }
    }
}

impl From<BlockId> for u16 {
    fn from(id: BlockId) -> Self {
        match id {
            BlockId::Empty(value) | BlockId::Unknown(value) => value,
            BlockId::Certificate => 3,
            BlockId::PrivateKey => 4,
            BlockId::Ecdh => 6,
        }
    }
}

/// A block whose hash matched its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block<'a> {
    pub id: BlockId,
    pub body: &'a [u8],
}

#[derive(Debug, Default)]
pub struct FlashData<'a> {
    pub blocks: Vec<Block<'a>>,
    /// Payload size announced by the container header
    pub declared_size: usize,
    /// Payload bytes walked, including the end marker and its size field
    pub consumed: usize,
    /// Blocks dropped because of a hash mismatch
    pub skipped: usize,
}

impl<'a> FlashData<'a> {
    pub fn find(&self, id: BlockId) -> impl Iterator<Item = &Block<'a>> {
        self.blocks.iter().filter(move |block| block.id == id)
    }
}

pub fn parse(data: &[u8]) -> Result<FlashData<'_>, Error> {
    let mut reader = ByteReader::new(data);
    reader.skip(2)?;
    let declared_size = reader.get_u32_le()? as usize;
    reader.skip(2)?;

    if reader.remaining() != declared_size {
        warn!(
            "flash: header declares {} bytes, {} available",
            declared_size,
            reader.remaining()
        );
        return Err(Error::SizeMismatch(declared_size, reader.remaining()));
    }

    let mut flash = FlashData {
        declared_size,
        ..Default::default()
    };

    while reader.remaining() > 0 {
        let id = match reader.get_u16_le() {
            Ok(id) => id,
            Err(err) => {
                warn!("flash: truncated block header: {:?}", err);
                break;
            }
        };
        if id == END_OF_BLOCKS {
            // the marker carries a size field too
            let _ = reader.skip(2);
            break;
        }
        let (size, hash, body) = match read_block(&mut reader) {
            Ok(fields) => fields,
            Err(err) => {
                warn!("flash: truncated block {}: {:?}", id, err);
                break;
            }
        };

        let digest: [u8; HASH_LEN] = Sha256::digest(body).into();
        if digest != hash {
            warn!("Hash mismatch for block {}", id);
            flash.skipped += 1;
            continue;
        }

        debug!("flash: block {:#06x}, {} bytes", id, size);
        flash.blocks.push(Block {
            id: id.into(),
            body,
        });
    }

    flash.consumed = reader.pos() - HEADER_LEN;
    Ok(flash)
}

fn read_block<'a>(
    reader: &mut ByteReader<'a>,
) -> Result<(u16, [u8; HASH_LEN], &'a [u8]), error::Error> {
    let size = reader.get_u16_le()?;
    let hash = reader.get_array::<HASH_LEN>()?;
    let body = reader.get_data(size as usize)?;
    Ok((size, hash, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&id.to_le_bytes());
        out.extend_from_slice(&(body.len() as u16).to_le_bytes());
        out.extend_from_slice(&Sha256::digest(body));
        out.extend_from_slice(body);
        out
    }

    fn container(payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0_u8; 2];
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&[0, 0]);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn well_formed_container_is_fully_consumed() {
        let mut payload = block(3, b"certificate");
        payload.extend(block(1, &[0; 5]));
        payload.extend(END_OF_BLOCKS.to_le_bytes());
        let data = container(&payload);

        let flash = parse(&data).expect("failed to parse flash");
        assert_eq!(flash.consumed, flash.declared_size);
        assert_eq!(flash.skipped, 0);
        assert_eq!(
            flash.blocks,
            vec![
                Block {
                    id: BlockId::Certificate,
                    body: b"certificate"
                },
                Block {
                    id: BlockId::Empty(1),
                    body: &[0; 5]
                },
            ]
        );
    }

    #[test]
    fn end_marker_hides_later_blocks() {
        let mut payload = block(3, b"certificate");
        let end = payload.len() + 4;
        payload.extend(END_OF_BLOCKS.to_le_bytes());
        payload.extend(0_u16.to_le_bytes());
        payload.extend(block(6, b"after the end"));
        let data = container(&payload);

        let flash = parse(&data).expect("failed to parse flash");
        assert_eq!(flash.consumed, end);
        assert_eq!(flash.find(BlockId::Ecdh).count(), 0);
        assert_eq!(flash.blocks.len(), 1);
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let payload = block(3, b"certificate");
        let mut data = container(&payload);
        data.push(0);

        let res = parse(&data);
        assert_eq!(
            res.map(|f| f.blocks.len()),
            Err(Error::SizeMismatch(payload.len(), payload.len() + 1))
        );
    }

    #[test]
    fn corrupted_block_is_skipped() {
        let mut corrupted = block(4, &[0x11; 16]);
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;

        let mut payload = block(3, b"first");
        payload.extend(corrupted);
        payload.extend(block(6, b"third"));
        payload.extend(END_OF_BLOCKS.to_le_bytes());
        let data = container(&payload);

        let flash = parse(&data).expect("failed to parse flash");
        assert_eq!(flash.skipped, 1);
        let ids: Vec<_> = flash.blocks.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![BlockId::Certificate, BlockId::Ecdh]);
    }

    #[test]
    fn truncated_block_stops_the_walk() {
        let mut payload = block(3, b"kept");
        let mut cut = block(6, &[0x22; 40]);
        cut.truncate(cut.len() - 10);
        payload.extend(cut);
        let data = container(&payload);

        let flash = parse(&data).expect("failed to parse flash");
        assert_eq!(flash.blocks.len(), 1);
        assert_eq!(flash.find(BlockId::Certificate).count(), 1);
    }

    #[test]
    fn missing_end_marker_is_accepted() {
        let payload = block(0, &[]);
        let data = container(&payload);

        let flash = parse(&data).expect("failed to parse flash");
        assert_eq!(flash.consumed, payload.len());
        assert_eq!(flash.blocks[0].id, BlockId::Empty(0));
    }

    #[test]
    fn short_header_is_an_error() {
        assert!(matches!(parse(&[0, 0, 1]), Err(Error::Header(_))));
    }

    #[test]
    fn block_id_mapping() {
        assert_eq!(BlockId::from(5), BlockId::Unknown(5));
        assert_eq!(u16::from(BlockId::Ecdh), 6);
        assert_eq!(BlockId::from(u16::from(BlockId::PrivateKey)), BlockId::PrivateKey);
    }
}
