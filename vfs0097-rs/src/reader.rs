use crate::error::Error;

/// Little endian cursor over a borrowed byte slice.
#[derive(Debug, Clone)]
pub(crate) struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn set_pos(&mut self, pos: usize) -> Result<(), Error> {
        if pos > self.data.len() {
            return Err(Error::OutOfBounds(pos, self.data.len()));
        }
        self.pos = pos;
        Ok(())
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), Error> {
        self.get_data(n).map(|_| ())
    }

    pub(crate) fn get_data(&mut self, n: usize) -> Result<&'a [u8], Error> {
        if n > self.remaining() {
            return Err(Error::NotEnoughData(n, self.remaining()));
        }
        let data = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(data)
    }

    pub(crate) fn get_array<const N: usize>(&mut self) -> Result<[u8; N], Error> {
        let mut out = [0_u8; N];
        out.copy_from_slice(self.get_data(N)?);
        Ok(out)
    }

    pub(crate) fn get_u16_le(&mut self) -> Result<u16, Error> {
        self.get_array().map(u16::from_le_bytes)
    }

    pub(crate) fn get_u32_le(&mut self) -> Result<u32, Error> {
        self.get_array().map(u32::from_le_bytes)
    }

    /// Bytes not consumed yet.
    pub(crate) fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }
}
