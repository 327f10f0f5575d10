pub mod flash;
pub mod init;

use core::time::Duration;

use log::{debug, error};
use zeroize::Zeroize;

use crate::l1::{self, ShortTransferPolicy, Transport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    L1(l1::Error),
    Flash(flash::Error),
    /// Nothing to send
    EmptyRequest,
    /// Device answered with more data than the response buffer holds: capacity, received
    ResponseOverflow(usize, usize),
}

#[cfg(feature = "display")]
impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::L1(err) => f.write_fmt(format_args!("l1 error: {}", err)),
            Self::Flash(err) => f.write_fmt(format_args!("flash error: {}", err)),
            Self::EmptyRequest => f.write_str("l2: refusing to send an empty request"),
            Self::ResponseOverflow(cap, act) => f.write_fmt(format_args!(
                "l2: response buffer too small: capacity {} bytes, received {}",
                cap, act
            )),
        }
    }
}

impl From<l1::Error> for Error {
    fn from(err: l1::Error) -> Self {
        Self::L1(err)
    }
}

impl From<flash::Error> for Error {
    fn from(err: flash::Error) -> Self {
        Self::Flash(err)
    }
}

/// Receive buffer shared by all exchanges of a session.
///
/// The backing storage has a fixed capacity; `len` tracks how much of it
/// the last read filled.
#[derive(Debug)]
pub struct ResponseBuffer {
    data: Vec<u8>,
    len: usize,
}

impl ResponseBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0_u8; capacity],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Valid part of the last response.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Wipe the contents, the capacity is kept.
    pub fn clear(&mut self) {
        self.data.as_mut_slice().zeroize();
        self.len = 0;
    }

    fn fill(&mut self) -> &mut [u8] {
        self.len = 0;
        &mut self.data
    }
}

impl Drop for ResponseBuffer {
    fn drop(&mut self) {
        // flash reads carry the wrapped private key
        self.data.zeroize();
    }
}

/// Stages of a single command exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Write,
    Read,
    Done,
}

impl ExecState {
    pub fn next(self) -> Self {
        match self {
            Self::Write => Self::Read,
            Self::Read | Self::Done => Self::Done,
        }
    }
}

/// Send `request` and read the answer into `response`.
///
/// A short write fails the exchange, a short read is expected and only
/// shrinks the valid length of `response`.
pub async fn exec_command<T: Transport>(
    transport: &mut T,
    request: &[u8],
    response: &mut ResponseBuffer,
    timeout: Duration,
) -> Result<(), Error> {
    if request.is_empty() {
        return Err(Error::EmptyRequest);
    }

    let mut state = ExecState::Write;
    loop {
        match state {
            ExecState::Write => {
                debug!("l2: sending {} bytes: {}", request.len(), hex::encode(request));
                l1::write(transport, request, ShortTransferPolicy::Error, timeout).await?;
            }
            ExecState::Read => {
                let capacity = response.capacity();
                let received =
                    l1::read(transport, response.fill(), ShortTransferPolicy::Allow, timeout)
                        .await?;
                if received > capacity {
                    error!("l2: device sent {} bytes, buffer holds {}", received, capacity);
                    return Err(Error::ResponseOverflow(capacity, received));
                }
                response.len = received;
                debug!("l2: received {} bytes", received);
            }
            ExecState::Done => return Ok(()),
        }
        state = state.next();
    }
}
