use std::collections::VecDeque;
use std::time::Duration;

use vfs0097_rs::CancelHandle;
use vfs0097_rs::l1::{Endpoint, ErrorKind, Transport};

/// Transport replaying canned replies and recording every write.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    replies: VecDeque<Result<Vec<u8>, ErrorKind>>,
    pub written: Vec<Vec<u8>>,
    pub timeouts: Vec<Duration>,
    pub released: bool,
    cancel_on_write: Option<(usize, CancelHandle)>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, data: Vec<u8>) -> Self {
        self.replies.push_back(Ok(data));
        self
    }

    pub fn fail(mut self, kind: ErrorKind) -> Self {
        self.replies.push_back(Err(kind));
        self
    }

    /// Fire `handle` once the `nth` write (1 based) went out.
    pub fn cancel_on_write(&mut self, nth: usize, handle: CancelHandle) {
        self.cancel_on_write = Some((nth, handle));
    }

    pub fn pending_replies(&self) -> usize {
        self.replies.len()
    }
}

impl Transport for ScriptedTransport {
    type Error = ErrorKind;

    async fn bulk_write(
        &mut self,
        endpoint: Endpoint,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, Self::Error> {
        assert_eq!(endpoint, Endpoint::BulkOut);
        self.written.push(data.to_vec());
        self.timeouts.push(timeout);
        if let Some((nth, handle)) = &self.cancel_on_write {
            if *nth == self.written.len() {
                handle.cancel();
            }
        }
        Ok(data.len())
    }

    async fn bulk_read(
        &mut self,
        endpoint: Endpoint,
        buf: &mut [u8],
        _timeout: Duration,
    ) -> Result<usize, Self::Error> {
        assert_eq!(endpoint, Endpoint::BulkIn);
        let reply = self.replies.pop_front().unwrap_or(Err(ErrorKind::Timeout))?;
        let n = reply.len().min(buf.len());
        buf[..n].copy_from_slice(&reply[..n]);
        Ok(n)
    }

    async fn release(&mut self) -> Result<(), Self::Error> {
        self.released = true;
        Ok(())
    }
}
