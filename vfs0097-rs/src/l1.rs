use core::fmt::Debug;
use core::time::Duration;

use log::error;

/// USB vendor id of Validity Sensors
pub const VENDOR_ID: u16 = 0x138a;
/// USB product id of the VFS0097
pub const PRODUCT_ID: u16 = 0x0097;
/// The sensor exposes a single vendor specific interface
pub const INTERFACE_NUMBER: u8 = 0;

/// Timeout applied to every bulk transfer
pub const USB_TIMEOUT: Duration = Duration::from_millis(1000);
/// Default capacity of the response buffer, large enough for a full flash partition read
pub const USB_BUFFER_SIZE: usize = 0x10000;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    BulkOut = 0x01,
    BulkIn = 0x81,
    /// Interrupt endpoint, declared by the device but unused during init
    Interrupt = 0x83,
}

impl Endpoint {
    pub fn address(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    Stall,
    Disconnected,
    Cancelled,
    Other,
}

#[cfg(feature = "display")]
impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout => f.write_str("transfer timed out"),
            Self::Stall => f.write_str("endpoint stalled"),
            Self::Disconnected => f.write_str("device disconnected"),
            Self::Cancelled => f.write_str("transfer cancelled"),
            Self::Other => f.write_str("transfer failed"),
        }
    }
}

/// Error reported by a [`Transport`] implementation.
pub trait TransferError: Debug {
    fn kind(&self) -> ErrorKind;
}

impl TransferError for ErrorKind {
    fn kind(&self) -> ErrorKind {
        *self
    }
}

/// Asynchronous bulk transfers to the sensor.
///
/// Implementations submit exactly one transfer per call and report the
/// number of bytes actually moved. Deciding whether a short transfer is
/// acceptable is left to the caller.
#[allow(async_fn_in_trait)]
pub trait Transport {
    type Error: TransferError;

    async fn bulk_write(
        &mut self,
        endpoint: Endpoint,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, Self::Error>;

    async fn bulk_read(
        &mut self,
        endpoint: Endpoint,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Self::Error>;

    /// Give the interface back to the system.
    async fn release(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// What to do when a transfer moves fewer bytes than requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortTransferPolicy {
    Error,
    Allow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Usb(ErrorKind),
    /// Short write: expected, actual
    ShortWrite(usize, usize),
    /// Short read: expected, actual
    ShortRead(usize, usize),
}

#[cfg(feature = "display")]
impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Usb(kind) => f.write_fmt(format_args!("usb error: {}", kind)),
            Self::ShortWrite(exp, act) => f.write_fmt(format_args!(
                "short write: expected {} bytes, sent {}",
                exp, act
            )),
            Self::ShortRead(exp, act) => f.write_fmt(format_args!(
                "short read: expected {} bytes, got {}",
                exp, act
            )),
        }
    }
}

impl<E: TransferError> From<E> for Error {
    fn from(err: E) -> Self {
        Self::Usb(err.kind())
    }
}

pub(crate) async fn write<T: Transport>(
    transport: &mut T,
    data: &[u8],
    policy: ShortTransferPolicy,
    timeout: Duration,
) -> Result<usize, Error> {
    let sent = transport
        .bulk_write(Endpoint::BulkOut, data, timeout)
        .await
        .inspect_err(|e| error!("USB write transfer: {:?}", e.kind()))?;

    if sent < data.len() && policy == ShortTransferPolicy::Error {
        error!("USB write transfer: sent {} of {} bytes", sent, data.len());
        return Err(Error::ShortWrite(data.len(), sent));
    }
    Ok(sent)
}

pub(crate) async fn read<T: Transport>(
    transport: &mut T,
    buf: &mut [u8],
    policy: ShortTransferPolicy,
    timeout: Duration,
) -> Result<usize, Error> {
    let received = transport
        .bulk_read(Endpoint::BulkIn, buf, timeout)
        .await
        .inspect_err(|e| error!("USB read transfer: {:?}", e.kind()))?;

    if received < buf.len() && policy == ShortTransferPolicy::Error {
        error!("USB read transfer: got {} of {} bytes", received, buf.len());
        return Err(Error::ShortRead(buf.len(), received));
    }
    Ok(received)
}
