pub mod config;
pub mod seed;

use std::time::Duration;

use log::{debug, info, warn};
use nusb::{
    Device, DeviceInfo, Interface,
    io::{EndpointRead, EndpointWrite},
    transfer::{Bulk, In, Out},
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use vfs0097_rs::{
    device::VFS0097_INFO,
    l1::{self, Endpoint, ErrorKind, TransferError, Transport},
};

/// Number of IN transfers kept in flight by the reader
const NUM_TRANSFERS: usize = 1;
const MAX_PACKET_SIZE: usize = 64;
/// Configuration selected when the device comes up unconfigured
const CONFIGURATION: u8 = 1;

/// Delay between lookups while the device re-enumerates after a reset
const RESET_SETTLE: Duration = Duration::from_millis(100);
const REENUMERATE_ATTEMPTS: usize = 20;
/// How long a cancelled IN transfer gets to hand back late data
const DRAIN_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(thiserror::Error, Debug)]
pub enum UsbTransportError {
    #[error("Device not found")]
    DeviceNotFound,
    #[error("Interface already released")]
    Released,
    #[error("Transfer timed out")]
    Timeout,
    #[error("USB communication error: {0}")]
    NusbError(#[from] nusb::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransferError for UsbTransportError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::Timeout,
            Self::DeviceNotFound | Self::Released => ErrorKind::Disconnected,
            Self::NusbError(_) => ErrorKind::Other,
            Self::Io(err) => match err.kind() {
                std::io::ErrorKind::TimedOut => ErrorKind::Timeout,
                std::io::ErrorKind::NotConnected
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe => ErrorKind::Disconnected,
                std::io::ErrorKind::Interrupted => ErrorKind::Cancelled,
                _ => ErrorKind::Other,
            },
        }
    }
}

struct Endpoints {
    _interface: Interface,
    endpoint_in: EndpointRead<Bulk>,
    endpoint_out: EndpointWrite<Bulk>,
}

/// Bulk transport to a VFS0097 over nusb.
pub struct NusbTransport {
    _device: Device,
    endpoints: Option<Endpoints>,
}

impl std::fmt::Debug for NusbTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NusbTransport")
            .field("claimed", &self.endpoints.is_some())
            .finish()
    }
}

/// Attached devices handled by the driver.
pub async fn find_devices() -> Result<Vec<DeviceInfo>, UsbTransportError> {
    let devices = nusb::list_devices().await?;
    Ok(devices
        .filter(|info| VFS0097_INFO.matches(info.vendor_id(), info.product_id()))
        .collect())
}

async fn first_device() -> Result<DeviceInfo, UsbTransportError> {
    find_devices()
        .await?
        .into_iter()
        .next()
        .ok_or(UsbTransportError::DeviceNotFound)
}

async fn reopen_after_reset() -> Result<Device, UsbTransportError> {
    for _ in 0..REENUMERATE_ATTEMPTS {
        tokio::time::sleep(RESET_SETTLE).await;
        if let Ok(info) = first_device().await {
            match info.open().await {
                Ok(device) => return Ok(device),
                Err(err) => debug!("Device not ready after reset: {}", err),
            }
        }
    }
    Err(UsbTransportError::DeviceNotFound)
}

/// Configuration to select given the active one, `None` to keep it.
fn configuration_to_select(active: Option<u8>) -> Option<u8> {
    match active {
        None | Some(0) => Some(CONFIGURATION),
        Some(_) => None,
    }
}

/// Read and drop whatever `reader` still yields until it reports EOF, fails
/// or stays silent for [`DRAIN_TIMEOUT`]. Returns the number of bytes dropped.
async fn drain<R: AsyncRead + Unpin>(reader: &mut R) -> usize {
    let mut scratch = [0_u8; MAX_PACKET_SIZE];
    let mut discarded = 0;
    while let Ok(Ok(n @ 1..)) = tokio::time::timeout(DRAIN_TIMEOUT, reader.read(&mut scratch)).await
    {
        discarded += n;
    }
    discarded
}

/// Cancel the IN transfer a timed out read left queued, so a late reply is
/// not handed to the next request.
async fn discard_pending(endpoint_in: &mut EndpointRead<Bulk>) {
    endpoint_in.cancel_all();
    let discarded = drain(endpoint_in).await;
    if discarded > 0 {
        warn!("Discarded {} bytes of a late reply", discarded);
    }
    endpoint_in.set_num_transfers(NUM_TRANSFERS);
}

impl NusbTransport {
    /// Reset the first attached sensor, make sure it is configured and claim
    /// its interface.
    pub async fn connect(buffer_len: usize) -> Result<Self, UsbTransportError> {
        let info = first_device().await?;
        info!("Found device: {:?}", info);

        // the old handle is unusable once the device re-enumerates
        info.open().await?.reset().await?;
        let device = reopen_after_reset().await?;

        let active = device
            .active_configuration()
            .ok()
            .map(|config| config.configuration_value());
        if let Some(config) = configuration_to_select(active) {
            debug!("Selecting configuration {}", config);
            device.set_configuration(config).await?;
        }

        let interface = device.claim_interface(l1::INTERFACE_NUMBER).await?;

        let transfer_len = buffer_len.next_multiple_of(MAX_PACKET_SIZE);
        let endpoint_in = interface
            .endpoint::<Bulk, In>(Endpoint::BulkIn.address())?
            .reader(transfer_len)
            .with_num_transfers(NUM_TRANSFERS);
        let endpoint_out = interface
            .endpoint::<Bulk, Out>(Endpoint::BulkOut.address())?
            .writer(MAX_PACKET_SIZE)
            .with_num_transfers(NUM_TRANSFERS);

        Ok(Self {
            _device: device,
            endpoints: Some(Endpoints {
                _interface: interface,
                endpoint_in,
                endpoint_out,
            }),
        })
    }

    fn endpoints(&mut self) -> Result<&mut Endpoints, UsbTransportError> {
        self.endpoints.as_mut().ok_or(UsbTransportError::Released)
    }
}

impl Transport for NusbTransport {
    type Error = UsbTransportError;

    async fn bulk_write(
        &mut self,
        endpoint: Endpoint,
        data: &[u8],
        timeout: Duration,
    ) -> Result<usize, Self::Error> {
        debug_assert_eq!(endpoint, Endpoint::BulkOut);
        let out = &mut self.endpoints()?.endpoint_out;
        tokio::time::timeout(timeout, async {
            out.write_all(data).await?;
            out.flush().await
        })
        .await
        .map_err(|_| UsbTransportError::Timeout)??;
        Ok(data.len())
    }

    async fn bulk_read(
        &mut self,
        endpoint: Endpoint,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<usize, Self::Error> {
        debug_assert_eq!(endpoint, Endpoint::BulkIn);
        let endpoint_in = &mut self.endpoints()?.endpoint_in;
        let res = tokio::time::timeout(timeout, endpoint_in.read(buf)).await;
        match res {
            Ok(res) => Ok(res?),
            Err(_) => {
                discard_pending(endpoint_in).await;
                Err(UsbTransportError::Timeout)
            }
        }
    }

    async fn release(&mut self) -> Result<(), Self::Error> {
        if self.endpoints.take().is_some() {
            debug!("Released interface {}", l1::INTERFACE_NUMBER);
        }
        Ok(())
    }
}
