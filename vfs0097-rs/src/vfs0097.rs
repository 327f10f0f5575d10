use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, info, warn};
use p256::ecdsa::VerifyingKey;

use crate::config::DriverConfig;
use crate::device::{DriverInfo, FpDevice, Print, VFS0097_INFO};
use crate::l1::{self, Transport};
use crate::l2::{
    self, ResponseBuffer, exec_command, flash,
    init::{self, InitCommand, RomInfo},
};
use crate::l3::{self, TlsKeys, handshake::Handshake};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    L1(l1::Error),
    L2(l2::Error),
    L3(l3::Error),
    /// No seed to derive the flash keys from
    SeedMissing,
    /// Init command without a payload
    InitSequence(InitCommand),
    /// Sensor was never paired, carries the reported init byte
    NotInitialized(u8),
    Cancelled,
    NotOpen,
    AlreadyOpen,
}

#[cfg(feature = "display")]
impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::L1(err) => f.write_fmt(format_args!("l1 error: {}", err)),
            Self::L2(err) => f.write_fmt(format_args!("l2 error: {}", err)),
            Self::L3(err) => f.write_fmt(format_args!("l3 error: {}", err)),
            Self::SeedMissing => f.write_str("seed value is not initialized"),
            Self::InitSequence(cmd) => {
                f.write_fmt(format_args!("no payload configured for {:?}", cmd))
            }
            Self::NotInitialized(byte) => f.write_fmt(format_args!(
                "device is not initialized (init byte {:#04x}), pair it from Windows first",
                byte
            )),
            Self::Cancelled => f.write_str("operation cancelled"),
            Self::NotOpen => f.write_str("device is not open"),
            Self::AlreadyOpen => f.write_str("device is already open"),
        }
    }
}

#[cfg(feature = "display")]
impl std::error::Error for Error {}

impl From<l1::Error> for Error {
    fn from(err: l1::Error) -> Self {
        Self::L1(err)
    }
}

impl From<l2::Error> for Error {
    fn from(err: l2::Error) -> Self {
        Self::L2(err)
    }
}

impl From<l3::Error> for Error {
    fn from(err: l3::Error) -> Self {
        Self::L3(err)
    }
}

#[derive(Debug, Default)]
struct CancelState {
    running: AtomicBool,
    requested: AtomicBool,
}

/// Requests cancellation of a running open from another task.
///
/// A request made while no open is running is dropped.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<CancelState>);

impl CancelHandle {
    pub fn cancel(&self) {
        if self.0.running.load(Ordering::SeqCst) {
            self.0.requested.store(true, Ordering::SeqCst);
        } else {
            debug!("Cancel ignored, no open in progress");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.requested.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.0.running.load(Ordering::SeqCst)
    }

    fn begin(&self) {
        self.0.requested.store(false, Ordering::SeqCst);
        self.0.running.store(true, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.0.running.store(false, Ordering::SeqCst);
        self.0.requested.store(false, Ordering::SeqCst);
    }
}

/// Stages of the device open sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    SendInit1,
    CheckInitialized,
    SendInit2,
    GetPartitionHeader,
    SendInit4,
    GetFlashInfo,
    ReadFlashTlsData,
    InitKeys,
    Handshake,
    Done,
}

impl InitState {
    pub fn next(self) -> Self {
        match self {
            Self::SendInit1 => Self::CheckInitialized,
            Self::CheckInitialized => Self::SendInit2,
            Self::SendInit2 => Self::GetPartitionHeader,
            Self::GetPartitionHeader => Self::SendInit4,
            Self::SendInit4 => Self::GetFlashInfo,
            Self::GetFlashInfo => Self::ReadFlashTlsData,
            Self::ReadFlashTlsData => Self::InitKeys,
            Self::InitKeys => Self::Handshake,
            Self::Handshake | Self::Done => Self::Done,
        }
    }

    /// Command exchanged with the sensor in this state.
    pub fn command(self) -> Option<InitCommand> {
        match self {
            Self::SendInit1 => Some(InitCommand::GetRomInfo),
            Self::SendInit2 => Some(InitCommand::SendInit2),
            Self::GetPartitionHeader => Some(InitCommand::GetPartitionHeader),
            Self::SendInit4 => Some(InitCommand::SendInit4),
            Self::GetFlashInfo => Some(InitCommand::GetFlashInfo),
            Self::ReadFlashTlsData => Some(InitCommand::ReadFlashTlsData),
            Self::CheckInitialized | Self::InitKeys | Self::Handshake | Self::Done => None,
        }
    }
}

#[derive(Debug)]
struct Session {
    response: ResponseBuffer,
    keys: TlsKeys,
}

/// Driver for the Validity VFS0097 sensor.
pub struct Vfs0097<T> {
    transport: T,
    config: DriverConfig,
    session: Option<Session>,
    cancel: CancelHandle,
}

impl<T: Transport> Vfs0097<T> {
    pub fn new(transport: T, config: DriverConfig) -> Self {
        Self {
            transport,
            config,
            session: None,
            cancel: CancelHandle::default(),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Key material loaded by the last successful open.
    pub fn tls_keys(&self) -> Option<&TlsKeys> {
        self.session.as_ref().map(|session| &session.keys)
    }

    /// Reply to the last command of the open sequence.
    pub fn last_response(&self) -> Option<&[u8]> {
        self.session.as_ref().map(|session| session.response.as_slice())
    }

    /// Run the init sequence and load the TLS keys from flash.
    ///
    /// A key that fails validation does not fail the open, check
    /// [`Vfs0097::tls_keys`] for what was recovered.
    pub async fn open(&mut self) -> Result<(), Error> {
        if self.session.is_some() {
            return Err(Error::AlreadyOpen);
        }
        if self.config.seed.is_empty() {
            error!("Seed value is not initialized");
            return Err(Error::SeedMissing);
        }
        if let Some(cmd) = self.config.init_sequence.missing() {
            error!("No payload configured for {:?}", cmd);
            return Err(Error::InitSequence(cmd));
        }
        let manufacturer = self
            .config
            .manufacturer_key
            .verifying_key()
            .map_err(l3::Error::from)?;

        let mut session = Session {
            response: ResponseBuffer::new(self.config.response_buffer_len),
            keys: TlsKeys::default(),
        };
        self.cancel.begin();
        let res = run_init(
            &mut self.transport,
            &mut session,
            &self.config,
            &manufacturer,
            &self.cancel,
        )
        .await;
        self.cancel.finish();

        match res {
            Ok(()) => {
                info!("Device opened");
                self.session = Some(session);
                Ok(())
            }
            Err(err) => {
                error!("Failed to open device: {:?}", err);
                Err(err)
            }
        }
    }

    /// Drop the session material and give the interface back.
    pub async fn close(&mut self) -> Result<(), Error> {
        if self.session.take().is_some() {
            debug!("Session material dropped");
        }
        self.transport.release().await.map_err(l1::Error::from)?;
        info!("Device closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), Error> {
        match self.session {
            Some(_) => Ok(()),
            None => Err(Error::NotOpen),
        }
    }
}

async fn run_init<T: Transport>(
    transport: &mut T,
    session: &mut Session,
    config: &DriverConfig,
    manufacturer: &VerifyingKey,
    cancel: &CancelHandle,
) -> Result<(), Error> {
    let mut state = InitState::SendInit1;
    loop {
        if cancel.is_cancelled() {
            warn!("Init cancelled before {:?}", state);
            return Err(Error::Cancelled);
        }
        debug!("init: {:?}", state);

        match state {
            InitState::CheckInitialized => match init::check_rom_info(session.response.as_slice()) {
                RomInfo::NotProvisioned(byte) => {
                    error!(
                        "Sensor is not initialized, init byte is 0x{:02x} (should be 0x07 on initialized devices, 0x02 otherwise). \
                         The sensor has to be paired from a Windows installation, native or in a VirtualBox guest, first.",
                        byte
                    );
                    return Err(Error::NotInitialized(byte));
                }
                RomInfo::Provisioned | RomInfo::Unknown(_) => {}
            },
            InitState::InitKeys => {
                let flash = flash::parse(session.response.as_slice()).map_err(l2::Error::from)?;
                debug!(
                    "flash: {} blocks, {} skipped, {} of {} bytes",
                    flash.blocks.len(),
                    flash.skipped,
                    flash.consumed,
                    flash.declared_size
                );
                session
                    .keys
                    .install(&flash, config.seed.as_bytes(), manufacturer);
            }
            InitState::Handshake => Handshake::new().run().map_err(l3::Error::from)?,
            InitState::Done => return Ok(()),
            exchange => {
                if let Some(cmd) = exchange.command() {
                    exec_command(
                        transport,
                        config.init_sequence.payload(cmd),
                        &mut session.response,
                        config.usb_timeout,
                    )
                    .await?;
                }
            }
        }
        state = state.next();
    }
}

impl<T: Transport> FpDevice for Vfs0097<T> {
    type Error = Error;

    fn info(&self) -> &'static DriverInfo {
        &VFS0097_INFO
    }

    async fn open(&mut self) -> Result<(), Self::Error> {
        Vfs0097::open(self).await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        Vfs0097::close(self).await
    }

    async fn enroll(&mut self, template: Print) -> Result<Print, Self::Error> {
        self.ensure_open()?;
        Ok(template)
    }

    async fn verify(&mut self, _print: &Print) -> Result<(), Self::Error> {
        self.ensure_open()
    }

    async fn identify(&mut self, _gallery: &[Print]) -> Result<Option<Print>, Self::Error> {
        self.ensure_open()?;
        Ok(None)
    }

    async fn delete(&mut self, _print: &Print) -> Result<(), Self::Error> {
        self.ensure_open()
    }

    async fn list(&mut self) -> Result<Vec<Print>, Self::Error> {
        self.ensure_open()?;
        Ok(Vec::new())
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}
