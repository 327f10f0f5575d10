use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    ClientHello,
    GenerateCertificate,
    ClientFinished,
    Done,
}

impl HandshakeState {
    pub fn next(self) -> Option<Self> {
        match self {
            Self::ClientHello => Some(Self::GenerateCertificate),
            Self::GenerateCertificate => Some(Self::ClientFinished),
            Self::ClientFinished => Some(Self::Done),
            Self::Done => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A finished handshake was stepped again
    UnexpectedState(HandshakeState),
}

#[cfg(feature = "display")]
impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnexpectedState(state) => {
                f.write_fmt(format_args!("handshake: unexpected state {:?}", state))
            }
        }
    }
}

/// TLS-like session setup with the sensor.
///
/// The stages only advance for now, no message is exchanged yet.
#[derive(Debug)]
pub struct Handshake {
    state: HandshakeState,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    pub fn new() -> Self {
        Self {
            state: HandshakeState::ClientHello,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_done(&self) -> bool {
        self.state == HandshakeState::Done
    }

    /// Advance one stage and return the new state.
    pub fn step(&mut self) -> Result<HandshakeState, Error> {
        let next = self.state.next().ok_or(Error::UnexpectedState(self.state))?;
        debug!("handshake: {:?} -> {:?}", self.state, next);
        self.state = next;
        Ok(next)
    }

    pub fn run(&mut self) -> Result<(), Error> {
        while !self.is_done() {
            self.step()?;
        }
        Ok(())
    }
}
