use std::fmt;

use crate::core::apdu::{ApduRequest, ApduResponse, CommandHeader};
use crate::core::error::{CommandError, TransportError};
use crate::core::transport::{Channel, Transport};
use crate::core::utils::format_hex;

/// AID of the wallet applet
pub const WALLET_AID: [u8; 8] = [0xAB, 0xCD, 0xEF, 0xFE, 0xDC, 0x12, 0x34, 0x56];

/// SELECT by AID
pub const SELECT_APPLET: CommandHeader = CommandHeader::new(0x00, 0xA4, 0x04, 0x00);

/// Lifecycle of the connection to the card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AppletSelecting,
    Ready,
    Failed,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AppletSelecting => "selecting applet",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Owns the card channel and tracks whether the wallet applet is selected.
///
/// Card commands are only accepted in [`SessionState::Ready`].
pub struct Session<T: Transport> {
    transport: T,
    channel: Option<T::Channel>,
    state: SessionState,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            channel: None,
            state: SessionState::Disconnected,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    /// Connect and select the wallet applet.
    ///
    /// Any failure leaves the session in [`SessionState::Failed`] with the
    /// channel released, from where `open` may be called again.
    pub fn open(&mut self) -> Result<(), CommandError> {
        match self.state {
            SessionState::Disconnected | SessionState::Failed => {}
            SessionState::Ready => return Ok(()),
            state => return Err(CommandError::NotReady(state)),
        }

        self.state = SessionState::Connecting;
        log::info!("Connecting to card");
        let channel = match self.transport.connect() {
            Ok(channel) => channel,
            Err(e) => {
                log::error!("Failed to connect to card: {e}");
                self.state = SessionState::Failed;
                return Err(e.into());
            }
        };
        self.channel = Some(channel);

        self.state = SessionState::AppletSelecting;
        match self.select_applet() {
            Ok(()) => {
                self.state = SessionState::Ready;
                log::info!("Wallet applet selected");
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to select wallet applet: {e}");
                self.release(false);
                self.state = SessionState::Failed;
                Err(e)
            }
        }
    }

    /// Keep calling [`open`](Self::open) while `retry` says so.
    ///
    /// Returns false, with the session closed, when the user gives up.
    pub fn open_with_retry<F>(&mut self, mut retry: F) -> bool
    where
        F: FnMut(&CommandError) -> bool,
    {
        loop {
            match self.open() {
                Ok(()) => return true,
                Err(e) => {
                    if !retry(&e) {
                        self.close();
                        return false;
                    }
                }
            }
        }
    }

    fn select_applet(&mut self) -> Result<(), CommandError> {
        let request = ApduRequest::new(SELECT_APPLET, WALLET_AID.to_vec());
        let response = self.exchange(&request, false)?;
        if !response.is_success() {
            return Err(CommandError::AppletRejected(response.status));
        }
        Ok(())
    }

    /// Send one command to the selected applet.
    ///
    /// `sensitive` keeps the data field out of the logs. A transport failure
    /// here ends the session.
    pub fn transmit(
        &mut self,
        request: &ApduRequest,
        sensitive: bool,
    ) -> Result<ApduResponse, CommandError> {
        if !self.is_ready() {
            return Err(CommandError::NotReady(self.state));
        }

        let result = self.exchange(request, sensitive);
        if let Err(CommandError::Transport(e)) = &result {
            log::error!("Card channel lost: {e}");
            self.release(false);
            self.state = SessionState::Failed;
        }
        result
    }

    fn exchange(
        &mut self,
        request: &ApduRequest,
        sensitive: bool,
    ) -> Result<ApduResponse, CommandError> {
        let bytes = request.encode()?;
        let channel = self.channel.as_mut().ok_or(TransportError::NotConnected)?;

        if sensitive {
            log::debug!(
                ">> {} [{} data bytes hidden]",
                format_hex(&bytes[..4]),
                request.data.len()
            );
        } else {
            log::debug!(">> {}", format_hex(&bytes));
        }

        let raw = channel.transmit(&bytes)?;
        let response = ApduResponse::decode(&raw)?;
        log::debug!(
            "<< {} SW={}",
            format_hex(&response.payload),
            response.status
        );
        Ok(response)
    }

    fn release(&mut self, reset: bool) {
        if let Some(mut channel) = self.channel.take() {
            if let Err(e) = channel.disconnect(reset) {
                log::warn!("Failed to disconnect cleanly from card: {e}");
            }
        }
    }

    /// Release the channel; never fails
    pub fn close(&mut self) {
        self.release(false);
        self.state = SessionState::Closed;
        log::info!("Session closed");
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        self.release(false);
    }
}
