use thiserror::Error;

use crate::core::apdu::StatusWord;
use crate::core::session::SessionState;

/// Failures of the reader or the card channel
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No PCSC readers found")]
    NoReaders,

    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    #[error("Invalid reader name: {0}")]
    InvalidReaderName(String),

    #[error("Card channel is not connected")]
    NotConnected,

    #[error("PCSC error: {0}")]
    Pcsc(#[from] pcsc::Error),
}

/// Everything that can go wrong while running a wallet command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("Applet rejected the command: {0} ({})", .0.description())]
    AppletRejected(StatusWord),

    #[error("Wrong number of arguments (format is '{usage}')")]
    ArgumentCount { usage: &'static str },

    #[error("Pin number must be between 1-3, got '{0}'")]
    InvalidSlot(String),

    #[error("Invalid date '{0}', expected format ddMMyyyy")]
    InvalidDate(String),

    #[error("Invalid amount '{0}', expected format {{0-65535}}[.0-99]")]
    InvalidAmount(String),

    #[error("{field} is too long: {len} bytes, at most {max} allowed")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("{field} must be ASCII")]
    Encoding { field: &'static str },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("{source} (format is '{usage}')")]
    InvalidInput {
        usage: &'static str,
        source: Box<CommandError>,
    },

    #[error("Unknown command: {0}. Type 'help' for more information.")]
    UnknownCommand(String),

    #[error("Session is not ready (state: {0})")]
    NotReady(SessionState),
}

impl CommandError {
    /// Whether the shell can keep going after this error
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CommandError::Transport(_))
    }

    /// The error behind the usage hint, if any
    pub fn root(&self) -> &CommandError {
        match self {
            CommandError::InvalidInput { source, .. } => source.as_ref(),
            other => other,
        }
    }
}
