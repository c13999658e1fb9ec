/// Digital Wallet Client - command-line client for the wallet smart card applet
///
/// This library provides the APDU codec, the per-command field encoders, the
/// card session and the command dispatcher behind the `wallet-client` binary.
pub mod cli;
pub mod core;

// Re-export commonly used types
pub use crate::core::{
    apdu::{ApduRequest, ApduResponse, CommandHeader, StatusWord},
    dispatcher::{CommandOutput, Dispatcher},
    error::{CommandError, TransportError},
    reader::{PcscTransport, ReaderInfo},
    session::{Session, SessionState},
    transport::{Channel, Transport},
};

// Common error type
pub type Result<T> = anyhow::Result<T>;
