use pcsc::{Card, Context, Disposition, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};
use serde::{Deserialize, Serialize};
use std::ffi::CString;

use crate::core::error::TransportError;
use crate::core::transport::{Channel, Transport};

/// Information about a PCSC reader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderInfo {
    pub name: String,
    pub card_present: bool,
    pub atr: Option<Vec<u8>>,
}

/// Connects to the wallet card through the PCSC service
#[derive(Debug, Clone)]
pub struct PcscTransport {
    reader: Option<String>,
    share_mode: ShareMode,
    protocols: Protocols,
}

impl PcscTransport {
    /// `reader` is a reader name or an index into the reader list; the
    /// first reader is used when it is `None`.
    pub fn new(reader: Option<String>, share_mode: ShareMode, protocols: Protocols) -> Self {
        Self {
            reader,
            share_mode,
            protocols,
        }
    }

    /// List all available readers
    pub fn list_readers() -> Result<Vec<ReaderInfo>, TransportError> {
        let context = Context::establish(Scope::User)?;

        Ok(reader_names(&context)?
            .into_iter()
            .map(|name| {
                let (card_present, atr) = reader_status(&context, &name);
                ReaderInfo {
                    name,
                    card_present,
                    atr,
                }
            })
            .collect())
    }
}

fn reader_names(context: &Context) -> Result<Vec<String>, TransportError> {
    let mut readers_buf = vec![0; 2048];
    match context.list_readers(&mut readers_buf) {
        Ok(readers) => Ok(readers
            .map(|name| name.to_string_lossy().to_string())
            .collect()),
        Err(pcsc::Error::NoReadersAvailable) => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

// Connect briefly to see whether a card is in the reader
fn reader_status(context: &Context, reader_name: &str) -> (bool, Option<Vec<u8>>) {
    let Ok(reader_cstr) = CString::new(reader_name) else {
        return (false, None);
    };

    match context.connect(&reader_cstr, ShareMode::Shared, Protocols::ANY) {
        Ok(card) => match card.status2_owned() {
            Ok(status) => (true, Some(status.atr().to_vec())),
            Err(_) => (true, None),
        },
        Err(_) => (false, None),
    }
}

/// Pick a reader by index or exact name, defaulting to the first one
pub fn select_reader(names: &[String], selector: Option<&str>) -> Result<String, TransportError> {
    let Some(selector) = selector else {
        return names.first().cloned().ok_or(TransportError::NoReaders);
    };

    if let Ok(index) = selector.parse::<usize>() {
        return names
            .get(index)
            .cloned()
            .ok_or_else(|| TransportError::ReaderNotFound(format!("index {index}")));
    }

    names
        .iter()
        .find(|name| name.as_str() == selector)
        .cloned()
        .ok_or_else(|| TransportError::ReaderNotFound(selector.to_string()))
}

impl Transport for PcscTransport {
    type Channel = PcscChannel;

    fn connect(&mut self) -> Result<PcscChannel, TransportError> {
        let context = Context::establish(Scope::User)?;
        let names = reader_names(&context)?;
        let reader = select_reader(&names, self.reader.as_deref())?;

        log::info!("Connecting to reader: {}", reader);
        let reader_cstr = CString::new(reader.as_str())
            .map_err(|_| TransportError::InvalidReaderName(reader.clone()))?;
        let card = context.connect(&reader_cstr, self.share_mode, self.protocols)?;
        log::info!("Successfully connected to reader: {}", reader);

        Ok(PcscChannel {
            card: Some(card),
            reader,
        })
    }
}

/// An open connection to the card in one reader
pub struct PcscChannel {
    card: Option<Card>,
    reader: String,
}

impl PcscChannel {
    pub fn reader(&self) -> &str {
        &self.reader
    }
}

impl Channel for PcscChannel {
    fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError> {
        let card = self.card.as_ref().ok_or(TransportError::NotConnected)?;
        let mut response_buf = [0; MAX_BUFFER_SIZE];
        let response = card.transmit(apdu, &mut response_buf)?;
        Ok(response.to_vec())
    }

    fn disconnect(&mut self, reset: bool) -> Result<(), TransportError> {
        if let Some(card) = self.card.take() {
            let disposition = if reset {
                Disposition::ResetCard
            } else {
                Disposition::LeaveCard
            };
            card.disconnect(disposition).map_err(|(_card, e)| e)?;
            log::info!("Disconnected from reader: {}", self.reader);
        }
        Ok(())
    }
}
