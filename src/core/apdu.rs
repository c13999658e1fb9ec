use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::CommandError;
use crate::core::utils::describe_status_word;

/// Longest data field a short APDU can carry
pub const MAX_DATA_LEN: usize = 255;

/// CLA/INS/P1/P2 of one applet operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

impl CommandHeader {
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self { cla, ins, p1, p2 }
    }

    /// Same header with a different P2 (used for PIN slot selectors)
    pub const fn with_p2(self, p2: u8) -> Self {
        Self { p2, ..self }
    }
}

/// A command ready to be framed and sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduRequest {
    pub header: CommandHeader,
    pub data: Vec<u8>,
}

impl ApduRequest {
    pub fn new(header: CommandHeader, data: Vec<u8>) -> Self {
        Self { header, data }
    }

    /// Request without a data field
    pub fn header_only(header: CommandHeader) -> Self {
        Self::new(header, Vec::new())
    }

    /// Frame the request as `CLA INS P1 P2 [Lc DATA...]`.
    ///
    /// No Lc byte is sent when there is no data.
    pub fn encode(&self) -> Result<Vec<u8>, CommandError> {
        let h = &self.header;
        let mut bytes = vec![h.cla, h.ins, h.p1, h.p2];

        match self.data.len() {
            0 => {}
            len @ 1..=MAX_DATA_LEN => {
                bytes.push(len as u8);
                bytes.extend_from_slice(&self.data);
            }
            len => {
                return Err(CommandError::FieldTooLong {
                    field: "APDU data",
                    len,
                    max: MAX_DATA_LEN,
                })
            }
        }

        Ok(bytes)
    }
}

/// The 2-byte status word closing every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusWord(pub u16);

impl StatusWord {
    pub const SUCCESS: StatusWord = StatusWord(0x9000);

    pub const fn new(sw: u16) -> Self {
        Self(sw)
    }

    pub const fn from_bytes(sw1: u8, sw2: u8) -> Self {
        Self(u16::from_be_bytes([sw1, sw2]))
    }

    pub const fn sw1(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn sw2(self) -> u8 {
        self.0 as u8
    }

    pub const fn is_success(self) -> bool {
        self.0 == Self::SUCCESS.0
    }

    /// Human readable meaning of the status word
    pub fn description(self) -> String {
        describe_status_word(self.sw1(), self.sw2())
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X}", self.sw1(), self.sw2())
    }
}

/// Payload and status word of a card response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    pub payload: Vec<u8>,
    pub status: StatusWord,
}

impl ApduResponse {
    /// Split raw response bytes into payload and trailing status word
    pub fn decode(bytes: &[u8]) -> Result<Self, CommandError> {
        if bytes.len() < 2 {
            return Err(CommandError::MalformedResponse(format!(
                "response has {} bytes, a status word needs 2",
                bytes.len()
            )));
        }

        let (payload, sw) = bytes.split_at(bytes.len() - 2);
        Ok(Self {
            payload: payload.to_vec(),
            status: StatusWord::from_bytes(sw[0], sw[1]),
        })
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
