use crate::core::error::TransportError;

/// Something that can hand out a channel to the wallet card
#[cfg_attr(test, mockall::automock(type Channel = MockChannel;))]
pub trait Transport {
    type Channel: Channel;

    /// Open a fresh channel to the card
    fn connect(&mut self) -> Result<Self::Channel, TransportError>;
}

/// A half-duplex APDU exchange with one card
#[cfg_attr(test, mockall::automock)]
pub trait Channel {
    /// Send raw command bytes and return the raw response, status word included
    fn transmit(&mut self, apdu: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Release the card, optionally resetting it
    fn disconnect(&mut self, reset: bool) -> Result<(), TransportError>;
}
