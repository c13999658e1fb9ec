pub mod apdu;
pub mod dispatcher;
pub mod encoders;
pub mod error;
pub mod reader;
pub mod session;
pub mod transport;
pub mod utils;
