//! Transport boundary between the SDK and a physical reader.

use std::fmt;

use bytes::Bytes;
use tracing::trace;

use crate::apdu::{CommandApdu, ResponseApdu};
use crate::error::{Result, TangemSdkError};

/// A reader able to exchange raw APDUs with a card.
///
/// Implementors report a vanished card as [`TangemSdkError::TagLost`].
pub trait CardReader: fmt::Debug + Send {
    /// Prepare the reader for a new session
    fn start_session(&mut self) -> Result<()>;

    /// Release the reader; `cancelled` is set when the user aborted the session
    fn stop_session(&mut self, cancelled: bool);

    /// Send a raw APDU command and get the raw response
    fn transceive_raw(&mut self, command: &[u8]) -> Result<Bytes>;

    /// Block until a card is present again after [`TangemSdkError::TagLost`]
    fn wait_for_tag(&mut self) -> Result<()> {
        Err(TangemSdkError::TagLost)
    }

    /// Send a framed command and parse the response frame
    fn transceive(&mut self, command: &CommandApdu) -> Result<ResponseApdu> {
        trace!("{:?}", command);
        let raw = self.transceive_raw(&command.to_bytes())?;
        let response = ResponseApdu::from_bytes(&raw)?;
        trace!("{:?}", response);
        Ok(response)
    }
}

#[cfg(test)]
pub(crate) use mock::MockReader;
