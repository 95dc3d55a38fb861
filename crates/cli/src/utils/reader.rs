//! PC/SC reader backing a card session

use std::ffi::{CStr, CString};
use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use pcsc::{Card, Context, Disposition, Protocols, ReaderState, Scope, ShareMode, State};
use tangem_sdk::{CardReader, TangemSdkError};
use tracing::{debug, trace};

/// How long a session waits for the card to come back
const TAG_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Granularity of the presence polling
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Transport over a PC/SC reader
pub struct PcscReader {
    /// PC/SC context
    context: Context,
    /// Reader name
    reader_name: CString,
    /// Card connection, if established
    card: Option<Card>,
}

impl fmt::Debug for PcscReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PcscReader")
            .field("reader_name", &self.reader_name)
            .field("has_card", &self.card.is_some())
            .finish()
    }
}

impl PcscReader {
    pub const fn new(context: Context, reader_name: CString) -> Self {
        Self {
            context,
            reader_name,
            card: None,
        }
    }

    fn connect(&mut self) -> tangem_sdk::Result<()> {
        if self.card.is_none() {
            let card = self
                .context
                .connect(&self.reader_name, ShareMode::Shared, Protocols::ANY)
                .map_err(map_pcsc_error)?;
            debug!("Connected to card in {:?}", self.reader_name);
            self.card = Some(card);
        }
        Ok(())
    }

    fn disconnect(&mut self, disposition: Disposition) {
        if let Some(card) = self.card.take() {
            if let Err((_, e)) = card.disconnect(disposition) {
                debug!("Disconnect failed: {}", e);
            }
        }
    }
}

impl CardReader for PcscReader {
    fn start_session(&mut self) -> tangem_sdk::Result<()> {
        match self.connect() {
            Err(TangemSdkError::TagLost) => self.wait_for_tag(),
            other => other,
        }
    }

    fn stop_session(&mut self, cancelled: bool) {
        let disposition = if cancelled {
            Disposition::ResetCard
        } else {
            Disposition::LeaveCard
        };
        self.disconnect(disposition);
    }

    fn transceive_raw(&mut self, command: &[u8]) -> tangem_sdk::Result<Bytes> {
        self.connect()?;
        let card = self.card.as_mut().ok_or(TangemSdkError::TagLost)?;

        let mut buffer = vec![0u8; pcsc::MAX_BUFFER_SIZE_EXTENDED];
        let result = card
            .transmit(command, &mut buffer)
            .map(Bytes::copy_from_slice);

        match result {
            Ok(response) => {
                trace!("<< {}", hex::encode(&response));
                Ok(response)
            }
            Err(e) => {
                // The handle is useless once the card was reset or removed
                if matches!(e, pcsc::Error::ResetCard | pcsc::Error::RemovedCard) {
                    self.card = None;
                }
                Err(map_pcsc_error(e))
            }
        }
    }

    fn wait_for_tag(&mut self) -> tangem_sdk::Result<()> {
        self.disconnect(Disposition::LeaveCard);

        let deadline = Instant::now() + TAG_WAIT_TIMEOUT;
        let mut states = [ReaderState::new(self.reader_name.clone(), State::UNAWARE)];
        loop {
            match self.context.get_status_change(Some(POLL_INTERVAL), &mut states) {
                Ok(()) | Err(pcsc::Error::Timeout) => {}
                Err(e) => return Err(map_pcsc_error(e)),
            }

            if states[0].event_state().contains(State::PRESENT) {
                return self.connect();
            }
            if Instant::now() >= deadline {
                return Err(TangemSdkError::TagLost);
            }
            states[0].sync_current_state();
        }
    }
}

fn map_pcsc_error(error: pcsc::Error) -> TangemSdkError {
    match error {
        pcsc::Error::NoSmartcard
        | pcsc::Error::RemovedCard
        | pcsc::Error::ResetCard
        | pcsc::Error::UnpoweredCard
        | pcsc::Error::UnresponsiveCard => TangemSdkError::TagLost,
        other => TangemSdkError::Underlying(other.to_string()),
    }
}

/// Reader names with whether a card is present
fn reader_states(context: &Context) -> Result<Vec<(CString, bool)>, pcsc::Error> {
    let names = context.list_readers_owned()?;
    let mut states: Vec<ReaderState> = names
        .iter()
        .map(|name| ReaderState::new(name.as_c_str(), State::UNAWARE))
        .collect();
    if !states.is_empty() {
        context.get_status_change(None, &mut states)?;
    }

    Ok(names
        .into_iter()
        .zip(states.iter())
        .map(|(name, state)| (name, state.event_state().contains(State::PRESENT)))
        .collect())
}

/// List all available readers
pub fn list_readers() -> Result<(), Box<dyn std::error::Error>> {
    let context = Context::establish(Scope::User)?;
    let readers = reader_states(&context)?;

    if readers.is_empty() {
        println!("No readers found!");
        return Ok(());
    }

    println!("Available readers:");
    for (i, (name, has_card)) in readers.iter().enumerate() {
        let status = if *has_card { "card present" } else { "no card" };
        println!("{}. {} ({})", i + 1, name.to_string_lossy(), status);
    }

    Ok(())
}

/// Open the named reader, or the first one holding a card
pub fn open_reader(reader_name: Option<&str>) -> Result<PcscReader, Box<dyn std::error::Error>> {
    let context = Context::establish(Scope::User)?;
    let readers = reader_states(&context)?;

    if readers.is_empty() {
        return Err("No readers found!".into());
    }

    let name = match reader_name {
        Some(wanted) => readers
            .into_iter()
            .map(|(name, _)| name)
            .find(|name| name_matches(name, wanted))
            .ok_or_else(|| format!("Reader '{}' not found", wanted))?,
        None => readers
            .iter()
            .find(|(_, has_card)| *has_card)
            .or_else(|| readers.first())
            .map(|(name, _)| name.clone())
            .ok_or("No readers found!")?,
    };

    debug!("Using reader {:?}", name);
    Ok(PcscReader::new(context, name))
}

fn name_matches(name: &CStr, wanted: &str) -> bool {
    name.to_string_lossy() == wanted
}
