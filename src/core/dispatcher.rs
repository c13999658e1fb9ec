use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

use crate::core::apdu::{ApduRequest, ApduResponse, CommandHeader, StatusWord};
use crate::core::encoders::{
    decode_balance, decode_flag, decode_log, decode_personal_record, decode_pin_status,
    encode_age_date, encode_amount, encode_personal_record, encode_pin, encode_unlock,
    CurrencyAmount, PersonalRecord, PinSlot, PinState, TransactionLogEntry,
};
use crate::core::error::CommandError;
use crate::core::session::Session;
use crate::core::transport::Transport;

/// Class byte of every wallet command
pub const CLA: u8 = 0x00;

const fn wallet_header(ins: u8) -> CommandHeader {
    CommandHeader::new(CLA, ins, 0x00, 0x00)
}

pub const VERIFY: CommandHeader = wallet_header(0x20);
pub const CHANGE: CommandHeader = wallet_header(0x21);
pub const STATUS: CommandHeader = wallet_header(0x22);
pub const AGE18: CommandHeader = wallet_header(0x23);
pub const UNLOCK: CommandHeader = wallet_header(0x24);
pub const BALANCE: CommandHeader = wallet_header(0x25);
pub const CREDIT: CommandHeader = wallet_header(0x26);
pub const DEBIT: CommandHeader = wallet_header(0x27);
pub const LOG: CommandHeader = wallet_header(0x28);
pub const READ: CommandHeader = wallet_header(0xB6);
pub const MODIFY: CommandHeader = wallet_header(0xD6);

/// Builds the request from the header and already count-checked arguments
type Encoder = fn(CommandHeader, &[&str], NaiveDate) -> Result<ApduRequest, CommandError>;

/// Interprets the payload of a `90 00` response
type Decoder = fn(&[u8]) -> Result<CommandOutput, CommandError>;

/// What a command does once its arguments are accepted
pub enum Action {
    Help,
    History,
    Exit,
    Card {
        header: CommandHeader,
        encode: Encoder,
        decode: Decoder,
        /// keeps PINs and PUKs out of the logs
        sensitive: bool,
    },
}

/// One row of the command table
pub struct CommandSpec {
    pub name: &'static str,
    pub usage: &'static str,
    pub min_args: usize,
    pub max_args: usize,
    pub action: Action,
}

impl CommandSpec {
    pub fn accepts(&self, arg_count: usize) -> bool {
        (self.min_args..=self.max_args).contains(&arg_count)
    }
}

const fn card(
    name: &'static str,
    usage: &'static str,
    args: (usize, usize),
    header: CommandHeader,
    encode: Encoder,
    decode: Decoder,
    sensitive: bool,
) -> CommandSpec {
    CommandSpec {
        name,
        usage,
        min_args: args.0,
        max_args: args.1,
        action: Action::Card {
            header,
            encode,
            decode,
            sensitive,
        },
    }
}

/// Every command the client understands, in the order `help` lists them
pub static COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "help",
        usage: "help",
        min_args: 0,
        max_args: 0,
        action: Action::Help,
    },
    card(
        "verify",
        "verify {pin number 1-3} {pin code}",
        (2, 2),
        VERIFY,
        encode_pin_command,
        status_only,
        true,
    ),
    card(
        "change",
        "change {pin number 1-3} {new pin code}",
        (2, 2),
        CHANGE,
        encode_pin_command,
        status_only,
        true,
    ),
    card("status", "status", (0, 0), STATUS, no_data, pin_status, false),
    card(
        "age18",
        "age18 [comparing date in format ddMMyyyy]",
        (0, 1),
        AGE18,
        encode_age,
        age_flag,
        false,
    ),
    card(
        "unlock",
        "unlock {puk} {new pin code}",
        (2, 2),
        UNLOCK,
        encode_unlock_command,
        status_only,
        true,
    ),
    card("balance", "balance", (0, 0), BALANCE, no_data, balance, false),
    card(
        "credit",
        "credit {number with format {65535-0}[.0-99]}",
        (1, 1),
        CREDIT,
        encode_amount_command,
        status_only,
        false,
    ),
    card(
        "debit",
        "debit {number with format {65535-0}[.0-99]}",
        (1, 1),
        DEBIT,
        encode_amount_command,
        status_only,
        false,
    ),
    card("log", "log", (0, 0), LOG, no_data, transaction_log, false),
    card("read", "read", (0, 0), READ, no_data, personal_record, false),
    card(
        "modify",
        "modify {first name} {last name} {birthdate date in format ddMMyyyy}",
        (3, 3),
        MODIFY,
        encode_modify,
        status_only,
        false,
    ),
    CommandSpec {
        name: "history",
        usage: "history",
        min_args: 0,
        max_args: 0,
        action: Action::History,
    },
    CommandSpec {
        name: "exit",
        usage: "exit",
        min_args: 0,
        max_args: 0,
        action: Action::Exit,
    },
];

pub fn find_command(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name.eq_ignore_ascii_case(name))
}

fn no_data(
    header: CommandHeader,
    _args: &[&str],
    _today: NaiveDate,
) -> Result<ApduRequest, CommandError> {
    Ok(ApduRequest::header_only(header))
}

fn encode_pin_command(
    header: CommandHeader,
    args: &[&str],
    _today: NaiveDate,
) -> Result<ApduRequest, CommandError> {
    let slot = PinSlot::parse(args[0])?;
    Ok(ApduRequest::new(header.with_p2(slot.selector()), encode_pin(args[1])?))
}

fn encode_age(
    header: CommandHeader,
    args: &[&str],
    today: NaiveDate,
) -> Result<ApduRequest, CommandError> {
    Ok(ApduRequest::new(header, encode_age_date(args.first().copied(), today)?))
}

fn encode_unlock_command(
    header: CommandHeader,
    args: &[&str],
    _today: NaiveDate,
) -> Result<ApduRequest, CommandError> {
    Ok(ApduRequest::new(header, encode_unlock(args[0], args[1])?))
}

fn encode_amount_command(
    header: CommandHeader,
    args: &[&str],
    _today: NaiveDate,
) -> Result<ApduRequest, CommandError> {
    Ok(ApduRequest::new(header, encode_amount(args[0])?))
}

fn encode_modify(
    header: CommandHeader,
    args: &[&str],
    _today: NaiveDate,
) -> Result<ApduRequest, CommandError> {
    let data = encode_personal_record(args[0], args[1], args[2])?;
    Ok(ApduRequest::new(header, data))
}

fn status_only(_payload: &[u8]) -> Result<CommandOutput, CommandError> {
    Ok(CommandOutput::Done)
}

fn pin_status(payload: &[u8]) -> Result<CommandOutput, CommandError> {
    decode_pin_status(payload).map(CommandOutput::PinStatus)
}

fn age_flag(payload: &[u8]) -> Result<CommandOutput, CommandError> {
    decode_flag(payload).map(CommandOutput::Age18)
}

fn balance(payload: &[u8]) -> Result<CommandOutput, CommandError> {
    decode_balance(payload).map(CommandOutput::Balance)
}

fn transaction_log(payload: &[u8]) -> Result<CommandOutput, CommandError> {
    decode_log(payload).map(CommandOutput::Log)
}

fn personal_record(payload: &[u8]) -> Result<CommandOutput, CommandError> {
    decode_personal_record(payload).map(CommandOutput::PersonalRecord)
}

/// A dispatched card command, kept for the `history` command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub command: String,
    pub status: Option<StatusWord>,
    pub success: bool,
    pub duration_ms: u64,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match self.status {
            Some(sw) => sw.to_string(),
            None => "-----".to_string(),
        };
        let outcome = if self.success { "OK" } else { "ERROR" };
        write!(
            f,
            "{} {:<8} {} - {} ({}ms)",
            self.timestamp.format("%H:%M:%S"),
            self.command,
            status,
            outcome,
            self.duration_ms
        )
    }
}

/// Result of a successfully dispatched command
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum CommandOutput {
    Done,
    Help(Vec<&'static str>),
    PinStatus(Vec<PinState>),
    Age18(bool),
    Balance(CurrencyAmount),
    Log(Vec<TransactionLogEntry>),
    PersonalRecord(PersonalRecord),
    History(Vec<HistoryEntry>),
    Exit,
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Done => write!(f, "OK"),
            CommandOutput::Help(usages) => {
                write!(f, "The following commands are available:")?;
                for usage in usages {
                    write!(f, "\n  {usage}")?;
                }
                Ok(())
            }
            CommandOutput::PinStatus(states) => {
                let lines: Vec<String> = states
                    .iter()
                    .enumerate()
                    .map(|(i, state)| format!("PIN{}: {state}", i + 1))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            CommandOutput::Age18(true) => write!(f, "True"),
            CommandOutput::Age18(false) => write!(f, "False"),
            CommandOutput::Balance(amount) => write!(f, "{amount}"),
            CommandOutput::Log(entries) if entries.is_empty() => write!(f, "No transactions"),
            CommandOutput::Log(entries) => {
                let lines: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
                write!(f, "{}", lines.join("\n"))
            }
            CommandOutput::PersonalRecord(record) => write!(f, "{record}"),
            CommandOutput::History(entries) if entries.is_empty() => {
                write!(f, "No commands in history")
            }
            CommandOutput::History(entries) => {
                write!(f, "Command history:")?;
                for (i, entry) in entries.iter().enumerate() {
                    write!(f, "\n  [{}] {entry}", i + 1)?;
                }
                Ok(())
            }
            CommandOutput::Exit => write!(f, "Goodbye!"),
        }
    }
}

/// Runs named commands against a session, one round trip at a time
#[derive(Debug, Default)]
pub struct Dispatcher {
    history: Vec<HistoryEntry>,
    today: Option<NaiveDate>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed date instead of the clock for `age18` without argument
    pub fn with_date(today: NaiveDate) -> Self {
        Self {
            history: Vec::new(),
            today: Some(today),
        }
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Look up `name`, check and encode `args`, and run the round trip.
    ///
    /// Argument problems are reported before anything is sent. The decoder
    /// only runs on a `90 00` response.
    pub fn dispatch<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        name: &str,
        args: &[&str],
    ) -> Result<CommandOutput, CommandError> {
        let spec =
            find_command(name).ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;
        if !spec.accepts(args.len()) {
            return Err(CommandError::ArgumentCount { usage: spec.usage });
        }

        match &spec.action {
            Action::Help => Ok(CommandOutput::Help(
                COMMANDS.iter().map(|spec| spec.usage).collect(),
            )),
            Action::History => Ok(CommandOutput::History(self.history.clone())),
            Action::Exit => {
                session.close();
                Ok(CommandOutput::Exit)
            }
            Action::Card {
                header,
                encode,
                decode,
                sensitive,
            } => {
                let request = encode(*header, args, self.today()).map_err(|e| {
                    CommandError::InvalidInput {
                        usage: spec.usage,
                        source: Box::new(e),
                    }
                })?;

                let timestamp = Utc::now();
                let start_time = Instant::now();
                let result = session.transmit(&request, *sensitive);
                self.record(spec.name, timestamp, start_time.elapsed(), &result);

                let response = result?;
                if !response.is_success() {
                    log::warn!("{} rejected with {}", spec.name, response.status);
                    return Err(CommandError::AppletRejected(response.status));
                }
                decode(&response.payload)
            }
        }
    }

    fn record(
        &mut self,
        command: &str,
        timestamp: DateTime<Utc>,
        duration: Duration,
        result: &Result<ApduResponse, CommandError>,
    ) {
        let status = result.as_ref().ok().map(|response| response.status);
        self.history.push(HistoryEntry {
            timestamp,
            command: command.to_string(),
            status,
            success: status.is_some_and(StatusWord::is_success),
            duration_ms: duration.as_millis() as u64,
        });
    }
}
