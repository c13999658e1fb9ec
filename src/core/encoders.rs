//! Byte layouts of the wallet applet commands.
//!
//! Every command has an encode step turning shell arguments into the data
//! field and, where the applet answers with data, a decode step turning the
//! payload into a typed value. Decoders are only ever handed payloads that
//! came with a `90 00` status word.
//!
//! Fixed-layout answers (flag, PIN status, balance, personal record) must
//! have exactly their layout's length. The transaction log is the exception:
//! it is scanned record by record and bytes past the last slot are ignored.
//!
//! The fractional byte of every amount is packed BCD: `0x32` is 32 cents.

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::core::error::CommandError;

/// Separator and terminator of variable-length fields
pub const DELIMITER: u8 = 0xFF;

/// `ddMMyyyy`, the only date format the applet understands
pub const DATE_FORMAT: &str = "%d%m%Y";

pub const PUK_LEN: usize = 8;
pub const UNLOCK_PIN_LEN: usize = 4;
pub const UNLOCK_DATA_LEN: usize = PUK_LEN + 1 + UNLOCK_PIN_LEN;

pub const MAX_AMOUNT_UNITS: u32 = u16::MAX as u32;
pub const MAX_CENTS: u8 = 99;

/// The card keeps a fixed number of log records
pub const MAX_LOG_ENTRIES: usize = 9;
pub const LOG_RECORD_LEN: usize = 4;

pub const FIRST_NAME_LEN: usize = 30;
pub const LAST_NAME_LEN: usize = 30;
pub const BIRTH_DATE_LEN: usize = 8;
pub const PERSONAL_RECORD_LEN: usize = FIRST_NAME_LEN + LAST_NAME_LEN + BIRTH_DATE_LEN;

const PIN_SLOTS: u8 = 3;
const PIN_STATUS_LEN: usize = PIN_SLOTS as usize;
const BALANCE_LEN: usize = 5;

/// One of the three PINs on the card, numbered 1-3 for humans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinSlot(u8);

impl PinSlot {
    /// Only the literal numbers `1`, `2` and `3` name a slot
    pub fn parse(s: &str) -> Result<Self, CommandError> {
        match s {
            "1" => Ok(Self(1)),
            "2" => Ok(Self(2)),
            "3" => Ok(Self(3)),
            _ => Err(CommandError::InvalidSlot(s.to_string())),
        }
    }

    pub const fn number(self) -> u8 {
        self.0
    }

    /// 0-based selector sent in P2
    pub const fn selector(self) -> u8 {
        self.0 - 1
    }

    pub fn from_selector(selector: u8) -> Option<Self> {
        (selector < PIN_SLOTS).then_some(Self(selector + 1))
    }
}

fn ascii_bytes(field: &'static str, value: &str) -> Result<Vec<u8>, CommandError> {
    if !value.is_ascii() {
        return Err(CommandError::Encoding { field });
    }
    Ok(value.as_bytes().to_vec())
}

fn expect_len(what: &str, payload: &[u8], len: usize) -> Result<(), CommandError> {
    if payload.len() != len {
        return Err(CommandError::MalformedResponse(format!(
            "{what} must be {len} bytes, got {}",
            payload.len()
        )));
    }
    Ok(())
}

fn check_len(field: &'static str, bytes: &[u8], max: usize) -> Result<(), CommandError> {
    if bytes.len() > max {
        return Err(CommandError::FieldTooLong {
            field,
            len: bytes.len(),
            max,
        });
    }
    Ok(())
}

/// PIN codes go on the wire as raw ASCII, without padding
pub fn encode_pin(code: &str) -> Result<Vec<u8>, CommandError> {
    ascii_bytes("PIN", code)
}

/// Whether a PIN was changed from its factory value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PinState {
    Changed,
    NotChanged,
}

impl fmt::Display for PinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinState::Changed => write!(f, "Changed"),
            PinState::NotChanged => write!(f, "Not Changed"),
        }
    }
}

pub fn decode_pin_status(payload: &[u8]) -> Result<Vec<PinState>, CommandError> {
    expect_len("PIN status", payload, PIN_STATUS_LEN)?;

    Ok(payload
        .iter()
        .map(|&b| {
            if b == 0x01 {
                PinState::Changed
            } else {
                PinState::NotChanged
            }
        })
        .collect())
}

/// Parse a `ddMMyyyy` date, rejecting anything that is not exactly 8 digits
pub fn parse_date(s: &str) -> Result<NaiveDate, CommandError> {
    if s.len() != BIRTH_DATE_LEN || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CommandError::InvalidDate(s.to_string()));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|_| CommandError::InvalidDate(s.to_string()))
}

/// Date for the age check; falls back to `today` when none is given
pub fn encode_age_date(date: Option<&str>, today: NaiveDate) -> Result<Vec<u8>, CommandError> {
    match date {
        Some(s) => {
            parse_date(s)?;
            Ok(s.as_bytes().to_vec())
        }
        None => Ok(today.format(DATE_FORMAT).to_string().into_bytes()),
    }
}

/// Single byte answer, `0x01` meaning true
pub fn decode_flag(payload: &[u8]) -> Result<bool, CommandError> {
    expect_len("boolean response", payload, 1)?;
    Ok(payload[0] == 0x01)
}

/// `PUK (8, zero padded) | 0xFF | new PIN (4, zero padded)`
pub fn encode_unlock(puk: &str, new_pin: &str) -> Result<Vec<u8>, CommandError> {
    let puk = ascii_bytes("PUK", puk)?;
    let pin = ascii_bytes("PIN", new_pin)?;
    check_len("PUK", &puk, PUK_LEN)?;
    check_len("PIN", &pin, UNLOCK_PIN_LEN)?;

    let mut data = vec![0u8; UNLOCK_DATA_LEN];
    data[..puk.len()].copy_from_slice(&puk);
    data[PUK_LEN] = DELIMITER;
    data[PUK_LEN + 1..PUK_LEN + 1 + pin.len()].copy_from_slice(&pin);
    Ok(data)
}

/// Amount of money with two fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyAmount {
    pub units: u32,
    pub cents: u8,
}

impl CurrencyAmount {
    pub fn new(units: u32, cents: u8) -> Result<Self, CommandError> {
        if cents > MAX_CENTS {
            return Err(CommandError::ValueOutOfRange(format!(
                "fractional part {cents} exceeds {MAX_CENTS}"
            )));
        }
        Ok(Self { units, cents })
    }

    /// Parse `{0-65535}[.0-99]`.
    ///
    /// The fraction is decimal, so `5.5` is five units and fifty cents.
    pub fn parse(s: &str) -> Result<Self, CommandError> {
        let invalid = || CommandError::InvalidAmount(s.to_string());
        let is_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());

        let (int_part, frac_part) = match s.split_once('.') {
            Some((int_part, frac_part)) => (int_part, Some(frac_part)),
            None => (s, None),
        };
        if !is_digits(int_part) || !frac_part.map_or(true, is_digits) {
            return Err(invalid());
        }

        // all digits, so parsing can only fail on overflow
        let units = int_part
            .parse::<u64>()
            .ok()
            .filter(|&units| units <= u64::from(MAX_AMOUNT_UNITS))
            .ok_or_else(|| {
                CommandError::ValueOutOfRange(format!(
                    "integer part {int_part} exceeds {MAX_AMOUNT_UNITS}"
                ))
            })? as u32;

        let cents = match frac_part {
            None => 0,
            Some(f) if f.len() == 1 => (f.as_bytes()[0] - b'0') * 10,
            Some(f) if f.len() == 2 => f.parse::<u8>().map_err(|_| invalid())?,
            Some(f) => {
                return Err(CommandError::ValueOutOfRange(format!(
                    "fractional part {f} exceeds {MAX_CENTS}"
                )))
            }
        };

        Self::new(units, cents)
    }

    /// Two decimal digits packed into one byte, `32` becoming `0x32`
    pub const fn cents_bcd(self) -> u8 {
        ((self.cents / 10) << 4) | (self.cents % 10)
    }

    /// Units plus a BCD cents byte read from the card
    pub fn from_card(units: u32, cents_bcd: u8) -> Result<Self, CommandError> {
        let (tens, ones) = (cents_bcd >> 4, cents_bcd & 0x0F);
        if tens > 9 || ones > 9 {
            return Err(CommandError::MalformedResponse(format!(
                "cents byte 0x{cents_bcd:02X} is not two BCD digits"
            )));
        }
        Self::new(units, tens * 10 + ones)
    }

    /// Credit/debit layout: 2-byte big-endian units, then BCD cents
    pub fn to_transfer_bytes(self) -> Result<[u8; 3], CommandError> {
        let units = u16::try_from(self.units).map_err(|_| {
            CommandError::ValueOutOfRange(format!(
                "integer part {} exceeds {MAX_AMOUNT_UNITS}",
                self.units
            ))
        })?;
        let [hi, lo] = units.to_be_bytes();
        Ok([hi, lo, self.cents_bcd()])
    }

    pub fn from_transfer_bytes(bytes: [u8; 3]) -> Result<Self, CommandError> {
        let units = u16::from_be_bytes([bytes[0], bytes[1]]);
        Self::from_card(u32::from(units), bytes[2])
    }
}

impl fmt::Display for CurrencyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.units, self.cents)
    }
}

impl Serialize for CurrencyAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn encode_amount(s: &str) -> Result<Vec<u8>, CommandError> {
    Ok(CurrencyAmount::parse(s)?.to_transfer_bytes()?.to_vec())
}

/// Balance layout: 4-byte big-endian units, then BCD cents
pub fn decode_balance(payload: &[u8]) -> Result<CurrencyAmount, CommandError> {
    expect_len("balance", payload, BALANCE_LEN)?;

    let units = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    CurrencyAmount::from_card(units, payload[4])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransactionLogEntry {
    pub kind: TransactionKind,
    pub amount: CurrencyAmount,
}

impl fmt::Display for TransactionLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = match self.kind {
            TransactionKind::Credit => '+',
            TransactionKind::Debit => '-',
        };
        write!(f, "{sign} {}", self.amount)
    }
}

/// Scan at most [`MAX_LOG_ENTRIES`] 4-byte records: kind, units (BE), cents.
///
/// Records whose kind byte is zero are empty slots and are skipped.
pub fn decode_log(payload: &[u8]) -> Result<Vec<TransactionLogEntry>, CommandError> {
    let mut entries = Vec::new();

    for (slot, record) in payload
        .chunks(LOG_RECORD_LEN)
        .take(MAX_LOG_ENTRIES)
        .enumerate()
    {
        let record: [u8; LOG_RECORD_LEN] = record.try_into().map_err(|_| {
            CommandError::MalformedResponse(format!("log record {slot} is truncated"))
        })?;

        let kind = match record[0] {
            0x00 => continue,
            0x01 => TransactionKind::Credit,
            0x02 => TransactionKind::Debit,
            other => {
                return Err(CommandError::MalformedResponse(format!(
                    "log record {slot} has unknown kind 0x{other:02X}"
                )))
            }
        };
        let amount = CurrencyAmount::from_transfer_bytes([record[1], record[2], record[3]])?;
        entries.push(TransactionLogEntry { kind, amount });
    }

    Ok(entries)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersonalRecord {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: String,
}

impl fmt::Display for PersonalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "First name: {}", self.first_name)?;
        writeln!(f, "Last name: {}", self.last_name)?;
        write!(f, "Birthdate: {}", self.birth_date)
    }
}

// Unused space in a fixed-width field ends at the first 0x00 or 0xFF;
// trailing blanks are padding too.
fn fixed_field(field: &'static str, bytes: &[u8]) -> Result<String, CommandError> {
    let end = bytes
        .iter()
        .position(|&b| b == 0x00 || b == DELIMITER)
        .unwrap_or(bytes.len());
    let value = &bytes[..end];

    if !value.is_ascii() {
        return Err(CommandError::MalformedResponse(format!(
            "{field} is not ASCII"
        )));
    }
    Ok(value.iter().map(|&b| b as char).collect::<String>().trim_end().to_string())
}

/// Read layout: fixed-width 30 + 30 + 8 bytes
pub fn decode_personal_record(payload: &[u8]) -> Result<PersonalRecord, CommandError> {
    expect_len("personal record", payload, PERSONAL_RECORD_LEN)?;

    let (first, rest) = payload.split_at(FIRST_NAME_LEN);
    let (last, birth) = rest.split_at(LAST_NAME_LEN);

    Ok(PersonalRecord {
        first_name: fixed_field("first name", first)?,
        last_name: fixed_field("last name", last)?,
        birth_date: fixed_field("birth date", birth)?,
    })
}

/// Write layout: `first 0xFF last 0xFF birth 0xFF`, no padding.
///
/// Lengths are still held to the read layout so a record can be read back.
pub fn encode_personal_record(
    first_name: &str,
    last_name: &str,
    birth_date: &str,
) -> Result<Vec<u8>, CommandError> {
    let first = ascii_bytes("first name", first_name)?;
    let last = ascii_bytes("last name", last_name)?;
    let birth = ascii_bytes("birth date", birth_date)?;
    check_len("first name", &first, FIRST_NAME_LEN)?;
    check_len("last name", &last, LAST_NAME_LEN)?;
    parse_date(birth_date)?;

    let mut data = Vec::with_capacity(first.len() + last.len() + birth.len() + 3);
    for field in [first, last, birth] {
        data.extend_from_slice(&field);
        data.push(DELIMITER);
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_slot_round_trip() {
        for n in 1..=3u8 {
            let slot = PinSlot::parse(&n.to_string()).unwrap();
            assert_eq!(slot.selector(), n - 1);
            assert_eq!(PinSlot::from_selector(slot.selector()), Some(slot));
            assert_eq!(slot.number(), n);
        }
    }

    #[test]
    fn test_pin_slot_invalid() {
        for s in ["0", "4", "-1", "a", "", "256", "+1", "01", " 2", "3.0"] {
            assert!(matches!(PinSlot::parse(s), Err(CommandError::InvalidSlot(_))));
        }
        assert_eq!(PinSlot::from_selector(3), None);
    }

    #[test]
    fn test_encode_pin_ascii() {
        assert_eq!(encode_pin("1234").unwrap(), b"1234".to_vec());
        assert!(matches!(
            encode_pin("12é4"),
            Err(CommandError::Encoding { field: "PIN" })
        ));
    }

    #[test]
    fn test_decode_pin_status() {
        let states = decode_pin_status(&[0x01, 0x00, 0x01]).unwrap();
        let labels: Vec<String> = states.iter().map(|s| s.to_string()).collect();
        assert_eq!(labels, vec!["Changed", "Not Changed", "Changed"]);

        // anything but 0x01 counts as not changed
        assert_eq!(
            decode_pin_status(&[0x02, 0xFF, 0x01]).unwrap(),
            vec![PinState::NotChanged, PinState::NotChanged, PinState::Changed]
        );
    }

    #[test]
    fn test_decode_pin_status_wrong_length() {
        assert!(matches!(
            decode_pin_status(&[0x01, 0x00]),
            Err(CommandError::MalformedResponse(_))
        ));
        assert!(matches!(
            decode_pin_status(&[0x01, 0x00, 0x01, 0x00]),
            Err(CommandError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("29022000").unwrap(),
            NaiveDate::from_ymd_opt(2000, 2, 29).unwrap()
        );
        for bad in ["29022001", "32012000", "01132000", "1012000", "01-01-2000", "abcdefgh", ""] {
            assert!(
                matches!(parse_date(bad), Err(CommandError::InvalidDate(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_encode_age_date() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(encode_age_date(None, today).unwrap(), b"07032024".to_vec());
        assert_eq!(
            encode_age_date(Some("15061990"), today).unwrap(),
            b"15061990".to_vec()
        );
        assert!(matches!(
            encode_age_date(Some("15/06/1990"), today),
            Err(CommandError::InvalidDate(_))
        ));
    }

    #[test]
    fn test_decode_flag() {
        assert!(decode_flag(&[0x01]).unwrap());
        assert!(!decode_flag(&[0x00]).unwrap());
        for bad in [&[][..], &[0x01, 0x00][..]] {
            assert!(matches!(
                decode_flag(bad),
                Err(CommandError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn test_encode_unlock_full_fields() {
        let data = encode_unlock("12345678", "4321").unwrap();
        assert_eq!(data.len(), UNLOCK_DATA_LEN);
        assert_eq!(&data[..8], b"12345678");
        assert_eq!(data[8], 0xFF);
        assert_eq!(&data[9..], b"4321");
    }

    #[test]
    fn test_encode_unlock_pads_with_zeros() {
        let data = encode_unlock("1234", "12").unwrap();
        assert_eq!(
            data,
            vec![b'1', b'2', b'3', b'4', 0, 0, 0, 0, 0xFF, b'1', b'2', 0, 0]
        );
    }

    #[test]
    fn test_encode_unlock_too_long() {
        assert!(matches!(
            encode_unlock("123456789", "1234"),
            Err(CommandError::FieldTooLong { field: "PUK", len: 9, max: 8 })
        ));
        assert!(matches!(
            encode_unlock("12345678", "12345"),
            Err(CommandError::FieldTooLong { field: "PIN", len: 5, max: 4 })
        ));
    }

    #[test]
    fn test_amount_round_trip() {
        for s in ["0.00", "0.01", "5.32", "12.99", "100.50", "65535.99", "65535.00"] {
            let amount = CurrencyAmount::parse(s).unwrap();
            let bytes = amount.to_transfer_bytes().unwrap();
            let decoded = CurrencyAmount::from_transfer_bytes(bytes).unwrap();
            assert_eq!(decoded.to_string(), s);
        }
    }

    #[test]
    fn test_amount_wire_layout() {
        assert_eq!(encode_amount("258.07").unwrap(), vec![0x01, 0x02, 0x07]);
        assert_eq!(encode_amount("65535").unwrap(), vec![0xFF, 0xFF, 0x00]);
        assert_eq!(encode_amount("5.5").unwrap(), vec![0x00, 0x05, 0x50]);
        assert_eq!(encode_amount("5.32").unwrap(), vec![0x00, 0x05, 0x32]);
        assert_eq!(encode_amount("1.99").unwrap(), vec![0x00, 0x01, 0x99]);
        assert_eq!(encode_amount("0").unwrap(), vec![0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_amount_out_of_range() {
        assert!(matches!(
            encode_amount("65536"),
            Err(CommandError::ValueOutOfRange(_))
        ));
        assert!(matches!(
            encode_amount("99999999999999999999999"),
            Err(CommandError::ValueOutOfRange(_))
        ));
        assert!(matches!(
            encode_amount("1.100"),
            Err(CommandError::ValueOutOfRange(_))
        ));
        assert!(matches!(
            CurrencyAmount::new(1, 100),
            Err(CommandError::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_amount_invalid_syntax() {
        for s in ["", "-5", "abc", "1.", ".5", "1.2.3", "1,50", "+3"] {
            assert!(
                matches!(encode_amount(s), Err(CommandError::InvalidAmount(_))),
                "{s} should be rejected"
            );
        }
    }

    #[test]
    fn test_decode_balance() {
        let amount = decode_balance(&[0x00, 0x01, 0x00, 0x00, 0x05]).unwrap();
        assert_eq!(amount.units, 65536);
        assert_eq!(amount.to_string(), "65536.05");

        assert!(matches!(
            decode_balance(&[0x00, 0x00, 0x00, 0x01]),
            Err(CommandError::MalformedResponse(_))
        ));
        assert!(matches!(
            decode_balance(&[0x00, 0x00, 0x00, 0x01, 0x00, 0x00]),
            Err(CommandError::MalformedResponse(_))
        ));
        assert_eq!(
            decode_balance(&[0x00, 0x00, 0x00, 0x0A, 0x75]).unwrap().to_string(),
            "10.75"
        );
    }

    #[test]
    fn test_cents_byte_must_be_bcd() {
        for bad in [0x0A, 0xA0, 0x9F, 0xFF] {
            assert!(
                matches!(
                    decode_balance(&[0x00, 0x00, 0x00, 0x01, bad]),
                    Err(CommandError::MalformedResponse(_))
                ),
                "0x{bad:02X} should be rejected"
            );
        }
        assert!(matches!(
            CurrencyAmount::from_transfer_bytes([0x00, 0x01, 0x5A]),
            Err(CommandError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_decode_log_single_entry() {
        let mut payload = vec![0x01, 0x00, 0x05, 0x32];
        payload.extend_from_slice(&[0u8; 4 * 8]);

        let entries = decode_log(&payload).unwrap();
        assert_eq!(
            entries,
            vec![TransactionLogEntry {
                kind: TransactionKind::Credit,
                amount: CurrencyAmount::new(5, 32).unwrap(),
            }]
        );
        assert_eq!(entries[0].to_string(), "+ 5.32");
    }

    #[test]
    fn test_decode_log_skips_empty_slots() {
        let payload = [
            0x00, 0x00, 0x00, 0x00, //
            0x02, 0x00, 0x0A, 0x00, //
            0x00, 0x00, 0x00, 0x00, //
            0x01, 0x01, 0x00, 0x99,
        ];
        let entries = decode_log(&payload).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, TransactionKind::Debit);
        assert_eq!(entries[0].to_string(), "- 10.00");
        assert_eq!(entries[1].to_string(), "+ 256.99");
    }

    #[test]
    fn test_decode_log_is_bounded() {
        // twelve credit records, only the first nine slots are read
        let payload: Vec<u8> = (0..12).flat_map(|i| [0x01, 0x00, i, 0x00]).collect();
        let entries = decode_log(&payload).unwrap();
        assert_eq!(entries.len(), MAX_LOG_ENTRIES);
        assert_eq!(entries.last().unwrap().amount.units, 8);
    }

    #[test]
    fn test_decode_log_malformed() {
        assert!(matches!(
            decode_log(&[0x03, 0x00, 0x01, 0x00]),
            Err(CommandError::MalformedResponse(_))
        ));
        assert!(matches!(
            decode_log(&[0x01, 0x00, 0x01, 0x00, 0x01, 0x00]),
            Err(CommandError::MalformedResponse(_))
        ));
        assert!(decode_log(&[]).unwrap().is_empty());
    }

    fn padded(value: &[u8], width: usize, pad: u8) -> Vec<u8> {
        let mut field = value.to_vec();
        field.resize(width, pad);
        field
    }

    #[test]
    fn test_decode_personal_record() {
        let mut payload = padded(b"Ada", FIRST_NAME_LEN, 0x00);
        payload.extend(padded(b"Lovelace", LAST_NAME_LEN, 0xFF));
        payload.extend_from_slice(b"10121815");

        let record = decode_personal_record(&payload).unwrap();
        assert_eq!(record.first_name, "Ada");
        assert_eq!(record.last_name, "Lovelace");
        assert_eq!(record.birth_date, "10121815");
        assert_eq!(
            record.to_string(),
            "First name: Ada\nLast name: Lovelace\nBirthdate: 10121815"
        );
    }

    #[test]
    fn test_decode_personal_record_space_padding() {
        let mut payload = padded(b"Grace", FIRST_NAME_LEN, b' ');
        payload.extend(padded(b"Hopper", LAST_NAME_LEN, b' '));
        payload.extend(padded(b"", BIRTH_DATE_LEN, 0x00));

        let record = decode_personal_record(&payload).unwrap();
        assert_eq!(record.first_name, "Grace");
        assert_eq!(record.last_name, "Hopper");
        assert_eq!(record.birth_date, "");
    }

    #[test]
    fn test_decode_personal_record_wrong_length() {
        for len in [67, 69] {
            assert!(matches!(
                decode_personal_record(&vec![0x41; len]),
                Err(CommandError::MalformedResponse(_))
            ));
        }
    }

    #[test]
    fn test_encode_personal_record() {
        let data = encode_personal_record("Ada", "Lovelace", "10121815").unwrap();
        let mut expected = b"Ada".to_vec();
        expected.push(0xFF);
        expected.extend_from_slice(b"Lovelace");
        expected.push(0xFF);
        expected.extend_from_slice(b"10121815");
        expected.push(0xFF);
        assert_eq!(data, expected);
    }

    #[test]
    fn test_encode_personal_record_validation() {
        let long_name = "x".repeat(31);
        assert!(matches!(
            encode_personal_record(&long_name, "Lovelace", "10121815"),
            Err(CommandError::FieldTooLong { field: "first name", .. })
        ));
        assert!(matches!(
            encode_personal_record("Ada", &long_name, "10121815"),
            Err(CommandError::FieldTooLong { field: "last name", .. })
        ));
        assert!(matches!(
            encode_personal_record("Ada", "Lovelace", "1815-12-10"),
            Err(CommandError::InvalidDate(_))
        ));
        assert!(matches!(
            encode_personal_record("Zoë", "Lovelace", "10121815"),
            Err(CommandError::Encoding { field: "first name" })
        ));
    }
}
