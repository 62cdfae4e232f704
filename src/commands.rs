use crate::classifier::GestureSymbol;
use crate::debounce::StableGestureEvent;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

pub const DEFAULT_PROTOCOL: &str = "NEC";
pub const DEFAULT_HEX_FIELD: &str = "00 00 00 00";
const ZERO_TOKEN: &str = "00";

/// Acceptable command names per gesture, in preference order. Vendor
/// databases name the same button differently.
pub const GESTURE_TO_IR_NAMES: &[(GestureSymbol, &[&str])] = &[
    (
        GestureSymbol::Power,
        &["Power", "POWER", "power", "Power_on", "On/Off"],
    ),
    (GestureSymbol::Mute, &["Mute", "MUTE", "mute"]),
    (
        GestureSymbol::VolumeUp,
        &["Vol_up", "VOL+", "Volume_up", "Vol+", "VOL_UP"],
    ),
    (
        GestureSymbol::VolumeDown,
        &["Vol_dn", "VOL-", "Volume_down", "Vol-", "VOL_DOWN", "Vol_down"],
    ),
    (
        GestureSymbol::ChannelNext,
        &["Ch_next", "CH+", "Channel_up", "Ch+", "CH_UP", "Ch_up"],
    ),
    (
        GestureSymbol::ChannelPrev,
        &["Ch_prev", "CH-", "Channel_down", "Ch-", "CH_DOWN", "Ch_down"],
    ),
    (
        GestureSymbol::Source,
        &["Source", "SOURCE", "Input", "INPUT", "Input_source"],
    ),
];

/// Gesture to candidate command names
pub type GestureTable = HashMap<GestureSymbol, Vec<String>>;

pub fn default_gesture_table() -> GestureTable {
    GESTURE_TO_IR_NAMES
        .iter()
        .map(|(symbol, names)| (*symbol, names.iter().map(|n| n.to_string()).collect()))
        .collect()
}

/// Raw entry of an IR command database; hex fields are little-endian,
/// space-delimited byte strings such as `"34 12 00 00"`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IrCommandRecord {
    pub name: String,
    pub protocol: Option<String>,
    pub address: Option<String>,
    pub command: Option<String>,
}

/// Command name to raw record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandTable {
    entries: HashMap<String, IrCommandRecord>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records; the first record with a given name wins
    pub fn from_records<I: IntoIterator<Item = IrCommandRecord>>(records: I) -> Self {
        let mut entries = HashMap::new();
        for record in records {
            entries.entry(record.name.clone()).or_insert(record);
        }
        Self { entries }
    }

    pub fn insert(&mut self, record: IrCommandRecord) {
        self.entries.insert(record.name.clone(), record);
    }

    pub fn get(&self, name: &str) -> Option<&IrCommandRecord> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// A protocol command ready for the wire. Hex byte tokens are kept as
/// written, in the little-endian order of the source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCommand {
    pub name: String,
    pub protocol: String,
    pub address: Vec<String>,
    pub data: Vec<String>,
}

impl DeviceCommand {
    /// Build from a table record. Missing fields take their defaults and
    /// unparseable hex fields degrade to zero.
    pub fn from_record(record: &IrCommandRecord) -> Self {
        let protocol = record
            .protocol
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PROTOCOL)
            .to_string();

        Self {
            name: record.name.clone(),
            protocol,
            address: parse_field(&record.name, "address", record.address.as_deref()),
            data: parse_field(&record.name, "command", record.command.as_deref()),
        }
    }

    pub fn address_hex(&self) -> String {
        wire_hex(&self.address)
    }

    pub fn data_hex(&self) -> String {
        wire_hex(&self.data)
    }

    /// `!{protocol}:{address_hex}:{data_hex}\n`
    pub fn to_line(&self) -> String {
        format!(
            "!{}:{}:{}\n",
            self.protocol,
            self.address_hex(),
            self.data_hex()
        )
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {}:{})",
            self.name,
            self.protocol,
            self.address_hex(),
            self.data_hex()
        )
    }
}

/// Split a space-delimited hex byte string into its tokens, rejecting any
/// token that is not a single byte
pub fn hex_tokens(field: &str) -> Result<Vec<String>, std::num::ParseIntError> {
    field
        .split_whitespace()
        .map(|token| u8::from_str_radix(token, 16).map(|_| token.to_string()))
        .collect()
}

fn parse_field(name: &str, field: &str, value: Option<&str>) -> Vec<String> {
    let value = value.unwrap_or(DEFAULT_HEX_FIELD);
    match hex_tokens(value) {
        Ok(tokens) if !tokens.is_empty() => tokens,
        Ok(_) => vec![ZERO_TOKEN.to_string()],
        Err(e) => {
            warn!(
                "Malformed {} '{}' for command '{}' ({}), using 00",
                field, value, name, e
            );
            vec![ZERO_TOKEN.to_string()]
        }
    }
}

/// Strip trailing zero tokens (keeping at least one), reverse to big-endian
/// and concatenate. Token text, including its case, is passed through.
pub fn wire_hex<S: AsRef<str>>(le_tokens: &[S]) -> String {
    let keep = le_tokens
        .iter()
        .rposition(|token| token.as_ref().chars().any(|c| c != '0'))
        .map_or(1, |last| last + 1);

    match le_tokens.get(..keep) {
        Some(trimmed) if !trimmed.is_empty() => {
            trimmed.iter().rev().map(|token| token.as_ref()).collect()
        }
        _ => ZERO_TOKEN.to_string(),
    }
}

/// Convert a little-endian hex field straight to its wire form
pub fn le_field_to_wire(field: &str) -> String {
    match hex_tokens(field) {
        Ok(tokens) => wire_hex(&tokens),
        Err(_) => ZERO_TOKEN.to_string(),
    }
}

/// Pick the first candidate for `symbol` present in `command_table`
pub fn map_gesture(
    symbol: GestureSymbol,
    gesture_table: &GestureTable,
    command_table: &CommandTable,
) -> Option<DeviceCommand> {
    let candidates = gesture_table.get(&symbol)?;
    let record = candidates
        .iter()
        .find_map(|name| command_table.get(name))?;
    debug!("Gesture {} mapped to command '{}'", symbol, record.name);
    Some(DeviceCommand::from_record(record))
}

/// Model-select line announcing a newly loaded command set
pub fn model_select_line(model: &str) -> String {
    format!("#{}\n", model)
}

/// Bare single-letter command for the simple firmware; no terminator
pub fn legacy_line(symbol: GestureSymbol) -> Option<String> {
    symbol.legacy_code().map(String::from)
}

/// Maps stable gestures to device commands using the active command table
#[derive(Debug, Clone)]
pub struct CommandMapper {
    gesture_table: GestureTable,
    command_table: CommandTable,
}

impl Default for CommandMapper {
    fn default() -> Self {
        Self::new(CommandTable::new())
    }
}

impl CommandMapper {
    pub fn new(command_table: CommandTable) -> Self {
        Self::with_gesture_table(default_gesture_table(), command_table)
    }

    pub fn with_gesture_table(gesture_table: GestureTable, command_table: CommandTable) -> Self {
        Self {
            gesture_table,
            command_table,
        }
    }

    /// `None` is a normal miss: the active table has no command for this gesture
    pub fn map(&self, event: &StableGestureEvent) -> Option<DeviceCommand> {
        map_gesture(event.symbol, &self.gesture_table, &self.command_table)
    }

    pub fn set_command_table(&mut self, command_table: CommandTable) {
        self.command_table = command_table;
    }

    pub fn command_table(&self) -> &CommandTable {
        &self.command_table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn record(name: &str, protocol: Option<&str>, address: &str, command: &str) -> IrCommandRecord {
        IrCommandRecord {
            name: name.to_string(),
            protocol: protocol.map(String::from),
            address: Some(address.to_string()),
            command: Some(command.to_string()),
        }
    }

    fn event(symbol: GestureSymbol) -> StableGestureEvent {
        StableGestureEvent {
            symbol,
            at: Instant::now(),
        }
    }

    #[test]
    fn test_hex_transform() {
        assert_eq!(le_field_to_wire("34 12 00 00"), "1234");
        assert_eq!(le_field_to_wire("00 00 00 00"), "00");
        assert_eq!(le_field_to_wire("07 00 00 00"), "07");
        assert_eq!(le_field_to_wire("00 12"), "1200");
        assert_eq!(le_field_to_wire(""), "00");
    }

    #[test]
    fn test_hex_tokens_pass_through_as_written() {
        assert_eq!(le_field_to_wire("bf 40 00 00"), "40bf");
        assert_eq!(le_field_to_wire("BF 40"), "40BF");
        assert_eq!(le_field_to_wire("0 7 00"), "70");
        assert_eq!(wire_hex(&["e0", "e0", "00"]), "e0e0");
    }

    #[test]
    fn test_multi_byte_token_is_malformed() {
        // One token wider than a byte rejects the whole field
        assert_eq!(le_field_to_wire("1234 00"), "00");
        let table = CommandTable::from_records([record("Mute", None, "1234 00", "0f")]);
        let command = map_gesture(GestureSymbol::Mute, &default_gesture_table(), &table).unwrap();
        assert_eq!(command.address, vec!["00".to_string()]);
        assert_eq!(command.to_line(), "!NEC:00:0f\n");
    }

    #[test]
    fn test_power_command_line() {
        let table = CommandTable::from_records([record(
            "Power",
            Some("NEC"),
            "00 00 00 00",
            "34 12 00 00",
        )]);
        let mapper = CommandMapper::new(table);

        let command = mapper.map(&event(GestureSymbol::Power)).unwrap();
        assert_eq!(command.to_line(), "!NEC:00:1234\n");
    }

    #[test]
    fn test_protocol_defaults_to_nec() {
        let table = CommandTable::from_records([IrCommandRecord {
            name: "Mute".to_string(),
            ..Default::default()
        }]);
        let command = map_gesture(GestureSymbol::Mute, &default_gesture_table(), &table).unwrap();
        assert_eq!(command.protocol, "NEC");
        assert_eq!(command.to_line(), "!NEC:00:00\n");
    }

    #[test]
    fn test_first_present_candidate_wins() {
        let table = CommandTable::from_records([
            record("VOL+", Some("Samsung32"), "07 00 00 00", "07 00 00 00"),
            record("Vol_up", Some("NECext"), "04 00 00 00", "02 00 00 00"),
        ]);
        let command =
            map_gesture(GestureSymbol::VolumeUp, &default_gesture_table(), &table).unwrap();
        assert_eq!(command.name, "Vol_up");
        assert_eq!(command.to_line(), "!NECext:04:02\n");
    }

    #[test]
    fn test_missing_mapping_is_none() {
        let table = CommandTable::from_records([record("Power", None, "00", "01")]);
        let mapper = CommandMapper::new(table);
        assert!(mapper.map(&event(GestureSymbol::Source)).is_none());
        assert!(mapper.map(&event(GestureSymbol::None)).is_none());
    }

    #[test]
    fn test_malformed_hex_degrades_to_zero() {
        let table = CommandTable::from_records([record("Power", Some("RC5"), "zz 01", "34 12")]);
        let command = map_gesture(GestureSymbol::Power, &default_gesture_table(), &table).unwrap();
        assert_eq!(command.address, vec!["00".to_string()]);
        assert_eq!(command.to_line(), "!RC5:00:1234\n");
    }

    #[test]
    fn test_duplicate_names_keep_first() {
        let table = CommandTable::from_records([
            record("Power", Some("NEC"), "00", "01"),
            record("Power", Some("NEC"), "00", "02"),
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("Power").unwrap().command.as_deref(), Some("01"));
    }

    #[test]
    fn test_model_select_and_legacy_lines() {
        assert_eq!(model_select_line("Samsung_TV"), "#Samsung_TV\n");
        assert_eq!(legacy_line(GestureSymbol::Power).as_deref(), Some("P"));
        assert_eq!(legacy_line(GestureSymbol::None), None);
    }

    #[test]
    fn test_every_gesture_has_candidates() {
        let table = default_gesture_table();
        for symbol in GestureSymbol::ALL.iter().filter(|s| !s.is_none()) {
            assert!(!table[symbol].is_empty(), "no candidates for {}", symbol);
        }
    }
}
