//! Loader for Flipper-style `.ir` command files.
//!
//! ```text
//! Filetype: IR signals file
//! Version: 1
//! #
//! name: Power
//! type: parsed
//! protocol: NEC
//! address: 07 00 00 00
//! command: 02 00 00 00
//! ```

use crate::commands::{CommandTable, IrCommandRecord};
use crate::error::Result;
use std::path::Path;
use tracing::{debug, info};

/// A loaded command database and the device model it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSet {
    pub model: String,
    pub table: CommandTable,
}

/// Parse `.ir` text into records. Keys before the first `name:` form the
/// file header and are ignored; unknown keys are skipped.
pub fn parse_ir_str(text: &str) -> Vec<IrCommandRecord> {
    let mut records = Vec::new();
    let mut current: Option<IrCommandRecord> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim().to_string());

        if key == "name" {
            if let Some(record) = current.take() {
                records.push(record);
            }
            current = Some(IrCommandRecord {
                name: value,
                ..Default::default()
            });
            continue;
        }

        if let Some(record) = current.as_mut() {
            match key {
                "protocol" => record.protocol = Some(value),
                "address" => record.address = Some(value),
                "command" => record.command = Some(value),
                _ => {}
            }
        }
    }

    if let Some(record) = current {
        records.push(record);
    }

    debug!("Parsed {} IR command records", records.len());
    records
}

/// Load a command file; the model name is the file stem
pub fn load_ir_file<P: AsRef<Path>>(path: P) -> Result<CommandSet> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let model = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let table = CommandTable::from_records(parse_ir_str(&text));
    info!(
        "Loaded {} commands for model '{}' from {}",
        table.len(),
        model,
        path.display()
    );

    Ok(CommandSet { model, table })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
Filetype: IR signals file
Version: 1
#
name: Power
type: parsed
protocol: NEC
address: 07 00 00 00
command: 02 00 00 00
#
name: Vol_up
type: parsed
protocol: NECext
address: 04 F5 00 00
command: 07 00 00 00
#
name: Raw_button
type: raw
frequency: 38000
data: 9024 4512 579
";

    #[test]
    fn test_parse_records() {
        let records = parse_ir_str(SAMPLE);
        assert_eq!(records.len(), 3);

        assert_eq!(records[0].name, "Power");
        assert_eq!(records[0].protocol.as_deref(), Some("NEC"));
        assert_eq!(records[0].address.as_deref(), Some("07 00 00 00"));
        assert_eq!(records[0].command.as_deref(), Some("02 00 00 00"));

        assert_eq!(records[1].name, "Vol_up");
        // Raw captures carry timings, not a command field
        assert_eq!(records[2].protocol, None);
        assert_eq!(records[2].command, None);
    }

    #[test]
    fn test_header_without_commands() {
        let records = parse_ir_str("Filetype: IR signals file\nVersion: 1\n");
        assert!(records.is_empty());
    }

    #[test]
    fn test_load_file_uses_stem_as_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Samsung_TV.ir");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let set = load_ir_file(&path).unwrap();
        assert_eq!(set.model, "Samsung_TV");
        assert_eq!(set.table.len(), 3);
        assert!(set.table.contains("Vol_up"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_ir_file(dir.path().join("nope.ir")).is_err());
    }
}
