//! Range commands: scan and size.

use super::{CommandResult, Format, Target};
use serde::Serialize;
use std::io::Write;
use stridekv_core::{Arena, Key, Options, ScanRequest, SizeRequest, Strided};

/// A scanned key.
#[derive(Debug, Serialize)]
pub struct ScannedKey {
    /// The key.
    pub key: Key,
    /// Value length, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
}

/// Lower and upper bound of one estimated quantity.
#[derive(Debug, Serialize)]
pub struct Range {
    /// Lower bound.
    pub min: u64,
    /// Upper bound.
    pub max: u64,
}

/// Size estimate of a key range.
#[derive(Debug, Serialize)]
pub struct SizeReport {
    /// Number of present keys.
    pub cardinality: Range,
    /// Bytes of values.
    pub value_bytes: Range,
    /// Memory footprint.
    pub space_usage: Range,
}

/// Runs the scan command.
pub fn scan(
    target: &Target<'_>,
    from: Key,
    limit: u32,
    lengths: bool,
    format: Format,
    out: &mut impl Write,
) -> CommandResult {
    let collection = target.for_read()?;
    let request = ScanRequest::single(from, limit).in_collections(Strided::repeat(collection));
    let options = if lengths { Options::READ_LENGTHS } else { Options::NONE };
    let mut arena = Arena::new();
    let found = target.db.scan(None, &request, options, &mut arena)?;

    let keys = found.keys(0);
    let lens = found.lengths(0);
    let scanned: Vec<ScannedKey> = keys
        .iter()
        .enumerate()
        .map(|(i, &key)| ScannedKey {
            key,
            length: lens.get(i).copied(),
        })
        .collect();

    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&scanned)?)?,
        Format::Text => {
            for entry in &scanned {
                match entry.length {
                    Some(len) => writeln!(out, "{}\t{} bytes", entry.key, len)?,
                    None => writeln!(out, "{}", entry.key)?,
                }
            }
        }
    }
    Ok(())
}

/// Runs the size command.
pub fn size(target: &Target<'_>, from: Key, to: Key, format: Format, out: &mut impl Write) -> CommandResult {
    let collection = target.for_read()?;
    let request = SizeRequest::single(from, to).in_collections(Strided::repeat(collection));
    let mut arena = Arena::new();
    let found = target.db.size(None, &request, Options::NONE, &mut arena)?;
    let estimate = found.get(0).ok_or("size returned no estimate")?;

    let range = |b: stridekv_core::Bounds| Range { min: b.lo, max: b.hi };
    let report = SizeReport {
        cardinality: range(estimate.cardinality),
        value_bytes: range(estimate.value_bytes),
        space_usage: range(estimate.space_usage),
    };

    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?,
        Format::Text => {
            writeln!(out, "Range [{from}, {to}):")?;
            writeln!(out, "  Keys:        {}..={}", report.cardinality.min, report.cardinality.max)?;
            writeln!(out, "  Value bytes: {}..={}", report.value_bytes.min, report.value_bytes.max)?;
            writeln!(out, "  Space:       {}..={}", report.space_usage.min, report.space_usage.max)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stridekv_core::{Database, WriteRequest};

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        let keys = [1, 5, 6, 9, 20];
        let values: [&[u8]; 5] = [b"a", b"bb", b"ccc", b"d", b"e"];
        db.write(None, &WriteRequest::puts(&keys, &values), Options::NONE)
            .unwrap();
        db
    }

    #[test]
    fn scan_lists_keys_from_start() {
        let db = seeded();
        let target = Target::new(&db, "");
        let mut out = Vec::new();
        scan(&target, 5, 3, false, Format::Text, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "5\n6\n9\n");
    }

    #[test]
    fn scan_json_with_lengths() {
        let db = seeded();
        let target = Target::new(&db, "");
        let mut out = Vec::new();
        scan(&target, 0, 2, true, Format::Json, &mut out).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[1]["key"], 5);
        assert_eq!(parsed[1]["length"], 2);
    }

    #[test]
    fn size_bounds_contain_truth() {
        let db = seeded();
        let target = Target::new(&db, "");
        let mut out = Vec::new();
        size(&target, 5, 10, Format::Json, &mut out).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let keys = &parsed["cardinality"];
        assert!(keys["min"].as_u64().unwrap() <= 3);
        assert!(keys["max"].as_u64().unwrap() >= 3);
    }
}
