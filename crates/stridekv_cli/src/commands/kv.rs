//! Point commands: put, get and delete.

use super::{CommandResult, Format, Target};
use serde::Serialize;
use std::io::Write;
use stridekv_core::{Arena, Key, Options, ReadRequest, Strided, WriteRequest, LENGTH_MISSING};

/// One looked-up key.
#[derive(Debug, Serialize)]
pub struct Entry {
    /// The key.
    pub key: Key,
    /// Value length, absent if the key is missing.
    pub length: Option<u32>,
    /// Value as lossy UTF-8, if values were requested and the key exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

fn parse_pair(pair: &str) -> Result<(Key, &[u8]), String> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{pair}'"))?;
    let key = key
        .trim()
        .parse::<Key>()
        .map_err(|e| format!("invalid key '{key}': {e}"))?;
    Ok((key, value.as_bytes()))
}

/// Runs the put command.
pub fn put(target: &Target<'_>, pairs: &[String], flush: bool, out: &mut impl Write) -> CommandResult {
    let parsed = pairs
        .iter()
        .map(|p| parse_pair(p))
        .collect::<Result<Vec<_>, _>>()?;
    let keys: Vec<Key> = parsed.iter().map(|(k, _)| *k).collect();
    let values: Vec<&[u8]> = parsed.iter().map(|(_, v)| *v).collect();

    let collection = target.for_write()?;
    let request = WriteRequest::puts(&keys, &values).in_collections(Strided::repeat(collection));
    let options = if flush { Options::FLUSH } else { Options::NONE };
    target.db.write(None, &request, options)?;
    writeln!(out, "stored {} keys", keys.len())?;
    Ok(())
}

/// Reads `keys` from the target collection.
pub fn lookup(target: &Target<'_>, keys: &[Key], lengths_only: bool) -> Result<Vec<Entry>, Box<dyn std::error::Error>> {
    let collection = target.for_read()?;
    let request = ReadRequest::from_keys(keys).in_collections(Strided::repeat(collection));
    let options = if lengths_only { Options::READ_LENGTHS } else { Options::NONE };
    let mut arena = Arena::new();
    let found = target.db.read(None, &request, options, &mut arena)?;

    Ok(keys
        .iter()
        .zip(found.lengths())
        .enumerate()
        .map(|(i, (&key, &length))| Entry {
            key,
            length: (length != LENGTH_MISSING).then_some(length),
            value: found
                .value(i)
                .map(|v| String::from_utf8_lossy(v).into_owned()),
        })
        .collect())
}

/// Runs the get command.
pub fn get(
    target: &Target<'_>,
    keys: &[Key],
    lengths_only: bool,
    format: Format,
    out: &mut impl Write,
) -> CommandResult {
    let entries = lookup(target, keys, lengths_only)?;
    match format {
        Format::Json => writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?,
        Format::Text => {
            for entry in &entries {
                match (&entry.value, entry.length) {
                    (_, None) => writeln!(out, "{}\t(missing)", entry.key)?,
                    (Some(value), _) => writeln!(out, "{}\t{}", entry.key, value)?,
                    (None, Some(len)) => writeln!(out, "{}\t{} bytes", entry.key, len)?,
                }
            }
        }
    }
    Ok(())
}

/// Runs the delete command.
pub fn delete(target: &Target<'_>, keys: &[Key], out: &mut impl Write) -> CommandResult {
    let collection = target.for_write()?;
    let request = WriteRequest::deletes(keys).in_collections(Strided::repeat(collection));
    target.db.write(None, &request, Options::NONE)?;
    writeln!(out, "deleted {} keys", keys.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stridekv_core::Database;

    fn run_put(target: &Target<'_>, pairs: &[&str]) -> String {
        let pairs: Vec<String> = pairs.iter().map(|p| (*p).to_string()).collect();
        let mut out = Vec::new();
        put(target, &pairs, false, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn pairs_parse() {
        assert_eq!(parse_pair("5=five").unwrap(), (5, &b"five"[..]));
        assert_eq!(parse_pair("-3=a=b").unwrap(), (-3, &b"a=b"[..]));
        assert_eq!(parse_pair("7=").unwrap(), (7, &b""[..]));
        assert!(parse_pair("nokey").is_err());
        assert!(parse_pair("x=1").is_err());
    }

    #[test]
    fn put_get_delete() {
        let db = Database::open_in_memory().unwrap();
        let target = Target::new(&db, "");
        assert_eq!(run_put(&target, &["1=one", "2="]), "stored 2 keys\n");

        let mut out = Vec::new();
        get(&target, &[1, 2, 3], false, Format::Text, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1\tone\n2\t\n3\t(missing)\n");

        let mut out = Vec::new();
        delete(&target, &[1], &mut out).unwrap();
        let entries = lookup(&target, &[1, 2], true).unwrap();
        assert_eq!(entries[0].length, None);
        assert_eq!(entries[1].length, Some(0));
        assert!(entries[1].value.is_none());
    }

    #[test]
    fn json_output() {
        let db = Database::open_in_memory().unwrap();
        let target = Target::new(&db, "users");
        run_put(&target, &["10=alice"]);

        let mut out = Vec::new();
        get(&target, &[10, 11], false, Format::Json, &mut out).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed[0]["value"], "alice");
        assert_eq!(parsed[0]["length"], 5);
        assert!(parsed[1]["length"].is_null());
    }

    #[test]
    fn get_from_missing_collection_fails() {
        let db = Database::open_in_memory().unwrap();
        let target = Target::new(&db, "ghosts");
        let mut out = Vec::new();
        assert!(get(&target, &[1], false, Format::Text, &mut out).is_err());
    }
}
