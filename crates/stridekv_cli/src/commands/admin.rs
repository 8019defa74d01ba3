//! Collection management and administrative commands.

use super::CommandResult;
use std::io::Write;
use stridekv_core::Database;

/// Lists named collections, one per line.
pub fn list(db: &Database, out: &mut impl Write) -> CommandResult {
    for name in db.collections()? {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

/// Creates a collection and prints its id.
pub fn create(db: &Database, name: &str, out: &mut impl Write) -> CommandResult {
    let id = db.collection(name)?;
    writeln!(out, "{name}\t{id}")?;
    Ok(())
}

/// Drops a collection.
pub fn remove(db: &Database, name: &str, out: &mut impl Write) -> CommandResult {
    db.remove_collection(name)?;
    if name.is_empty() {
        writeln!(out, "cleared default collection")?;
    } else {
        writeln!(out, "dropped {name}")?;
    }
    Ok(())
}

/// Runs an administrative command and pretty-prints its response.
pub fn control(db: &Database, request: &str, out: &mut impl Write) -> CommandResult {
    let command = request.parse()?;
    let response = db.execute(command)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&response)?)?;
    Ok(())
}
