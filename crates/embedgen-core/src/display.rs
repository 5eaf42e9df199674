//! Console rendering of generator output.
//!
//! Everything is written as pretty JSON mappings so the output can be piped
//! into other tools; status lines are plain text.

use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EmbedResult;

pub const EMBEDDING_KEY: &str = "embedding";
pub const IMAGE_FILE_NAME_KEY: &str = "Image-File-Name";

/// Write `{ key: value }` as pretty JSON followed by a newline.
pub fn write_labeled<W: Write, T: Serialize + ?Sized>(
    out: &mut W,
    key: &str,
    value: &T,
) -> EmbedResult<()> {
    let mut map = Map::new();
    map.insert(key.to_string(), serde_json::to_value(value)?);
    serde_json::to_writer_pretty(&mut *out, &Value::Object(map))?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

pub fn write_status<W: Write>(out: &mut W, line: &str) -> EmbedResult<()> {
    writeln!(out, "{line}")?;
    Ok(())
}

/// Print `{"embedding": ...}` when `show` is set. Returns whether it printed.
/// A missing embedding renders as `null`.
pub fn show_result<W: Write, T: Serialize + ?Sized>(
    out: &mut W,
    embedding: &T,
    show: bool,
) -> EmbedResult<bool> {
    if !show {
        return Ok(false);
    }
    write_labeled(out, EMBEDDING_KEY, embedding)?;
    Ok(true)
}
