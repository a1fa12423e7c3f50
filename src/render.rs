//! Single-line rendering of a [`LogRecord`].
//!
//! Output looks like `{ "key": "value", "n": 1, "missing": null }`. Only
//! backslash, double quote, `\r`, `\n` and `\t` are escaped.

use std::fmt::{self, Write};

use crate::record::{FieldValue, LogRecord};

/// Render `record` with fields in insertion order.
pub fn render(record: &LogRecord) -> String {
    let mut out = String::with_capacity(32 + record.len() * 24);
    // Writing into a String cannot fail.
    let _ = write_record(&mut out, record);
    out
}

fn write_record(out: &mut impl Write, record: &LogRecord) -> fmt::Result {
    out.write_str("{ ")?;
    for (idx, (key, value)) in record.iter().enumerate() {
        if idx > 0 {
            out.write_str(", ")?;
        }
        out.write_char('"')?;
        write_escaped(out, key)?;
        out.write_str("\": ")?;
        write_value(out, value)?;
    }
    out.write_str(" }")
}

fn write_value(out: &mut impl Write, value: &FieldValue) -> fmt::Result {
    match value {
        FieldValue::Null => out.write_str("null"),
        FieldValue::Bool(v) => write!(out, "{v}"),
        FieldValue::Int(v) => write!(out, "{v}"),
        FieldValue::UInt(v) => write!(out, "{v}"),
        FieldValue::Float(v) => write!(out, "{v}"),
        FieldValue::Str(v) => {
            out.write_char('"')?;
            write_escaped(out, v)?;
            out.write_char('"')
        }
    }
}

fn write_escaped(out: &mut impl Write, value: &str) -> fmt::Result {
    for ch in value.chars() {
        match ch {
            '\\' => out.write_str("\\\\")?,
            '"' => out.write_str("\\\"")?,
            '\r' => out.write_str("\\r")?,
            '\n' => out.write_str("\\n")?,
            '\t' => out.write_str("\\t")?,
            _ => out.write_char(ch)?,
        }
    }
    Ok(())
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_record(f, self)
    }
}
