use anyhow::{Context, Result};
use log::info;
use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter};
use serde_json::Serializer;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Compact JSON with every non-ASCII character written as a `\uXXXX` escape.
#[derive(Debug, Default, Clone, Copy)]
pub struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (idx, ch) in fragment.char_indices() {
            if ch.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..idx].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = idx + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Serializes `value`: pretty with a four-space indent in debug mode, compact
/// and ASCII-only otherwise.
pub fn write_json<T, W>(value: &T, debug: bool, writer: W) -> Result<()>
where
    T: Serialize + ?Sized,
    W: Write,
{
    if debug {
        let mut ser = Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"    "));
        value.serialize(&mut ser)?;
    } else {
        let mut ser = Serializer::with_formatter(writer, AsciiFormatter);
        value.serialize(&mut ser)?;
    }
    Ok(())
}

pub fn to_json_string<T: Serialize + ?Sized>(value: &T, debug: bool) -> Result<String> {
    let mut buf = Vec::new();
    write_json(value, debug, &mut buf)?;
    Ok(String::from_utf8(buf)?)
}

/// Writes the JSON to `path`, or to stdout when there is none.
pub fn emit<T: Serialize + ?Sized>(value: &T, debug: bool, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            info!("Writing results to {}", path.display());
            let file = File::create(path)
                .with_context(|| format!("Failed to create file: {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            write_json(value, debug, &mut writer)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_json(value, debug, &mut writer)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
    }
    Ok(())
}
