//! Minimal RFC 4180 writer for the history export.

use std::io::{self, Write};

/// Write one CSV record, quoting cells that need it.
pub fn write_record<W, I, S>(out: &mut W, cells: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for (i, cell) in cells.into_iter().enumerate() {
        if i > 0 {
            out.write_all(b",")?;
        }
        out.write_all(escape(cell.as_ref()).as_bytes())?;
    }
    out.write_all(b"\r\n")
}

fn escape(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
