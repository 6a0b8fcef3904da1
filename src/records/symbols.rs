use std::io::Read;
use std::path::Path;

use crate::error::{Context, Result};

/// Read ticker symbols from a CSV file, taking the first column of every row.
pub fn load_symbols(path: &Path) -> Result<Vec<String>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open symbol list {}", path.display()))?;
    read_symbols(file)
}

/// Blank rows and rows starting with `#` are ignored; surrounding whitespace is trimmed.
pub fn read_symbols<R: Read>(reader: R) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut symbols = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to read symbol list record")?;
        if let Some(symbol) = record.get(0).filter(|field| !field.is_empty()) {
            symbols.push(symbol.to_string());
        }
    }

    Ok(symbols)
}
