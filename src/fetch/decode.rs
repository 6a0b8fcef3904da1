use log::debug;
use serde_json::Value;

use crate::config::ResponseFormat;
use crate::error::FetchError;

/// One `(symbol, open, last)` row decoded from a batch response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQuoteRecord {
    pub symbol: String,
    pub open: f64,
    pub last: f64,
}

impl RawQuoteRecord {
    pub fn new(symbol: impl Into<String>, open: f64, last: f64) -> Self {
        Self {
            symbol: symbol.into(),
            open,
            last,
        }
    }
}

/// Decode a response body into quote records.
///
/// The rows are found by following `format.data_path` from the document root.
/// An array yields one record per element, a single object yields one record
/// and `null` yields none. Anything else, or a missing key along the path,
/// is a malformed envelope.
pub fn decode_records(
    body: &str,
    format: &ResponseFormat,
) -> Result<Vec<RawQuoteRecord>, FetchError> {
    let root: Value = serde_json::from_str(body)
        .map_err(|err| FetchError::malformed(format!("response is not valid JSON: {err}")))?;

    let rows = walk_json_path(&root, &format.data_path)?;

    match rows {
        Value::Array(items) => Ok(items
            .iter()
            .filter_map(|item| decode_row(item, format))
            .collect()),
        Value::Object(_) => Ok(decode_row(rows, format).into_iter().collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(FetchError::malformed(format!(
            "expected quote rows at `{}`, found {}",
            format.data_path.join("."),
            json_kind(other)
        ))),
    }
}

pub fn walk_json_path<'a>(root: &'a Value, path: &[String]) -> Result<&'a Value, FetchError> {
    let mut cursor = root;
    for key in path {
        cursor = match cursor {
            Value::Null => return Ok(cursor),
            Value::Object(map) => map.get(key).ok_or_else(|| {
                FetchError::malformed(format!("missing key `{key}` while navigating response"))
            })?,
            other => {
                return Err(FetchError::malformed(format!(
                    "cannot read key `{key}` from {}",
                    json_kind(other)
                )))
            }
        };
    }
    Ok(cursor)
}

fn decode_row(row: &Value, format: &ResponseFormat) -> Option<RawQuoteRecord> {
    let Some(fields) = row.as_object() else {
        debug!("Skipping non-object quote row: {row}");
        return None;
    };

    let Some(symbol) = fields.get(&format.symbol_field).and_then(value_to_symbol) else {
        debug!("Skipping quote row without `{}`", format.symbol_field);
        return None;
    };

    let open = price_value(&symbol, &format.open_field, fields.get(&format.open_field));
    let last = price_value(&symbol, &format.last_field, fields.get(&format.last_field));

    Some(RawQuoteRecord { symbol, open, last })
}

fn value_to_symbol(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Absent, null and unparseable prices all read as 0.0, the "unset" price.
fn price_value(symbol: &str, field: &str, value: Option<&Value>) -> f64 {
    match value {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => match parse_f64(s) {
            Some(price) => price,
            None => {
                debug!("Unparseable `{field}` value `{s}` for {symbol}; treating as 0");
                0.0
            }
        },
        Some(other) => {
            debug!("Unexpected `{field}` value {other} for {symbol}; treating as 0");
            0.0
        }
    }
}

pub fn parse_f64(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|price| price.is_finite())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
