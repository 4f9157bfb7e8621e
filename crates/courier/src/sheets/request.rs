//! Request bodies for the Sheets API

use anyhow::{Context, Result, bail, ensure};
use serde_json::{Map, Value, json};

/// Body for `POST /v4/spreadsheets`
pub fn create_spreadsheet_body(title: &str) -> Value {
    json!({
        "properties": { "title": title },
        "sheets": [{
            "properties": {
                "title": "Sheet1",
                "gridProperties": { "rowCount": 100, "columnCount": 26 }
            }
        }]
    })
}

/// Body for a `batchUpdate` that formats `range` with `style`
///
/// `style` is a `CellFormat` object, or a string holding one as JSON. Only
/// its top-level keys end up in the field mask, so other formatting on the
/// cells is left alone.
pub fn style_request_body(range: &str, style: &Value) -> Result<Value> {
    let format = match style {
        Value::String(raw) => serde_json::from_str::<Value>(raw).context("Style is not valid JSON")?,
        other => other.clone(),
    };
    let Some(keys) = format.as_object().map(Map::keys) else {
        bail!("Style must be a JSON object");
    };
    let fields = keys.cloned().collect::<Vec<_>>().join(",");
    ensure!(!fields.is_empty(), "Style must set at least one format property");

    Ok(json!({
        "requests": [{
            "repeatCell": {
                "range": grid_range(range)?,
                "cell": { "userEnteredFormat": format },
                "fields": format!("userEnteredFormat({})", fields)
            }
        }]
    }))
}

/// Convert an A1 range (`B2:D10`, `A:C`, `Sheet1!A1`) to a `GridRange`
///
/// The range always targets the first sheet (`sheetId` 0); a sheet name
/// prefix is accepted and ignored. End indexes are exclusive.
pub fn grid_range(a1: &str) -> Result<Value> {
    let cells = a1.rsplit_once('!').map_or(a1, |(_, cells)| cells).trim();
    let (start, end) = cells.split_once(':').unwrap_or((cells, cells));

    let (start_col, start_row) = parse_cell(start).with_context(|| format!("Invalid range: {}", a1))?;
    let (end_col, end_row) = parse_cell(end).with_context(|| format!("Invalid range: {}", a1))?;

    let mut range = Map::new();
    range.insert("sheetId".to_string(), json!(0));
    if let Some(col) = start_col {
        range.insert("startColumnIndex".to_string(), json!(col));
    }
    if let Some(col) = end_col {
        range.insert("endColumnIndex".to_string(), json!(col + 1));
    }
    if let Some(row) = start_row {
        range.insert("startRowIndex".to_string(), json!(row - 1));
    }
    if let Some(row) = end_row {
        range.insert("endRowIndex".to_string(), json!(row));
    }
    Ok(Value::Object(range))
}

/// GridRange indexes are 32-bit on the wire
const MAX_GRID_INDEX: u64 = i32::MAX as u64;

/// Split `AB12` into a zero-based column and a one-based row, either optional
fn parse_cell(cell: &str) -> Result<(Option<u64>, Option<u64>)> {
    let digits_at = cell.find(|c: char| c.is_ascii_digit()).unwrap_or(cell.len());
    let (letters, digits) = cell.split_at(digits_at);
    ensure!(!cell.is_empty(), "empty cell reference");
    ensure!(letters.chars().all(|c| c.is_ascii_alphabetic()), "bad column in {:?}", cell);

    let column = if letters.is_empty() {
        None
    } else {
        let number = letters
            .bytes()
            .try_fold(0u64, |acc, c| {
                acc.checked_mul(26)?
                    .checked_add(u64::from(c.to_ascii_uppercase() - b'A' + 1))
            })
            .filter(|n| *n <= MAX_GRID_INDEX)
            .with_context(|| format!("bad column in {:?}", cell))?;
        Some(number - 1)
    };

    let row = if digits.is_empty() {
        None
    } else {
        let row: u64 = digits.parse().with_context(|| format!("bad row in {:?}", cell))?;
        ensure!(row > 0, "rows start at 1");
        ensure!(row <= MAX_GRID_INDEX, "bad row in {:?}", cell);
        Some(row)
    };

    Ok((column, row))
}
