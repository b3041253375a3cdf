//! Rows and errors → human/json string formatting.
//!
//! - **Human** (default): aligned columns with a header, `NULL` for SQL NULL
//! - **JSON** (`--json`): an array of row objects, `serde_json::to_string_pretty`

use resql_core::{Error, Row};

/// Output formatting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// Format a result set.
pub fn format_rows(rows: &[Row], mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => format_json(rows),
        OutputMode::Human => format_human(rows),
    }
}

/// Format an error.
pub fn format_error(err: &Error, mode: OutputMode) -> String {
    match mode {
        OutputMode::Json => {
            let mut body = serde_json::json!({
                "error": err.to_string(),
                "kind": err.kind().as_str(),
            });
            if let Some(code) = err.code() {
                body["code"] = serde_json::Value::from(code);
            }
            if let Error::Exhausted { attempts, .. } = err {
                body["attempts"] = serde_json::Value::from(*attempts);
            }
            serde_json::to_string_pretty(&body)
                .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err))
        }
        OutputMode::Human => format!("(error) {}", err),
    }
}

// =========================================================================
// JSON mode
// =========================================================================

fn format_json(rows: &[Row]) -> String {
    let array = serde_json::Value::Array(rows.iter().map(Row::to_json).collect());
    serde_json::to_string_pretty(&array).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

// =========================================================================
// Human mode
// =========================================================================

fn format_human(rows: &[Row]) -> String {
    let first = match rows.first() {
        Some(row) => row,
        None => return "(empty set)".to_string(),
    };

    let header: Vec<String> = first.columns().map(str::to_string).collect();
    if header.is_empty() {
        return format_count(rows.len());
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.values().map(|v| v.to_string()).collect())
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for line in &cells {
        for (i, cell) in line.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 3);
    lines.push(join_padded(&header, &widths));
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for line in &cells {
        lines.push(join_padded(line, &widths));
    }
    lines.push(format_count(rows.len()));
    lines.join("\n")
}

fn join_padded(cells: &[String], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn format_count(n: usize) -> String {
    if n == 1 {
        "(1 row)".to_string()
    } else {
        format!("({} rows)", n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resql_core::{ErrorKind, Value};

    fn tables() -> Vec<Row> {
        vec![
            Row::new()
                .with("name", "customers")
                .with("approx_rows", 1200u64),
            Row::new()
                .with("name", "orders")
                .with("approx_rows", Value::Null),
        ]
    }

    #[test]
    fn test_format_empty_set() {
        assert_eq!(format_rows(&[], OutputMode::Human), "(empty set)");
        assert_eq!(format_rows(&[], OutputMode::Json), "[]");
    }

    #[test]
    fn test_format_human_table() {
        let out = format_rows(&tables(), OutputMode::Human);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "name       approx_rows");
        assert_eq!(lines[1], "---------  -----------");
        assert_eq!(lines[2], "customers  1200");
        assert_eq!(lines[3], "orders     NULL");
        assert_eq!(lines[4], "(2 rows)");
    }

    #[test]
    fn test_format_single_row_count() {
        let rows = vec![Row::new().with("ok", 1i64)];
        assert!(format_rows(&rows, OutputMode::Human).ends_with("(1 row)"));
    }

    #[test]
    fn test_format_json_rows() {
        let out = format_rows(&tables(), OutputMode::Json);
        let parsed: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed[0]["name"], "customers");
        assert_eq!(parsed[0]["approx_rows"], 1200);
        assert!(parsed[1]["approx_rows"].is_null());
    }

    #[test]
    fn test_format_error_human() {
        let err = Error::terminal("Table 'x.y' doesn't exist");
        assert!(format_error(&err, OutputMode::Human).starts_with("(error) "));
    }

    #[test]
    fn test_format_exhausted_error_json() {
        let err = Error::Exhausted {
            attempts: 3,
            last: Box::new(Error::driver(ErrorKind::Transient, 2013, "lost connection")),
        };
        let parsed: serde_json::Value =
            serde_json::from_str(&format_error(&err, OutputMode::Json)).unwrap();
        assert_eq!(parsed["attempts"], 3);
        assert_eq!(parsed["code"], 2013);
        assert_eq!(parsed["kind"], "terminal");
    }
}
