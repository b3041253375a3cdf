//! Conversion between resql values and `mysql_async` values.
//!
//! Text-protocol results arrive as bytes for every column, so decoding is
//! driven by the column's declared type rather than the wire variant.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use mysql_async::consts::{ColumnFlags, ColumnType};
use resql_core::{Error, Params, Result, Row, Value};

/// `character_set` id MySQL reports for binary columns
const BINARY_CHARSET: u16 = 63;

const MICROS_PER_SECOND: i64 = 1_000_000;

/// How a column's bytes should be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// TINYINT .. BIGINT, YEAR
    Integer {
        /// UNSIGNED flag set
        unsigned: bool,
    },
    /// FLOAT, DOUBLE
    Float,
    /// DATE, DATETIME, TIMESTAMP
    DateTime,
    /// TIME
    Time,
    /// BINARY, VARBINARY, BLOB with the binary charset
    Binary,
    /// Everything else, including DECIMAL (kept exact as text)
    Text,
}

impl ColumnKind {
    /// Derive the decoding kind from driver column metadata
    pub fn of(column: &mysql_async::Column) -> Self {
        Self::from_parts(
            column.column_type(),
            column.flags().contains(ColumnFlags::UNSIGNED_FLAG),
            column.character_set(),
        )
    }

    fn from_parts(column_type: ColumnType, unsigned: bool, charset: u16) -> Self {
        match column_type {
            ColumnType::MYSQL_TYPE_TINY
            | ColumnType::MYSQL_TYPE_SHORT
            | ColumnType::MYSQL_TYPE_INT24
            | ColumnType::MYSQL_TYPE_LONG
            | ColumnType::MYSQL_TYPE_LONGLONG
            | ColumnType::MYSQL_TYPE_YEAR => ColumnKind::Integer { unsigned },
            ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => ColumnKind::Float,
            ColumnType::MYSQL_TYPE_DATE
            | ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_DATETIME2
            | ColumnType::MYSQL_TYPE_TIMESTAMP
            | ColumnType::MYSQL_TYPE_TIMESTAMP2 => ColumnKind::DateTime,
            ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => ColumnKind::Time,
            _ if charset == BINARY_CHARSET => ColumnKind::Binary,
            _ => ColumnKind::Text,
        }
    }
}

// ============================================================================
// Driver -> resql
// ============================================================================

/// Convert a driver row into a [`Row`], keeping column order.
pub fn row_from_driver(row: &mysql_async::Row) -> Row {
    row.columns_ref()
        .iter()
        .enumerate()
        .map(|(index, column)| {
            let value = row
                .as_ref(index)
                .cloned()
                .unwrap_or(mysql_async::Value::NULL);
            (
                column.name_str().into_owned(),
                value_from_driver(value, ColumnKind::of(column)),
            )
        })
        .collect()
}

/// Convert one driver value, using `kind` to decode text-protocol bytes.
pub fn value_from_driver(value: mysql_async::Value, kind: ColumnKind) -> Value {
    use mysql_async::Value as V;

    match value {
        V::NULL => Value::Null,
        V::Int(i) => Value::Int(i),
        V::UInt(u) => Value::UInt(u),
        V::Float(f) => Value::Float(f as f64),
        V::Double(d) => Value::Float(d),
        V::Date(year, month, day, hour, minute, second, micros) => {
            datetime_from_parts(year, month, day, hour, minute, second, micros)
        }
        V::Time(negative, days, hours, minutes, seconds, micros) => {
            let total = ((days as i64 * 24 + hours as i64) * 3600
                + minutes as i64 * 60
                + seconds as i64)
                * MICROS_PER_SECOND
                + micros as i64;
            Value::Time(if negative { -total } else { total })
        }
        V::Bytes(bytes) => value_from_text(bytes, kind),
    }
}

fn datetime_from_parts(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    micros: u32,
) -> Value {
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
        .and_then(|date| date.and_hms_micro_opt(hour as u32, minute as u32, second as u32, micros))
        .map(Value::DateTime)
        // Zero dates ('0000-00-00') have no calendar representation
        .unwrap_or_else(|| {
            Value::String(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                year, month, day, hour, minute, second
            ))
        })
}

fn value_from_text(bytes: Vec<u8>, kind: ColumnKind) -> Value {
    if kind == ColumnKind::Binary {
        return Value::Bytes(bytes);
    }
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return Value::Bytes(e.into_bytes()),
    };

    let parsed = match kind {
        ColumnKind::Integer { unsigned: true } => text.parse::<u64>().ok().map(Value::UInt),
        ColumnKind::Integer { unsigned: false } => text.parse::<i64>().ok().map(Value::Int),
        ColumnKind::Float => text.parse::<f64>().ok().map(Value::Float),
        ColumnKind::DateTime => parse_datetime(&text).map(Value::DateTime),
        ColumnKind::Time => parse_time(&text).map(Value::Time),
        ColumnKind::Binary | ColumnKind::Text => None,
    };
    parsed.unwrap_or(Value::String(text))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Parse `[-]H+:MM:SS[.ffffff]` into signed microseconds.
fn parse_time(text: &str) -> Option<i64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (clock, frac) = match body.split_once('.') {
        Some((clock, frac)) => (clock, Some(frac)),
        None => (body, None),
    };
    let mut parts = clock.split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes > 59 || seconds > 59 {
        return None;
    }
    let micros = match frac {
        Some(frac) if frac.len() <= 6 && frac.bytes().all(|b| b.is_ascii_digit()) => {
            format!("{:0<6}", frac).parse::<i64>().ok()?
        }
        Some(_) => return None,
        None => 0,
    };
    let total = (hours * 3600 + minutes * 60 + seconds) * MICROS_PER_SECOND + micros;
    Some(if negative { -total } else { total })
}

// ============================================================================
// resql -> Driver
// ============================================================================

/// Convert a bind value for the driver.
///
/// # Errors
/// Returns `Error::InvalidInput` for a datetime whose year is outside
/// `0..=9999`, which the wire format cannot carry.
pub fn value_to_driver(value: &Value) -> Result<mysql_async::Value> {
    use mysql_async::Value as V;

    Ok(match value {
        Value::Null => V::NULL,
        Value::Bool(b) => V::Int(*b as i64),
        Value::Int(i) => V::Int(*i),
        Value::UInt(u) => V::UInt(*u),
        Value::Float(f) => V::Double(*f),
        Value::String(s) => V::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => V::Bytes(b.clone()),
        Value::DateTime(dt) => V::Date(
            u16::try_from(dt.year())
                .ok()
                .filter(|year| *year <= 9999)
                .ok_or_else(|| {
                    Error::invalid_input(format!("datetime {} is outside years 0..=9999", dt))
                })?,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1000,
        ),
        Value::Time(micros) => {
            let negative = *micros < 0;
            let total = micros.unsigned_abs();
            let secs = total / MICROS_PER_SECOND as u64;
            V::Time(
                negative,
                (secs / 86_400) as u32,
                ((secs / 3600) % 24) as u8,
                ((secs / 60) % 60) as u8,
                (secs % 60) as u8,
                (total % MICROS_PER_SECOND as u64) as u32,
            )
        }
    })
}

/// Convert bind parameters for the driver, failing on the first value that
/// cannot be sent.
pub fn params_to_driver(params: &Params) -> Result<mysql_async::Params> {
    Ok(match params {
        Params::Empty => mysql_async::Params::Empty,
        Params::Positional(values) => mysql_async::Params::Positional(
            values.iter().map(value_to_driver).collect::<Result<Vec<_>>>()?,
        ),
        Params::Named(values) => mysql_async::Params::from(
            values
                .iter()
                .map(|(name, value)| -> Result<(String, mysql_async::Value)> {
                    Ok((name.clone(), value_to_driver(value)?))
                })
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mysql_async::Value as V;

    fn int() -> ColumnKind {
        ColumnKind::Integer { unsigned: false }
    }

    #[test]
    fn test_column_kind_from_parts() {
        assert_eq!(
            ColumnKind::from_parts(ColumnType::MYSQL_TYPE_LONGLONG, true, 63),
            ColumnKind::Integer { unsigned: true }
        );
        assert_eq!(
            ColumnKind::from_parts(ColumnType::MYSQL_TYPE_DOUBLE, false, 63),
            ColumnKind::Float
        );
        assert_eq!(
            ColumnKind::from_parts(ColumnType::MYSQL_TYPE_BLOB, false, BINARY_CHARSET),
            ColumnKind::Binary
        );
        assert_eq!(
            ColumnKind::from_parts(ColumnType::MYSQL_TYPE_VAR_STRING, false, 255),
            ColumnKind::Text
        );
        assert_eq!(
            ColumnKind::from_parts(ColumnType::MYSQL_TYPE_NEWDECIMAL, false, 63),
            ColumnKind::Text
        );
    }

    #[test]
    fn test_text_protocol_numbers() {
        assert_eq!(value_from_driver(V::Bytes(b"5".to_vec()), int()), Value::Int(5));
        assert_eq!(
            value_from_driver(
                V::Bytes(b"18446744073709551615".to_vec()),
                ColumnKind::Integer { unsigned: true }
            ),
            Value::UInt(u64::MAX)
        );
        assert_eq!(
            value_from_driver(V::Bytes(b"2.5".to_vec()), ColumnKind::Float),
            Value::Float(2.5)
        );
        // DECIMAL stays exact
        assert_eq!(
            value_from_driver(V::Bytes(b"10.10".to_vec()), ColumnKind::Text),
            Value::String("10.10".to_string())
        );
    }

    #[test]
    fn test_binary_protocol_values() {
        assert_eq!(value_from_driver(V::NULL, int()), Value::Null);
        assert_eq!(value_from_driver(V::Int(-3), int()), Value::Int(-3));
        assert_eq!(value_from_driver(V::Double(1.5), ColumnKind::Float), Value::Float(1.5));
        assert_eq!(
            value_from_driver(V::Time(true, 1, 2, 3, 4, 5), ColumnKind::Time),
            Value::Time(-((26 * 3600 + 3 * 60 + 4) * 1_000_000 + 5))
        );
    }

    #[test]
    fn test_datetime_decoding() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_micro_opt(13, 5, 9, 250_000)
            .unwrap();
        assert_eq!(
            value_from_driver(V::Date(2024, 2, 29, 13, 5, 9, 250_000), ColumnKind::DateTime),
            Value::DateTime(expected)
        );
        assert_eq!(
            value_from_driver(V::Bytes(b"2024-02-29 13:05:09.25".to_vec()), ColumnKind::DateTime),
            Value::DateTime(expected)
        );
        assert_eq!(
            value_from_driver(V::Bytes(b"2024-02-29".to_vec()), ColumnKind::DateTime),
            Value::DateTime(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap().and_hms_opt(0, 0, 0).unwrap())
        );
        assert_eq!(
            value_from_driver(V::Date(0, 0, 0, 0, 0, 0, 0), ColumnKind::DateTime),
            Value::String("0000-00-00 00:00:00".to_string())
        );
    }

    #[test]
    fn test_time_text_parsing() {
        assert_eq!(parse_time("838:59:59"), Some(838 * 3600 * 1_000_000 + 59 * 60 * 1_000_000 + 59 * 1_000_000));
        assert_eq!(parse_time("-00:00:01.5"), Some(-1_500_000));
        assert_eq!(parse_time("12:61:00"), None);
        assert_eq!(parse_time("nonsense"), None);
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_bytes() {
        assert_eq!(
            value_from_driver(V::Bytes(vec![0xff, 0xfe]), ColumnKind::Text),
            Value::Bytes(vec![0xff, 0xfe])
        );
    }

    #[test]
    fn test_bind_values() {
        assert_eq!(value_to_driver(&Value::Bool(true)).unwrap(), V::Int(1));
        assert_eq!(value_to_driver(&Value::from("abc")).unwrap(), V::Bytes(b"abc".to_vec()));
        assert_eq!(
            value_to_driver(&Value::Time(-1_500_000)).unwrap(),
            V::Time(true, 0, 0, 0, 1, 500_000)
        );

        let dt = NaiveDate::from_ymd_opt(2023, 12, 31)
            .unwrap()
            .and_hms_micro_opt(23, 59, 58, 7)
            .unwrap();
        assert_eq!(
            value_to_driver(&Value::DateTime(dt)).unwrap(),
            V::Date(2023, 12, 31, 23, 59, 58, 7)
        );
    }

    #[test]
    fn test_out_of_range_year_is_rejected_not_clamped() {
        for year in [-1, 10_000] {
            let dt = NaiveDate::from_ymd_opt(year, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap();
            let err = value_to_driver(&Value::DateTime(dt)).unwrap_err();
            assert!(matches!(err, Error::InvalidInput { .. }), "year {}", year);

            let params = Params::Positional(vec![Value::Int(1), Value::DateTime(dt)]);
            assert!(params_to_driver(&params).is_err());
        }
    }

    #[test]
    fn test_params_shapes() {
        assert_eq!(params_to_driver(&Params::Empty).unwrap(), mysql_async::Params::Empty);
        assert_eq!(
            params_to_driver(&Params::Positional(vec![Value::Int(1)])).unwrap(),
            mysql_async::Params::Positional(vec![V::Int(1)])
        );
        assert!(matches!(
            params_to_driver(&Params::Named(vec![("table".to_string(), Value::from("t"))])),
            Ok(mysql_async::Params::Named(_))
        ));
    }
}
