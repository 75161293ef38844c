//! Column value decoding and display rendering.
//!
//! Rows come back from the endpoint in binary format. Every column is read as
//! raw bytes and decoded here by its wire type, then rendered to the display
//! string that ends up in a [`Row`]. Booleans render as `true`/`false` and
//! integers as plain decimal digits, independent of the endpoint's own text
//! output.

use std::error::Error;
use std::fmt;

use base64::Engine;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use tokio_postgres::types::{FromSql, Kind, Type};

use crate::error::{CliError, CliResult};
use crate::result::Row;

type DecodeError = Box<dyn Error + Sync + Send>;

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float32(f32),
    Float(f64),
    /// Exact decimal, already rendered (NUMERIC has no native Rust type).
    Numeric(String),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Numeric(s) | Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(
                f,
                "{}",
                base64::engine::general_purpose::STANDARD.encode(b)
            ),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Timestamp(ts) => {
                write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Json(v) => write!(f, "{}", v),
            Value::Array(elems) => {
                write!(f, "[")?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", e)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Borrowed column bytes, accepted for every wire type.
struct RawValue<'a>(&'a [u8]);

impl<'a> FromSql<'a> for RawValue<'a> {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        Ok(RawValue(raw))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

/// Domains decode as their base type.
fn base_type(ty: &Type) -> &Type {
    match ty.kind() {
        Kind::Domain(inner) => base_type(inner),
        _ => ty,
    }
}

/// Decode one non-null value of wire type `ty`.
pub fn decode_value(ty: &Type, raw: &[u8]) -> Result<Value, DecodeError> {
    let ty = base_type(ty);
    let value = match *ty {
        Type::BOOL => Value::Bool(bool::from_sql(ty, raw)?),
        Type::INT2 => Value::Int(i16::from_sql(ty, raw)? as i64),
        Type::INT4 => Value::Int(i32::from_sql(ty, raw)? as i64),
        Type::INT8 => Value::Int(i64::from_sql(ty, raw)?),
        Type::OID => Value::Int(u32::from_sql(ty, raw)? as i64),
        Type::FLOAT4 => Value::Float32(f32::from_sql(ty, raw)?),
        Type::FLOAT8 => Value::Float(f64::from_sql(ty, raw)?),
        Type::NUMERIC => Value::Numeric(decode_numeric(raw)?),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
            Value::Text(String::from_sql(ty, raw)?)
        }
        Type::CHAR => Value::Text(char::from(i8::from_sql(ty, raw)? as u8).to_string()),
        Type::BYTEA => Value::Bytes(Vec::<u8>::from_sql(ty, raw)?),
        Type::DATE => Value::Date(NaiveDate::from_sql(ty, raw)?),
        Type::TIMESTAMP => Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?.and_utc()),
        Type::TIMESTAMPTZ => Value::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?),
        Type::JSON | Type::JSONB => Value::Json(serde_json::Value::from_sql(ty, raw)?),
        _ => match ty.kind() {
            Kind::Array(member) => {
                let elems = Vec::<Option<RawValue<'_>>>::from_sql(ty, raw)?;
                let mut out = Vec::with_capacity(elems.len());
                for elem in elems {
                    out.push(match elem {
                        Some(RawValue(bytes)) => decode_value(member, bytes)?,
                        None => Value::Null,
                    });
                }
                Value::Array(out)
            }
            _ => return Err(format!("unsupported type {}", ty.name()).into()),
        },
    };
    Ok(value)
}

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Render the binary NUMERIC format exactly.
///
/// Layout: ndigits (i16), weight (i16), sign (u16), dscale (u16), then
/// `ndigits` base-10000 digits. Digit `k` has base-10000 exponent
/// `weight - k`.
pub fn decode_numeric(raw: &[u8]) -> Result<String, DecodeError> {
    if raw.len() < 8 {
        return Err("numeric value too short".into());
    }
    let read_u16 = |at: usize| u16::from_be_bytes([raw[at], raw[at + 1]]);
    let ndigits = read_u16(0) as i16;
    let weight = read_u16(2) as i16 as i32;
    let sign = read_u16(4);
    let dscale = read_u16(6) as usize;

    match sign {
        NUMERIC_NAN => return Ok("NaN".to_string()),
        NUMERIC_PINF => return Ok("Infinity".to_string()),
        NUMERIC_NINF => return Ok("-Infinity".to_string()),
        NUMERIC_POS | NUMERIC_NEG => {}
        other => return Err(format!("invalid numeric sign 0x{:04x}", other).into()),
    }
    if ndigits < 0 || raw.len() != 8 + 2 * ndigits as usize {
        return Err("numeric digit count does not match payload".into());
    }

    let digits: Vec<u16> = (0..ndigits as usize)
        .map(|k| read_u16(8 + 2 * k))
        .collect();
    if digits.iter().any(|d| *d >= 10_000) {
        return Err("numeric digit out of range".into());
    }
    let digit_at = |exp: i32| -> u16 {
        let k = weight - exp;
        if k >= 0 && (k as usize) < digits.len() {
            digits[k as usize]
        } else {
            0
        }
    };

    let mut out = String::new();
    if sign == NUMERIC_NEG && !digits.iter().all(|d| *d == 0) {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for exp in (0..=weight).rev() {
            let d = digit_at(exp);
            if exp == weight {
                out.push_str(&d.to_string());
            } else {
                out.push_str(&format!("{:04}", d));
            }
        }
    }

    if dscale > 0 {
        let mut frac = String::with_capacity(dscale + 4);
        let mut exp = -1;
        while frac.len() < dscale {
            frac.push_str(&format!("{:04}", digit_at(exp)));
            exp -= 1;
        }
        frac.truncate(dscale);
        out.push('.');
        out.push_str(&frac);
    }
    Ok(out)
}

/// Render every column of a row to its display string.
pub fn decode_row(row: &tokio_postgres::Row) -> CliResult<Row> {
    let mut columns = Vec::with_capacity(row.len());
    for (idx, col) in row.columns().iter().enumerate() {
        let raw: Option<RawValue<'_>> = row.try_get(idx)?;
        let value = match raw {
            None => Value::Null,
            Some(RawValue(bytes)) => {
                decode_value(col.type_(), bytes).map_err(|e| CliError::Decode {
                    column: col.name().to_string(),
                    type_name: col.type_().name().to_string(),
                    reason: e.to_string(),
                })?
            }
        };
        columns.push(value.to_string());
    }
    Ok(Row::new(columns))
}
