//! The polymorphic cell type (spec §3, §9: "many concrete value classes with
//! shared abstract behavior → model as a sum type").

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    fn bits(self) -> u32 {
        match self {
            IntWidth::W8 => 8,
            IntWidth::W16 => 16,
            IntWidth::W32 => 32,
            IntWidth::W64 => 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    F32,
    F64,
}

/// Byte↔char conversion target for `asBytes`/`asString`. A deliberately small
/// menu (UTF-8 and plain ASCII) — the full JDK charset registry has no
/// counterpart crate in this ecosystem worth depending on for this purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    Utf8,
    Ascii,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int {
        value: i64,
        width: IntWidth,
        signed: bool,
    },
    Float {
        value: f64,
        width: FloatWidth,
    },
    BigInt(i128),
    BigDec(BigDecimal),
    Date(NaiveDate),
    /// `scale` is normalized into `0..=9` at construction time.
    Time(NaiveTime, u32),
    DateTime(NaiveDateTime, u32),
    String(String),
    Bytes(Vec<u8>),
    Object(serde_json::Value),
}

fn truncate_int(value: i64, width: IntWidth, signed: bool) -> i64 {
    let bits = width.bits();
    if bits >= 64 {
        return value;
    }
    let mask: i128 = (1i128 << bits) - 1;
    let truncated = (value as i128) & mask;
    if signed {
        let sign_bit = 1i128 << (bits - 1);
        if truncated & sign_bit != 0 {
            (truncated - (1i128 << bits)) as i64
        } else {
            truncated as i64
        }
    } else {
        truncated as i64
    }
}

fn truncate_nanos(nanos: u32, scale: u32) -> u32 {
    let scale = scale.min(9);
    let divisor = 10u32.pow(9 - scale);
    (nanos / divisor) * divisor
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn int(value: i64) -> Self {
        Value::Int {
            value,
            width: IntWidth::W64,
            signed: true,
        }
    }

    /// Builds an `Int` at a specific width/signedness, masking `value` down
    /// to that shape immediately (spec §3: "unsigned integer variants mask
    /// with the appropriate width") rather than carrying an unmasked value
    /// alongside a width/signed tag nothing ever consults.
    pub fn int_sized(value: i64, width: IntWidth, signed: bool) -> Self {
        Value::Int {
            value: truncate_int(value, width, signed),
            width,
            signed,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn time_with_scale(time: NaiveTime, scale: u32) -> Self {
        Value::Time(time, scale.min(9))
    }

    pub fn date_time_with_scale(dt: NaiveDateTime, scale: u32) -> Self {
        Value::DateTime(dt, scale.min(9))
    }

    fn numeric_as_i64(&self) -> Option<i64> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(*b as i64),
            Value::Int { value, .. } => Some(*value),
            Value::Float { value, .. } => Some(*value as i64),
            Value::BigInt(v) => Some(*v as i64),
            Value::BigDec(v) => v.to_string().parse::<f64>().ok().map(|f| f as i64),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int { value, .. } => *value != 0,
            Value::Float { value, .. } => *value != 0.0,
            Value::String(s) => matches!(s.to_ascii_lowercase().as_str(), "true" | "t" | "1" | "yes"),
            _ => self.numeric_as_i64().map(|v| v != 0).unwrap_or(false),
        }
    }

    pub fn as_byte(&self) -> i8 {
        truncate_int(self.numeric_as_i64().unwrap_or(0), IntWidth::W8, true) as i8
    }

    pub fn as_short(&self) -> i16 {
        truncate_int(self.numeric_as_i64().unwrap_or(0), IntWidth::W16, true) as i16
    }

    pub fn as_int(&self) -> i32 {
        truncate_int(self.numeric_as_i64().unwrap_or(0), IntWidth::W32, true) as i32
    }

    pub fn as_long(&self) -> i64 {
        self.numeric_as_i64().unwrap_or(0)
    }

    pub fn as_float(&self) -> f32 {
        self.as_double() as f32
    }

    pub fn as_double(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Float { value, .. } => *value,
            Value::Int { value, .. } => *value as f64,
            Value::BigInt(v) => *v as f64,
            Value::BigDec(v) => v.to_string().parse().unwrap_or(0.0),
            Value::String(s) => s.trim().parse().unwrap_or(0.0),
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Null → `None`: big integers are one of the types the conversion
    /// contract exempts from returning a primitive default.
    pub fn as_big_integer(&self) -> Option<i128> {
        match self {
            Value::Null => None,
            Value::BigInt(v) => Some(*v),
            Value::Int { value, .. } => Some(*value as i128),
            Value::BigDec(v) => v.to_string().parse().ok(),
            Value::String(s) => s.trim().parse().ok(),
            _ => Some(self.numeric_as_i64().unwrap_or(0) as i128),
        }
    }

    pub fn as_big_decimal(&self, scale: i64) -> Option<BigDecimal> {
        let raw = match self {
            Value::Null => return None,
            Value::BigDec(v) => v.clone(),
            Value::Int { value, .. } => BigDecimal::from(*value),
            Value::BigInt(v) => BigDecimal::from_str(&v.to_string()).ok()?,
            Value::Float { value, .. } => BigDecimal::from_str(&value.to_string()).ok()?,
            Value::String(s) => BigDecimal::from_str(s.trim()).ok()?,
            _ => return None,
        };
        Some(raw.with_scale(scale))
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Null => None,
            Value::Date(d) => Some(*d),
            Value::DateTime(dt, _) => Some(dt.date()),
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    pub fn as_time(&self, scale: u32) -> Option<NaiveTime> {
        match self {
            Value::Null => None,
            Value::Time(t, _) => Some(t.with_nanosecond(truncate_nanos(t.nanosecond(), scale))?),
            Value::DateTime(dt, _) => {
                let t = dt.time();
                Some(t.with_nanosecond(truncate_nanos(t.nanosecond(), scale))?)
            }
            Value::String(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f").ok(),
            _ => None,
        }
    }

    pub fn as_date_time(&self, scale: u32) -> Option<NaiveDateTime> {
        match self {
            Value::Null => None,
            Value::DateTime(dt, _) => {
                let t = dt.time();
                let truncated = t.with_nanosecond(truncate_nanos(t.nanosecond(), scale))?;
                Some(NaiveDateTime::new(dt.date(), truncated))
            }
            Value::Date(d) => Some(NaiveDateTime::new(*d, NaiveTime::MIN)),
            Value::String(s) => NaiveDateTime::parse_from_str(s.trim(), "%Y-%m-%d %H:%M:%S%.f").ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self, charset: Charset) -> Option<Vec<u8>> {
        match self {
            Value::Null => None,
            Value::Bytes(b) => Some(b.clone()),
            Value::String(s) => Some(encode_charset(s, charset)),
            _ => Some(encode_charset(&self.as_string(charset), charset)),
        }
    }

    pub fn as_string(&self, charset: Charset) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Int { value, .. } => value.to_string(),
            Value::Float { value, .. } => value.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::BigDec(v) => v.to_string(),
            Value::Date(d) => d.to_string(),
            Value::Time(t, _) => t.to_string(),
            Value::DateTime(dt, _) => dt.to_string(),
            Value::Bytes(b) => decode_charset(b, charset),
            Value::Object(v) => v.to_string(),
        }
    }

    /// Null → `None`: objects are exempt from the primitive-default rule.
    pub fn as_object(&self) -> Option<serde_json::Value> {
        match self {
            Value::Null => None,
            Value::Object(v) => Some(v.clone()),
            other => Some(other.to_json_value()),
        }
    }

    fn to_json_value(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int { value, .. } => serde_json::json!(*value),
            Value::Float { value, .. } => serde_json::json!(*value),
            Value::BigInt(v) => serde_json::Value::String(v.to_string()),
            Value::BigDec(v) => serde_json::Value::String(v.to_string()),
            Value::Date(d) => serde_json::Value::String(d.to_string()),
            Value::Time(t, _) => serde_json::Value::String(t.to_string()),
            Value::DateTime(dt, _) => serde_json::Value::String(dt.to_string()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(decode_charset(b, Charset::Utf8)),
            Value::Object(v) => v.clone(),
        }
    }

    /// RFC-8259 JSON encoding of the value.
    pub fn to_json_expression(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Single-quoted SQL literal; embedded quotes are doubled, `NULL` is
    /// rendered literally (unquoted) for the null cell.
    pub fn to_sql_expression(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int { value, .. } => value.to_string(),
            Value::Float { value, .. } => value.to_string(),
            Value::BigInt(v) => v.to_string(),
            Value::BigDec(v) => v.to_string(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Date(d) => format!("'{d}'"),
            Value::Time(t, _) => format!("'{t}'"),
            Value::DateTime(dt, _) => format!("'{dt}'"),
            Value::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
                format!("X'{hex}'")
            }
            Value::Object(v) => format!("'{}'", v.to_string().replace('\'', "''")),
        }
    }
}

fn encode_charset(s: &str, charset: Charset) -> Vec<u8> {
    match charset {
        Charset::Utf8 => s.as_bytes().to_vec(),
        Charset::Ascii => s.chars().filter(|c| c.is_ascii()).map(|c| c as u8).collect(),
    }
}

fn decode_charset(bytes: &[u8], charset: Charset) -> String {
    match charset {
        Charset::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        Charset::Ascii => bytes.iter().filter(|b| b.is_ascii()).map(|&b| b as char).collect(),
    }
}

use chrono::Timelike;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_primitive_defaults() {
        assert_eq!(Value::Null.as_int(), 0);
        assert_eq!(Value::Null.as_string(Charset::Utf8), "");
        assert!(!Value::Null.as_bool());
    }

    #[test]
    fn null_exempt_types_return_none() {
        assert_eq!(Value::Null.as_big_integer(), None);
        assert_eq!(Value::Null.as_big_decimal(2), None);
        assert_eq!(Value::Null.as_date(), None);
        assert_eq!(Value::Null.as_object(), None);
        assert_eq!(Value::Null.as_bytes(Charset::Utf8), None);
    }

    #[test]
    fn integer_narrowing_is_twos_complement() {
        let v = Value::int(300);
        assert_eq!(v.as_byte(), 300i64 as i8);
    }

    #[test]
    fn int_sized_masks_unsigned_narrow_width_at_construction() {
        let v = Value::int_sized(-1, IntWidth::W16, false);
        match v {
            Value::Int { value, width, signed } => {
                assert_eq!(value, 0xFFFF);
                assert_eq!(width, IntWidth::W16);
                assert!(!signed);
            }
            _ => panic!("expected Int"),
        }
    }

    #[test]
    fn sql_expression_quotes_and_escapes() {
        assert_eq!(Value::string("O'Brien").to_sql_expression(), "'O''Brien'");
        assert_eq!(Value::Null.to_sql_expression(), "NULL");
    }

    #[test]
    fn json_expression_round_trips_through_serde() {
        let v = Value::string("hi");
        assert_eq!(v.to_json_expression(), "\"hi\"");
        assert_eq!(Value::int(5).to_json_expression(), "5");
    }

    #[test]
    fn time_scale_truncates_nanos() {
        let t = NaiveTime::from_hms_nano_opt(1, 2, 3, 123_456_789).unwrap();
        let v = Value::time_with_scale(t, 3);
        let truncated = v.as_time(3).unwrap();
        assert_eq!(truncated.nanosecond(), 123_000_000);
    }
}
