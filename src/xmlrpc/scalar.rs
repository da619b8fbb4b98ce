// Copyright 2014-2015 Galen Clark Haynes
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

// Rust XML-RPC library

//! Text conversions for the atomic types.

use std::borrow::Cow;
use std::fmt::{Display, LowerExp};
use std::str::FromStr;
use std::sync::OnceLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use num::BigInt;
use regex::Regex;
use time::{Date, Month, PrimitiveDateTime, Time};

use crate::xmlrpc::registry::TypeKind;
use crate::xmlrpc::value::Value;

/// Converts the text content of a `kind` element. The error is a
/// human-readable reason; callers attach the text and location.
pub fn parse_scalar(kind: TypeKind, text: &str) -> Result<Value, String> {
    match kind {
        TypeKind::Boolean => parse_boolean(text).map(Value::Boolean),
        TypeKind::Int => parse_number(text).map(Value::Int),
        TypeKind::Byte => parse_number(text).map(Value::Byte),
        TypeKind::Short => parse_number(text).map(Value::Short),
        TypeKind::Long => parse_number(text).map(Value::Long),
        TypeKind::Double => parse_number(text).map(Value::Double),
        TypeKind::Float => parse_number(text).map(Value::Float),
        TypeKind::BigInteger => parse_number::<BigInt>(text).map(Value::BigInteger),
        TypeKind::String => Ok(Value::String(text.to_string())),
        TypeKind::DateTime => parse_datetime(text).map(Value::DateTime),
        TypeKind::Base64 => parse_base64(text).map(Value::Base64),
        TypeKind::Nil | TypeKind::Array | TypeKind::Struct | TypeKind::Dom => {
            Err(format!("{} is not an atomic type", kind))
        }
    }
}

/// Text content for an atomic value, unescaped. Returns None for nil and
/// the composite kinds.
pub fn format_scalar(value: &Value) -> Option<Cow<str>> {
    let text = match *value {
        Value::Boolean(b) => Cow::Borrowed(if b { "1" } else { "0" }),
        Value::Int(n) => Cow::Owned(n.to_string()),
        Value::Byte(n) => Cow::Owned(n.to_string()),
        Value::Short(n) => Cow::Owned(n.to_string()),
        Value::Long(n) => Cow::Owned(n.to_string()),
        Value::Double(n) => Cow::Owned(format_float(n)),
        Value::Float(n) => Cow::Owned(format_float(n)),
        Value::BigInteger(ref n) => Cow::Owned(n.to_string()),
        Value::String(ref s) => Cow::Borrowed(s.as_str()),
        Value::DateTime(dt) => Cow::Owned(format_datetime(dt)),
        Value::Base64(ref bytes) => Cow::Owned(STANDARD.encode(bytes)),
        Value::Nil | Value::Array(_) | Value::Struct(_) | Value::Dom(_) => return None,
    };
    Some(text)
}

/// Plain decimal for ordinary magnitudes, exponent form outside of them.
/// The non-finite values use the spellings `parse_number` reads back.
fn format_float<T>(n: T) -> String
    where T: Display + LowerExp + Into<f64> + Copy
{
    let x: f64 = n.into();
    if x.is_nan() {
        "NaN".to_string()
    } else if x.is_infinite() {
        if x > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if x == 0.0 || (1e-7..1e21).contains(&x.abs()) {
        n.to_string()
    } else {
        format!("{:e}", n)
    }
}

fn parse_number<T>(text: &str) -> Result<T, String>
    where T: FromStr,
          T::Err: Display
{
    text.trim().parse::<T>().map_err(|e| e.to_string())
}

fn parse_boolean(text: &str) -> Result<bool, String> {
    match text.trim() {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err("expected 0 or 1".to_string()),
    }
}

fn parse_base64(text: &str) -> Result<Vec<u8>, String> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| e.to_string())
}

fn datetime_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d{4})-?(\d{2})-?(\d{2})T(\d{2}):(\d{2}):(\d{2})$")
            .expect("dateTime pattern is valid")
    })
}

/// Parses `YYYYMMDDTHH:MM:SS`; dashes between the date fields are allowed.
pub fn parse_datetime(text: &str) -> Result<PrimitiveDateTime, String> {
    let caps = datetime_pattern()
        .captures(text.trim())
        .ok_or_else(|| "expected YYYYMMDDTHH:MM:SS".to_string())?;
    let field = |idx: usize| -> Result<u8, String> { caps[idx].parse::<u8>().map_err(|e| e.to_string()) };

    let year = caps[1].parse::<i32>().map_err(|e| e.to_string())?;
    let month = Month::try_from(field(2)?).map_err(|e| e.to_string())?;
    let date = Date::from_calendar_date(year, month, field(3)?).map_err(|e| e.to_string())?;
    let time = Time::from_hms(field(4)?, field(5)?, field(6)?).map_err(|e| e.to_string())?;
    Ok(PrimitiveDateTime::new(date, time))
}

pub fn format_datetime(dt: PrimitiveDateTime) -> String {
    format!("{:04}{:02}{:02}T{:02}:{:02}:{:02}",
            dt.year(),
            u8::from(dt.month()),
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second())
}
