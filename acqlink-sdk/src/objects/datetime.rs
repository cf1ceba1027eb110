//! Serde helpers for the loosely typed scalar fields the gateway emits.
//!
//! The gateway is not consistent about timestamps (sometimes RFC 3339 with an
//! offset, sometimes a bare local timestamp that is implicitly UTC), and it
//! sends decimals, codes and ids either as JSON strings or as numbers. Empty
//! strings mean "absent" for timestamps and decimals.

use rust_decimal::Decimal;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};
use std::str::FromStr;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Parse a gateway timestamp.
///
/// Accepts RFC 3339 (`2024-07-16T06:20:53.281Z`) and bare local timestamps
/// (`2025-08-22T06:44:01.980`), the latter interpreted as UTC.
pub fn parse_gateway_instant(raw: &str) -> Result<OffsetDateTime, time::error::Parse> {
    match OffsetDateTime::parse(raw, &Rfc3339) {
        Ok(instant) => Ok(instant),
        Err(_) => {
            let bare = format_description!(
                "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
            );
            PrimitiveDateTime::parse(raw, &bare).map(PrimitiveDateTime::assume_utc)
        }
    }
}

/// Parse a `YYYY-MM-DD` settlement date.
pub fn parse_settlement_date(raw: &str) -> Result<Date, time::error::Parse> {
    Date::parse(raw, &format_description!("[year]-[month]-[day]"))
}

fn non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

/// `Option<OffsetDateTime>` in either gateway timestamp form.
pub mod gateway_instant {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match non_empty(deserializer)? {
            Some(raw) => parse_gateway_instant(raw.trim())
                .map(Some)
                .map_err(|e| de::Error::custom(format!("invalid gateway timestamp `{raw}`: {e}"))),
            None => Ok(None),
        }
    }

    pub fn serialize<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(instant) => {
                let text = instant
                    .format(&Rfc3339)
                    .map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&text)
            }
            None => serializer.serialize_none(),
        }
    }
}

/// `Option<Date>` as `YYYY-MM-DD`.
pub mod settlement_date {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Date>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match non_empty(deserializer)? {
            Some(raw) => parse_settlement_date(raw.trim())
                .map(Some)
                .map_err(|e| de::Error::custom(format!("invalid settlement date `{raw}`: {e}"))),
            None => Ok(None),
        }
    }

    pub fn serialize<S>(value: &Option<Date>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(date) => {
                let text = date
                    .format(&format_description!("[year]-[month]-[day]"))
                    .map_err(serde::ser::Error::custom)?;
                serializer.serialize_some(&text)
            }
            None => serializer.serialize_none(),
        }
    }
}

/// `Option<Decimal>` from a JSON string or number. The scale of string
/// input is kept as received.
pub mod lenient_decimal {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDecimal {
        Text(String),
        Number(serde_json::Number),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = match Option::<RawDecimal>::deserialize(deserializer)? {
            None => return Ok(None),
            Some(RawDecimal::Text(text)) if text.trim().is_empty() => return Ok(None),
            Some(RawDecimal::Text(text)) => text,
            Some(RawDecimal::Number(number)) => number.to_string(),
        };
        let trimmed = raw.trim();
        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map(Some)
            .map_err(|e| de::Error::custom(format!("invalid decimal `{raw}`: {e}")))
    }

    pub fn serialize<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(amount) => serializer.serialize_some(&amount.to_string()),
            None => serializer.serialize_none(),
        }
    }
}

/// `Option<String>` from a JSON string, number or boolean.
///
/// Numbers keep their JSON rendering, so `0` reads as `"0"`. Objects and
/// arrays are kept as compact JSON text.
pub mod lenient_string {
    use super::*;
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
        })
    }

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(text) => serializer.serialize_some(text),
            None => serializer.serialize_none(),
        }
    }
}

/// `u16` status code from a JSON number or numeric string.
///
/// `null`, blanks and anything that is not a valid code read as `0`, the
/// same as a missing code.
pub mod lenient_status_code {
    use super::*;
    use serde_json::Value;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u16, D::Error>
    where
        D: Deserializer<'de>,
    {
        let code = match Option::<Value>::deserialize(deserializer)? {
            Some(Value::Number(number)) => number
                .as_u64()
                .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
                .and_then(|n| u16::try_from(n).ok()),
            Some(Value::String(text)) => text.trim().parse::<u16>().ok(),
            _ => None,
        };
        Ok(code.unwrap_or_else(|| {
            tracing::debug!("Unreadable gateway status code, treating as 0");
            0
        }))
    }

    pub fn serialize<S>(value: &u16, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Debug, Deserialize, Serialize)]
    struct Sample {
        #[serde(default, with = "gateway_instant")]
        date: Option<OffsetDateTime>,
        #[serde(default, with = "settlement_date")]
        settlement: Option<Date>,
        #[serde(default, with = "lenient_decimal")]
        amount: Option<Decimal>,
    }

    #[test]
    fn zoned_and_bare_timestamps_are_the_same_instant() {
        let zoned = parse_gateway_instant("2024-07-16T06:20:53.281Z").unwrap();
        let bare = parse_gateway_instant("2024-07-16T06:20:53.281").unwrap();
        assert_eq!(zoned, bare);
        assert_eq!(bare.offset(), time::UtcOffset::UTC);
    }

    #[test]
    fn bare_timestamp_without_fraction_is_accepted() {
        let instant = parse_gateway_instant("2025-08-05T15:40:22").unwrap();
        assert_eq!(instant.unix_timestamp(), 1_754_408_422);
    }

    #[test]
    fn offset_is_honoured() {
        let shifted = parse_gateway_instant("2024-07-16T08:20:53+02:00").unwrap();
        let utc = parse_gateway_instant("2024-07-16T06:20:53Z").unwrap();
        assert_eq!(shifted, utc);
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        assert!(parse_gateway_instant("yesterday").is_err());
        let result: Result<Sample, _> = serde_json::from_str(r#"{"date":"16/07/2024"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn empty_strings_decode_to_none() {
        let sample: Sample =
            serde_json::from_str(r#"{"date":"","settlement":" ","amount":""}"#).unwrap();
        assert!(sample.date.is_none());
        assert!(sample.settlement.is_none());
        assert!(sample.amount.is_none());
    }

    #[test]
    fn missing_and_null_fields_decode_to_none() {
        let sample: Sample = serde_json::from_str(r#"{"date":null}"#).unwrap();
        assert!(sample.date.is_none());
        assert!(sample.settlement.is_none());
        assert!(sample.amount.is_none());
    }

    #[test]
    fn decimals_accept_strings_and_numbers() {
        let text: Sample = serde_json::from_str(r#"{"amount":"25.00"}"#).unwrap();
        let amount = text.amount.unwrap();
        assert_eq!(amount, Decimal::new(2500, 2));
        assert_eq!(amount.to_string(), "25.00");

        let number: Sample = serde_json::from_str(r#"{"amount":10.12}"#).unwrap();
        assert_eq!(number.amount.unwrap(), Decimal::new(1012, 2));
    }

    #[test]
    fn settlement_date_round_trips_as_plain_date() {
        let sample: Sample = serde_json::from_str(r#"{"settlement":"2024-07-23"}"#).unwrap();
        let date = sample.settlement.unwrap();
        assert_eq!(date, time::macros::date!(2024 - 07 - 23));

        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["settlement"], "2024-07-23");
    }

    #[derive(Debug, Deserialize)]
    struct Coded {
        #[serde(default, with = "lenient_status_code")]
        code: u16,
        #[serde(default, with = "lenient_string")]
        result: Option<String>,
    }

    #[test]
    fn status_code_accepts_numbers_and_numeric_strings() {
        let number: Coded = serde_json::from_str(r#"{"code":200}"#).unwrap();
        assert_eq!(number.code, 200);
        let text: Coded = serde_json::from_str(r#"{"code":" 210 "}"#).unwrap();
        assert_eq!(text.code, 210);
        let float: Coded = serde_json::from_str(r#"{"code":201.0}"#).unwrap();
        assert_eq!(float.code, 201);
    }

    #[test]
    fn unreadable_status_code_is_zero() {
        for json in [
            r#"{"code":null}"#,
            r#"{"code":""}"#,
            r#"{"code":"OK"}"#,
            r#"{"code":-1}"#,
            r#"{"code":70000}"#,
            r#"{"code":{"nested":1}}"#,
            r#"{}"#,
        ] {
            let coded: Coded = serde_json::from_str(json).unwrap();
            assert_eq!(coded.code, 0, "{json}");
        }
    }

    #[test]
    fn strings_accept_numbers_and_booleans() {
        let number: Coded = serde_json::from_str(r#"{"result":0}"#).unwrap();
        assert_eq!(number.result.as_deref(), Some("0"));
        let text: Coded = serde_json::from_str(r#"{"result":"11"}"#).unwrap();
        assert_eq!(text.result.as_deref(), Some("11"));
        let flag: Coded = serde_json::from_str(r#"{"result":true}"#).unwrap();
        assert_eq!(flag.result.as_deref(), Some("true"));
        let null: Coded = serde_json::from_str(r#"{"result":null}"#).unwrap();
        assert!(null.result.is_none());
    }
}
