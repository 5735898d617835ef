use crate::error::{ProcessingError, Result};
use chrono::NaiveDateTime;
use serde::de::Error;
use serde::{Deserialize, Deserializer};
use std::borrow::Cow;

pub const APP_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// German month tokens as they appear in the legacy exports.
const GERMAN_MONTHS: [(&str, &str); 12] = [
    ("Jan.", "Jan"),
    ("Feb.", "Feb"),
    ("März", "Mar"),
    ("Apr.", "Apr"),
    ("Mai", "May"),
    ("Juni", "Jun"),
    ("Juli", "Jul"),
    ("Aug.", "Aug"),
    ("Sep.", "Sep"),
    ("Okt.", "Oct"),
    ("Nov.", "Nov"),
    ("Dez.", "Dec"),
];

const TIMESTAMP_FORMATS: [&str; 13] = [
    APP_DATETIME_FORMAT,
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d. %b %Y %H:%M:%S",
    "%d. %b %Y %H:%M",
    "%d.%b %Y %H:%M",
    "%d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M",
    "%b %d, %Y %H:%M:%S",
    "%b %d, %Y %H:%M",
    "%d/%m/%Y %H:%M",
];

/// Replace German month names with the English abbreviations chrono understands.
///
/// Only a whole whitespace-separated token is translated, or the tail of a
/// compact `10.Mai` day-month token.
pub fn translate_german_months(raw: &str) -> String {
    raw.split_whitespace()
        .map(translate_month_token)
        .collect::<Vec<_>>()
        .join(" ")
}

fn translate_month_token(token: &str) -> Cow<'_, str> {
    for (german, english) in GERMAN_MONTHS {
        if token == german {
            return Cow::Borrowed(english);
        }
        if let Some(day) = token.strip_suffix(german) {
            let compact_day = day.strip_suffix('.').is_some_and(|digits| {
                !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
            });
            if compact_day {
                return Cow::Owned(format!("{}{}", day, english));
            }
        }
    }
    Cow::Borrowed(token)
}

/// Parse an export timestamp, accepting the mix of formats found across vintages.
pub fn parse_export_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let translated = translate_german_months(raw);

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&translated, format).ok())
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Unrecognized timestamp: '{}'", raw)))
}

pub fn parse_config_timestamp(raw: &str) -> Result<NaiveDateTime> {
    Ok(NaiveDateTime::parse_from_str(raw.trim(), APP_DATETIME_FORMAT)?)
}

pub fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_config_timestamp(&raw).map_err(|e| D::Error::custom(format!("Invalid timestamp: {e}")))
}

pub fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| {
        parse_config_timestamp(&value)
            .map_err(|e| D::Error::custom(format!("Invalid timestamp: {e}")))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_german_month_names() {
        assert_eq!(
            parse_export_timestamp("10. Mai 2016 03:00").unwrap(),
            at(2016, 5, 10, 3)
        );
        assert_eq!(
            parse_export_timestamp("01. Okt. 2019 23:00").unwrap(),
            at(2019, 10, 1, 23)
        );
        assert_eq!(
            parse_export_timestamp("15. März 2020 12:00").unwrap(),
            at(2020, 3, 15, 12)
        );
    }

    #[test]
    fn test_month_translation_is_token_anchored() {
        assert_eq!(translate_german_months("10. Mai 2016 03:00"), "10. May 2016 03:00");
        assert_eq!(translate_german_months("10.Mai 2016 03:00"), "10.May 2016 03:00");
        assert_eq!(translate_german_months("Maibaum 2016"), "Maibaum 2016");
        assert_eq!(translate_german_months("Ende.Juni"), "Ende.Juni");
        assert_eq!(
            parse_export_timestamp("3.Juli 2018 14:00").unwrap(),
            at(2018, 7, 3, 14)
        );
    }

    #[test]
    fn test_parse_numeric_formats() {
        assert_eq!(
            parse_export_timestamp("2021-06-18 00:00:00").unwrap(),
            at(2021, 6, 18, 0)
        );
        assert_eq!(
            parse_export_timestamp("18.06.2021 07:00").unwrap(),
            at(2021, 6, 18, 7)
        );
    }

    #[test]
    fn test_unparseable_timestamp() {
        assert!(parse_export_timestamp("gestern um neun").is_err());
        assert!(parse_export_timestamp("").is_err());
    }
}
