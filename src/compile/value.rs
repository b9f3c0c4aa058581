//! Typed value coercion
//!
//! Raw query values are plain text. Before a condition is built they are
//! coerced to the backing field's value type; any failure becomes a
//! [`RqlError::Value`] naming the filter, lookup and raw value.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::predicate::Value;
use crate::query::{remove_quotes, RqlError, RqlResult, RQL_EMPTY, RQL_FALSE, RQL_TRUE};
use crate::schema::{FieldMeta, FilterLookup, ValueType};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Datetimes with an explicit offset, tried after RFC 3339
const OFFSET_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Coerce a raw query value to the field's value type
pub(crate) fn convert_value(
    filter_name: &str,
    lookup: FilterLookup,
    field: &FieldMeta,
    use_repr: bool,
    raw: &str,
) -> RqlResult<Value> {
    let error = || RqlError::value(filter_name, lookup.as_str(), raw);
    let value = remove_quotes(raw);

    match field.value_type {
        ValueType::Float => return value.parse().map(Value::Float).map_err(|_| error()),
        ValueType::Decimal { places } => {
            return value
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .and_then(|v| round_decimal(v, places))
                .map(Value::Decimal)
                .ok_or_else(error)
        }
        ValueType::Date => return parse_date(value).map(Value::Date).ok_or_else(error),
        ValueType::DateTime => return parse_datetime(value).ok_or_else(error),
        ValueType::Boolean => {
            return match value {
                RQL_TRUE => Ok(Value::Bool(true)),
                RQL_FALSE => Ok(Value::Bool(false)),
                _ => Err(error()),
            }
        }
        ValueType::Int | ValueType::String => {}
    }

    if value == RQL_EMPTY {
        if field.value_type == ValueType::Int || !field.blank {
            return Err(error());
        }
        return Ok(Value::String(String::new()));
    }

    let stored = match &field.choices {
        Some(choices) => choices
            .iter()
            .find(|choice| {
                let repr = if use_repr { &choice.label } else { &choice.value };
                repr == value
            })
            .map(|choice| choice.value.as_str())
            .ok_or_else(error)?,
        None => value,
    };

    match field.value_type {
        ValueType::Int => stored.parse().map(Value::Int).map_err(|_| error()),
        _ => Ok(Value::String(stored.to_string())),
    }
}

/// Round half away from zero on the shortest decimal form of `value`
///
/// Scaling the binary float would turn `1.005` into `1.00`.
fn round_decimal(value: f64, places: u32) -> Option<f64> {
    let text = value.to_string();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let places = places as usize;
    if frac_part.len() <= places {
        return Some(value);
    }

    let mut kept: Vec<u8> = int_part
        .bytes()
        .chain(frac_part.bytes().take(places))
        .map(|b| b - b'0')
        .collect();
    if frac_part.as_bytes()[places] >= b'5' {
        let mut index = kept.len();
        loop {
            if index == 0 {
                kept.insert(0, 1);
                break;
            }
            index -= 1;
            if kept[index] == 9 {
                kept[index] = 0;
            } else {
                kept[index] += 1;
                break;
            }
        }
    }

    let split = kept.len() - places;
    let mut rounded = String::from(sign);
    rounded.extend(kept[..split].iter().map(|d| char::from(b'0' + d)));
    if places > 0 {
        rounded.push('.');
        rounded.extend(kept[split..].iter().map(|d| char::from(b'0' + d)));
    }
    rounded.parse().ok()
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn parse_datetime(value: &str) -> Option<Value> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(Value::DateTimeTz(dt));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(Value::DateTimeTz(dt));
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(Value::DateTime(dt));
        }
    }
    parse_date(value)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(Value::DateTime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Choice;

    fn convert(field: &FieldMeta, raw: &str) -> RqlResult<Value> {
        convert_value("f", FilterLookup::Eq, field, false, raw)
    }

    #[test]
    fn test_numeric_values() {
        assert_eq!(convert(&FieldMeta::int(), "42").unwrap(), Value::Int(42));
        assert_eq!(convert(&FieldMeta::int(), "'-7'").unwrap(), Value::Int(-7));
        assert_eq!(convert(&FieldMeta::float(), "1.5").unwrap(), Value::Float(1.5));
        assert_eq!(
            convert(&FieldMeta::decimal(2), "1.23456").unwrap(),
            Value::Decimal(1.23)
        );
        assert!(convert(&FieldMeta::int(), "1.5").is_err());
        assert!(convert(&FieldMeta::float(), "abc").is_err());
    }

    #[test]
    fn test_decimal_rounds_half_away_from_zero() {
        let decimal = |places, raw| convert(&FieldMeta::decimal(places), raw).unwrap();

        assert_eq!(decimal(2, "1.005"), Value::Decimal(1.01));
        assert_eq!(decimal(2, "2.675"), Value::Decimal(2.68));
        assert_eq!(decimal(2, "-1.005"), Value::Decimal(-1.01));
        assert_eq!(decimal(2, "9.995"), Value::Decimal(10.0));
        assert_eq!(decimal(0, "0.5"), Value::Decimal(1.0));
        assert_eq!(decimal(3, "1.5"), Value::Decimal(1.5));
        assert_eq!(decimal(1, "12"), Value::Decimal(12.0));
    }

    #[test]
    fn test_value_error_details() {
        let err = convert_value("pages", FilterLookup::Ge, &FieldMeta::int(), false, "many")
            .unwrap_err();
        assert_eq!(err, RqlError::value("pages", "ge", "many"));
    }

    #[test]
    fn test_date_and_datetime() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        assert_eq!(convert(&FieldMeta::date(), "2020-01-31").unwrap(), Value::Date(date));
        assert!(convert(&FieldMeta::date(), "2020-13-01").is_err());

        let midnight = date.and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(
            convert(&FieldMeta::datetime(), "2020-01-31").unwrap(),
            Value::DateTime(midnight)
        );

        let naive = date.and_hms_opt(10, 30, 0).unwrap();
        assert_eq!(
            convert(&FieldMeta::datetime(), "2020-01-31T10:30").unwrap(),
            Value::DateTime(naive)
        );
        assert_eq!(
            convert(&FieldMeta::datetime(), "2020-01-31 10:30:00").unwrap(),
            Value::DateTime(naive)
        );

        match convert(&FieldMeta::datetime(), "2020-01-31T10:30:00+03:00").unwrap() {
            Value::DateTimeTz(dt) => assert_eq!(dt.naive_local(), naive),
            other => panic!("unexpected value: {:?}", other),
        }
        assert!(convert(&FieldMeta::datetime(), "yesterday").is_err());
    }

    #[test]
    fn test_boolean_values() {
        assert_eq!(convert(&FieldMeta::boolean(), "true").unwrap(), Value::Bool(true));
        assert_eq!(convert(&FieldMeta::boolean(), "false").unwrap(), Value::Bool(false));
        assert!(convert(&FieldMeta::boolean(), "1").is_err());
        assert!(convert(&FieldMeta::boolean(), "True").is_err());
    }

    #[test]
    fn test_empty_value() {
        assert_eq!(
            convert(&FieldMeta::string().blank(), "empty()").unwrap(),
            Value::String(String::new())
        );
        assert!(convert(&FieldMeta::string(), "empty()").is_err());
        assert!(convert(&FieldMeta::int().blank(), "empty()").is_err());
    }

    #[test]
    fn test_string_keeps_text_without_quotes() {
        assert_eq!(
            convert(&FieldMeta::string(), "\"a b\"").unwrap(),
            Value::String("a b".into())
        );
    }

    #[test]
    fn test_choices_by_value_and_label() {
        let field = FieldMeta::int().choices([Choice::new("1", "draft"), Choice::new("2", "final")]);

        assert_eq!(convert(&field, "2").unwrap(), Value::Int(2));
        assert!(convert(&field, "final").is_err());
        assert!(convert(&field, "3").is_err());

        assert_eq!(
            convert_value("status", FilterLookup::Eq, &field, true, "final").unwrap(),
            Value::Int(2)
        );
        assert!(convert_value("status", FilterLookup::Eq, &field, true, "2").is_err());
    }
}
