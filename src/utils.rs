use chrono::{DateTime, Utc};
use mongodb::bson;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;
use crate::lead::dedup::normalize_email;

/// Serializes an `Option<DateTime<Utc>>` as an optional bson datetime so it
/// can take part in range queries, mirroring
/// `bson::serde_helpers::chrono_datetime_as_bson_datetime`.
pub mod optional_datetime {
    use super::*;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => bson::DateTime::from_chrono(*value).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<bson::DateTime>::deserialize(deserializer)?;
        Ok(value.map(|value| value.to_chrono()))
    }
}

/// Distinguishes a field that was left out of a request (`None`) from one that
/// was explicitly set to null (`Some(None)`). Use together with
/// `#[serde(default)]`.
pub fn explicit_null<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Trims a mandatory text field, rejecting it when nothing is left.
pub fn require_text(
    field: &'static str,
    expected: &'static str,
    value: String,
) -> Result<String, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::invalid_field(field, expected));
    }

    Ok(value.to_string())
}

/// Trims an optional text field. Blank counts as absent.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Validates the `local@domain.tld` shape and returns the normalized address.
pub fn require_email(field: &'static str, value: &str) -> Result<String, Error> {
    const EXPECTED: &str = "an email address like name@example.com";

    let email = normalize_email(value);
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(Error::invalid_field(field, EXPECTED));
    }

    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_is_checked_after_normalizing() {
        assert_eq!(
            require_email("email", " Jo@Example.COM ").unwrap(),
            "jo@example.com"
        );

        for bad in [
            "",
            "jo",
            "jo@",
            "@example.com",
            "jo@example",
            "jo@.com",
            "jo@example.",
            "j o@example.com",
            "jo@a@b.com",
        ] {
            assert!(require_email("email", bad).is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn blank_optional_text_is_absent() {
        assert_eq!(optional_text(Some("  ".into())), None);
        assert_eq!(optional_text(Some(" hi ".into())), Some("hi".into()));
        assert_eq!(optional_text(None), None);
    }

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "explicit_null")]
        date: Option<Option<String>>,
    }

    #[test]
    fn explicit_null_separates_missing_from_null() {
        let missing: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{ "date": null }"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{ "date": "2024-05-01" }"#).unwrap();

        assert_eq!(missing.date, None);
        assert_eq!(null.date, Some(None));
        assert_eq!(set.date, Some(Some("2024-05-01".to_string())));
    }
}
