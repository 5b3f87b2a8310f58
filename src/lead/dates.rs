use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::error::Error;

const EXPECTED_DATE: &str = "null, a YYYY-MM-DD date, or an ISO 8601 datetime";

/// Parses a date field sent by the dashboard.
///
/// An empty string clears the field like `null` does. A bare `YYYY-MM-DD`
/// is taken as noon in the server's local time, so that converting it to UTC
/// never moves it onto a neighboring day. Datetimes may carry an offset
/// (RFC 3339) or not, in which case they are read as local time.
pub fn parse_date_input(field: &'static str, value: &str) -> Result<Option<DateTime<Utc>>, Error> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let noon = date
            .and_hms_opt(12, 0, 0)
            .ok_or_else(|| Error::invalid_field(field, EXPECTED_DATE))?;
        return local_to_utc(field, &noon).map(Some);
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(Some(datetime.with_timezone(&Utc)));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return local_to_utc(field, &naive).map(Some);
        }
    }

    Err(Error::invalid_field(field, EXPECTED_DATE))
}

/// Resolves the three states of a patched date field: left out, explicitly
/// null, or a value to parse.
pub fn parse_date_patch(
    field: &'static str,
    value: Option<Option<String>>,
) -> Result<Option<Option<DateTime<Utc>>>, Error> {
    match value {
        None => Ok(None),
        Some(None) => Ok(Some(None)),
        Some(Some(value)) => parse_date_input(field, &value).map(Some),
    }
}

fn local_to_utc(field: &'static str, naive: &NaiveDateTime) -> Result<DateTime<Utc>, Error> {
    Local
        .from_local_datetime(naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| Error::invalid_field(field, EXPECTED_DATE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_date_is_local_noon() {
        let parsed = parse_date_input("date", "2024-05-01").unwrap().unwrap();

        let local = parsed.with_timezone(&Local);
        assert_eq!(local.date_naive(), NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(local.time(), chrono::NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    }

    #[test]
    fn rfc3339_keeps_its_instant() {
        let parsed = parse_date_input("date", "2024-05-01T15:30:00.000Z")
            .unwrap()
            .unwrap();

        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 15, 30, 0).unwrap());

        let offset = parse_date_input("date", "2024-05-01T08:00:00-05:00")
            .unwrap()
            .unwrap();
        assert_eq!(offset, Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap());
    }

    #[test]
    fn naive_datetime_is_local() {
        let parsed = parse_date_input("date", "2024-05-01T09:15").unwrap().unwrap();

        let expected = Local
            .with_ymd_and_hms(2024, 5, 1, 9, 15, 0)
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parsed, expected);
    }

    #[test]
    fn empty_clears() {
        assert_eq!(parse_date_input("date", "").unwrap(), None);
        assert_eq!(parse_date_input("date", "   ").unwrap(), None);
    }

    #[test]
    fn garbage_names_the_field() {
        assert_eq!(
            parse_date_input("scheduled_inspection_date", "next tuesday").unwrap_err(),
            Error::InvalidField {
                field: "scheduled_inspection_date",
                expected: EXPECTED_DATE,
            }
        );
        assert!(parse_date_input("date", "2024-13-45").is_err());
    }

    #[test]
    fn patch_states() {
        assert_eq!(parse_date_patch("date", None).unwrap(), None);
        assert_eq!(parse_date_patch("date", Some(None)).unwrap(), Some(None));
        assert!(parse_date_patch("date", Some(Some("2024-05-01".into())))
            .unwrap()
            .unwrap()
            .is_some());
    }
}
