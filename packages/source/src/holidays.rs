//! Public holiday connector for the Nager.Date v3 API.
//!
//! Issues one request per (country, year) and flattens each holiday entry
//! into a [`Holiday`] record, adding the fetch year as a column. List
//! fields (`counties`, `types`) are pipe-joined so the record stays flat.

use std::sync::Arc;

use chrono::NaiveDate;
use datamill_source_models::Holiday;
use serde_json::Value;

use crate::progress::ProgressCallback;
use crate::{SourceError, retry};

/// Per-year holiday endpoint; the path is `/{year}/{country}`.
const NAGER_BASE: &str = "https://date.nager.at/api/v3/PublicHolidays";

/// Connector identifier used in logs, errors, and the data card.
pub const SOURCE_ID: &str = "nager_holidays";

/// Parameters for one holiday fetch.
#[derive(Debug, Clone)]
pub struct HolidayQuery {
    /// ISO 3166-1 alpha-2 country code (e.g. `"FR"`).
    pub country: String,
    /// Calendar years to fetch, one request each.
    pub years: Vec<i32>,
}

/// Parses a year span argument: `"2020"` or an inclusive `"2015:2025"`.
///
/// # Errors
///
/// Returns [`SourceError::InvalidQuery`] on non-numeric input or a span
/// whose start exceeds its end.
pub fn parse_year_span(span: &str) -> Result<Vec<i32>, SourceError> {
    let invalid = || SourceError::InvalidQuery {
        message: format!("years must be a year or 'start:end' span, got {span:?}"),
    };

    if let Some((a, b)) = span.split_once(':') {
        let start: i32 = a.trim().parse().map_err(|_| invalid())?;
        let end: i32 = b.trim().parse().map_err(|_| invalid())?;
        if start > end {
            return Err(SourceError::InvalidQuery {
                message: format!("year span start {start} exceeds end {end}"),
            });
        }
        Ok((start..=end).collect())
    } else {
        Ok(vec![span.trim().parse().map_err(|_| invalid())?])
    }
}

/// Fetches all holidays for the query's country and years.
///
/// A year with no published calendar contributes zero records; it is not
/// an error.
///
/// # Errors
///
/// Returns [`SourceError`] if a request fails after retries or a response
/// is not an array of holiday objects.
#[allow(clippy::future_not_send)]
pub async fn fetch_holidays(
    client: &reqwest::Client,
    query: &HolidayQuery,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<Vec<Holiday>, SourceError> {
    let country = query.country.to_uppercase();
    let mut holidays = Vec::new();

    if let Some(p) = &progress {
        p.set_total(query.years.len() as u64);
    }

    for &year in &query.years {
        let url = format!("{NAGER_BASE}/{year}/{country}");
        log::info!("Fetching holidays: country={country}, year={year}");

        let body = retry::send_json(SOURCE_ID, || client.get(&url)).await?;
        holidays.extend(parse_holiday_year(&body, year)?);

        if let Some(p) = &progress {
            p.inc(1);
        }
    }

    log::info!(
        "Downloaded {} holiday records for {country} across {} year(s)",
        holidays.len(),
        query.years.len()
    );
    Ok(holidays)
}

/// Flattens one year's payload (a JSON array of holiday objects) into
/// records tagged with `year`.
///
/// # Errors
///
/// Returns [`SourceError::Fetch`] if the payload is not an array or an
/// entry lacks a parseable date or country code.
pub fn parse_holiday_year(body: &Value, year: i32) -> Result<Vec<Holiday>, SourceError> {
    let entries = body.as_array().ok_or_else(|| SourceError::Fetch {
        source_id: SOURCE_ID.to_string(),
        message: format!("expected a JSON array for year {year}"),
    })?;

    entries
        .iter()
        .map(|entry| flatten_holiday(entry, year))
        .collect()
}

fn flatten_holiday(entry: &Value, year: i32) -> Result<Holiday, SourceError> {
    let malformed = |message: String| SourceError::Fetch {
        source_id: SOURCE_ID.to_string(),
        message,
    };

    let date_str = entry
        .get("date")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(format!("holiday entry has no 'date': {entry}")))?;
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .map_err(|e| malformed(format!("unparseable holiday date {date_str:?}: {e}")))?;

    let country_code = entry
        .get("countryCode")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(format!("holiday entry has no 'countryCode': {entry}")))?
        .to_string();

    Ok(Holiday {
        date,
        local_name: opt_string(entry, "localName"),
        english_name: opt_string(entry, "name"),
        country_code,
        is_fixed: entry.get("fixed").and_then(Value::as_bool).unwrap_or(false),
        is_global: entry
            .get("global")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        counties: pipe_joined(entry.get("counties")),
        launch_year: entry
            .get("launchYear")
            .and_then(Value::as_i64)
            .and_then(|y| i32::try_from(y).ok()),
        types: pipe_joined(entry.get("types")),
        year,
    })
}

/// Joins a JSON array of strings with `|`; `null`/missing stays `None`.
fn pipe_joined(value: Option<&Value>) -> Option<String> {
    let items = value?.as_array()?;
    Some(
        items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("|"),
    )
}

fn opt_string(entry: &Value, key: &str) -> Option<String> {
    entry.get(key).and_then(Value::as_str).map(String::from)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_single_year() {
        assert_eq!(parse_year_span("2024").unwrap(), vec![2024]);
    }

    #[test]
    fn parses_inclusive_span() {
        assert_eq!(parse_year_span("2022:2024").unwrap(), vec![2022, 2023, 2024]);
    }

    #[test]
    fn rejects_reversed_span() {
        assert!(parse_year_span("2025:2020").is_err());
    }

    #[test]
    fn rejects_non_numeric_span() {
        assert!(parse_year_span("20x4").is_err());
        assert!(parse_year_span("2020-2024").is_err());
    }

    #[test]
    fn flattens_holiday_entries() {
        let body = json!([
            {
                "date": "2024-07-14",
                "localName": "F\u{ea}te nationale",
                "name": "Bastille Day",
                "countryCode": "FR",
                "fixed": true,
                "global": true,
                "counties": null,
                "launchYear": 1880,
                "types": ["Public"]
            },
            {
                "date": "2024-12-26",
                "localName": "Zweiter Weihnachtstag",
                "name": "St. Stephen's Day",
                "countryCode": "DE",
                "fixed": true,
                "global": false,
                "counties": ["DE-BB", "DE-BY"],
                "types": ["Public", "Bank"]
            }
        ]);

        let holidays = parse_holiday_year(&body, 2024).unwrap();
        assert_eq!(holidays.len(), 2);

        assert_eq!(holidays[0].country_code, "FR");
        assert_eq!(holidays[0].launch_year, Some(1880));
        assert!(holidays[0].counties.is_none());
        assert_eq!(holidays[0].year, 2024);

        assert_eq!(holidays[1].counties.as_deref(), Some("DE-BB|DE-BY"));
        assert_eq!(holidays[1].types.as_deref(), Some("Public|Bank"));
        assert!(!holidays[1].is_global);
    }

    #[test]
    fn empty_year_yields_no_records() {
        assert!(parse_holiday_year(&json!([]), 2024).unwrap().is_empty());
    }

    #[test]
    fn rejects_non_array_payload() {
        assert!(matches!(
            parse_holiday_year(&json!({"status": 404}), 2024),
            Err(SourceError::Fetch { .. })
        ));
    }

    #[test]
    fn rejects_unparseable_date() {
        let body = json!([{ "date": "July 14th", "countryCode": "FR" }]);
        assert!(matches!(
            parse_holiday_year(&body, 2024),
            Err(SourceError::Fetch { .. })
        ));
    }
}
