#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record types and merge-capability traits for datamill data sources.
//!
//! Every connector flattens its API payload into one of the record types
//! here. The traits describe what the merge store needs to know about a
//! record: how to sort it ([`TabularRecord`]), how to deduplicate it
//! ([`KeyedRecord`]), or which partition it belongs to ([`ScopedRecord`]).

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use strum_macros::{Display, EnumString};

// ── Fetch window ─────────────────────────────────────────────────────────

/// A half-open UTC time interval `[start, end)` bounding a fetch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    /// Inclusive lower bound.
    pub start: DateTime<Utc>,
    /// Exclusive upper bound.
    pub end: DateTime<Utc>,
}

impl fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \u{2192} {}",
            self.start.format("%Y-%m-%dT%H:%M:%SZ"),
            self.end.format("%Y-%m-%dT%H:%M:%SZ")
        )
    }
}

// ── Merge capabilities ───────────────────────────────────────────────────

/// A flat record that can be written to and read back from a CSV dataset.
///
/// `primary_time()` drives the stable readability sort applied before each
/// dataset write. Records without a usable time sort before dated ones and
/// keep their relative order.
pub trait TabularRecord: Serialize + DeserializeOwned {
    /// The primary time field of this record, if it has one.
    fn primary_time(&self) -> Option<DateTime<Utc>>;
}

/// A record deduplicated by a stable source-assigned identifier.
pub trait KeyedRecord: TabularRecord {
    /// The stable identifier that is unique within a dataset.
    fn dedup_key(&self) -> &str;

    /// When the source last updated this record, if known. Used to decide
    /// whether a re-fetched record replaces the stored one.
    fn updated_at(&self) -> Option<DateTime<Utc>>;
}

/// A record merged by replacing whole partitions rather than row-by-row.
pub trait ScopedRecord: TabularRecord {
    /// The partition key (e.g. `(country_code, year)` for holidays).
    type Scope: Clone + Eq + Ord + fmt::Debug;

    /// The partition this record belongs to.
    fn scope(&self) -> Self::Scope;
}

// ── Seismic events ───────────────────────────────────────────────────────

/// One seismic event flattened from the catalog's GeoJSON feature shape
/// (`properties` plus `geometry.coordinates`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeismicEvent {
    /// Stable catalog event identifier (dedup key).
    pub usgs_id: String,
    /// When the event occurred.
    pub time: Option<DateTime<Utc>>,
    /// When the catalog last revised this event.
    pub updated: Option<DateTime<Utc>>,
    /// Magnitude.
    pub mag: Option<f64>,
    /// Human-readable location description.
    pub place: Option<String>,
    /// Event type (e.g. `"earthquake"`, `"quarry blast"`).
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    /// Review status (`"automatic"` or `"reviewed"`).
    pub status: Option<String>,
    /// Tsunami flag (0 or 1).
    pub tsunami: Option<i64>,
    /// Significance score.
    pub sig: Option<i64>,
    /// Number of felt reports.
    pub felt: Option<i64>,
    /// Community-determined intensity.
    pub cdi: Option<f64>,
    /// Maximum instrumental intensity.
    pub mmi: Option<f64>,
    /// PAGER alert level.
    pub alert: Option<String>,
    /// Longitude (WGS84).
    pub lon: Option<f64>,
    /// Latitude (WGS84).
    pub lat: Option<f64>,
    /// Hypocenter depth in kilometers.
    pub depth_km: Option<f64>,
    /// Event page URL.
    pub url: Option<String>,
    /// Event detail API URL.
    pub detail: Option<String>,
    /// Event headline.
    pub title: Option<String>,
}

impl TabularRecord for SeismicEvent {
    fn primary_time(&self) -> Option<DateTime<Utc>> {
        self.time
    }
}

impl KeyedRecord for SeismicEvent {
    fn dedup_key(&self) -> &str {
        &self.usgs_id
    }

    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated
    }
}

// ── Public holidays ──────────────────────────────────────────────────────

/// One public holiday flattened from the per-year calendar payload, with
/// the fetch year added as an explicit column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    /// Date the holiday falls on.
    pub date: NaiveDate,
    /// Name in the country's local language.
    pub local_name: Option<String>,
    /// English name.
    pub english_name: Option<String>,
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: String,
    /// Whether the holiday falls on the same date every year.
    pub is_fixed: bool,
    /// Whether the holiday applies country-wide.
    pub is_global: bool,
    /// Pipe-joined subdivision codes, when the holiday is regional.
    pub counties: Option<String>,
    /// First year the holiday was observed, if known.
    pub launch_year: Option<i32>,
    /// Pipe-joined holiday type tags (e.g. `"Public"`).
    pub types: Option<String>,
    /// The calendar year this record was fetched for.
    pub year: i32,
}

impl TabularRecord for Holiday {
    fn primary_time(&self) -> Option<DateTime<Utc>> {
        self.date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
    }
}

impl ScopedRecord for Holiday {
    type Scope = (String, i32);

    fn scope(&self) -> Self::Scope {
        (self.country_code.clone(), self.year)
    }
}

// ── Page views ───────────────────────────────────────────────────────────

/// Access method filter for page-view metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Access {
    /// All access methods combined.
    AllAccess,
    /// Desktop site.
    Desktop,
    /// Mobile app.
    MobileApp,
    /// Mobile web.
    MobileWeb,
}

/// Agent filter for page-view metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Agent {
    /// All agent types combined.
    AllAgents,
    /// Human readers.
    User,
    /// Search engine crawlers.
    Spider,
    /// Other automated traffic.
    Automated,
}

/// Bucket granularity for page-view metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Granularity {
    /// One bucket per day.
    Daily,
    /// One bucket per month.
    Monthly,
}

/// One per-bucket page-view count flattened from the metrics payload.
///
/// The `timestamp` is kept in the API's native `YYYYMMDDHH` form, which
/// sorts lexicographically in chronological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageviewSample {
    /// Wiki project (e.g. `"en.wikipedia"`).
    pub project: String,
    /// Article title, underscored.
    pub article: String,
    /// Bucket granularity as reported by the API.
    pub granularity: String,
    /// Bucket timestamp, `YYYYMMDDHH`.
    pub timestamp: String,
    /// Access method as reported by the API.
    pub access: String,
    /// Agent type as reported by the API.
    pub agent: String,
    /// View count for the bucket.
    pub views: u64,
}

impl TabularRecord for PageviewSample {
    fn primary_time(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.timestamp, "%Y%m%d%H")
            .ok()
            .map(|dt| dt.and_utc())
    }
}

impl ScopedRecord for PageviewSample {
    type Scope = (String, String);

    fn scope(&self) -> Self::Scope {
        (self.article.clone(), self.timestamp.clone())
    }
}
