//! Seismic event connector for the USGS FDSN event catalog.
//!
//! Paginates the catalog by time window using `limit`/`offset` (offset is
//! 1-based), optionally narrowed by a geographic bounding box and a
//! minimum magnitude. Each GeoJSON feature's `properties` and
//! `geometry.coordinates` are flattened into one [`SeismicEvent`].

use std::str::FromStr;
use std::sync::Arc;

use chrono::TimeZone as _;
use datamill_source_models::{FetchWindow, SeismicEvent};
use serde_json::Value;

use crate::progress::ProgressCallback;
use crate::{SourceError, retry};

/// Catalog query endpoint.
const USGS_BASE: &str = "https://earthquake.usgs.gov/fdsnws/event/1/query";

/// Records per page. The catalog caps a single response at 20,000 events.
pub const PAGE_SIZE: u64 = 20_000;

/// Connector identifier used in logs, errors, and the data card.
pub const SOURCE_ID: &str = "usgs_earthquakes";

/// A geographic bounding box, `minlon,minlat,maxlon,maxlat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Western edge (WGS84 longitude).
    pub min_lon: f64,
    /// Southern edge (WGS84 latitude).
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl FromStr for BoundingBox {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| SourceError::InvalidQuery {
                message: format!("bounding box must be 'minlon,minlat,maxlon,maxlat', got {s:?}"),
            })?;

        let [min_lon, min_lat, max_lon, max_lat] = parts[..] else {
            return Err(SourceError::InvalidQuery {
                message: format!("bounding box must have 4 components, got {}", parts.len()),
            });
        };

        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }
}

/// Parameters for one catalog fetch.
#[derive(Debug, Clone)]
pub struct EarthquakeQuery {
    /// Half-open event time window.
    pub window: FetchWindow,
    /// Drop events below this magnitude.
    pub min_magnitude: Option<f64>,
    /// Restrict to events inside this box.
    pub bounding_box: Option<BoundingBox>,
    /// Maximum total records to fetch.
    pub limit: Option<u64>,
}

/// Fetches all events in the query window, page by page, in ascending
/// time order.
///
/// A page shorter than requested means the catalog is exhausted and ends
/// the sequence; it is not an error.
///
/// # Errors
///
/// Returns [`SourceError`] if a request fails after retries or a response
/// does not have the feature-collection shape.
#[allow(clippy::future_not_send)]
pub async fn fetch_earthquakes(
    client: &reqwest::Client,
    query: &EarthquakeQuery,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<Vec<SeismicEvent>, SourceError> {
    let mut events = Vec::new();
    let mut offset: u64 = 1; // catalog offsets are 1-based
    let fetch_limit = query.limit.unwrap_or(u64::MAX);

    loop {
        let remaining = fetch_limit.saturating_sub(events.len() as u64);
        if remaining == 0 {
            break;
        }
        let page_limit = remaining.min(PAGE_SIZE);

        let mut params: Vec<(&str, String)> = vec![
            ("format", "geojson".to_string()),
            (
                "starttime",
                query.window.start.format("%Y-%m-%dT%H:%M:%S").to_string(),
            ),
            (
                "endtime",
                query.window.end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            ),
            ("orderby", "time-asc".to_string()),
            ("limit", page_limit.to_string()),
            ("offset", offset.to_string()),
        ];
        if let Some(min_mag) = query.min_magnitude {
            params.push(("minmagnitude", min_mag.to_string()));
        }
        if let Some(bbox) = query.bounding_box {
            params.push(("minlongitude", bbox.min_lon.to_string()));
            params.push(("minlatitude", bbox.min_lat.to_string()));
            params.push(("maxlongitude", bbox.max_lon.to_string()));
            params.push(("maxlatitude", bbox.max_lat.to_string()));
        }

        log::info!("Fetching earthquakes: offset={offset}, limit={page_limit}");
        if let Some(p) = &progress {
            p.set_message(format!("earthquakes: {} fetched", events.len()));
        }

        let body = retry::send_json(SOURCE_ID, || client.get(USGS_BASE).query(&params)).await?;
        let page = parse_feature_collection(&body)?;

        let count = page.len() as u64;
        events.extend(page);
        offset += count;

        if let Some(p) = &progress {
            p.inc(count);
        }

        if count < page_limit {
            break;
        }
    }

    log::info!("Downloaded {} earthquake records total", events.len());
    Ok(events)
}

/// Flattens a GeoJSON feature collection into seismic event records.
///
/// # Errors
///
/// Returns [`SourceError::Fetch`] if the payload has no `features` array
/// or a feature is missing its id.
pub fn parse_feature_collection(body: &Value) -> Result<Vec<SeismicEvent>, SourceError> {
    let features = body
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Fetch {
            source_id: SOURCE_ID.to_string(),
            message: "response has no 'features' array".to_string(),
        })?;

    features.iter().map(flatten_feature).collect()
}

/// Flattens one feature's `properties` and `geometry` into a record.
fn flatten_feature(feature: &Value) -> Result<SeismicEvent, SourceError> {
    let usgs_id = feature
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| SourceError::Fetch {
            source_id: SOURCE_ID.to_string(),
            message: "feature has no string 'id'".to_string(),
        })?
        .to_string();

    let props = feature.get("properties").unwrap_or(&Value::Null);
    let coords = feature
        .get("geometry")
        .and_then(|g| g.get("coordinates"))
        .and_then(Value::as_array);
    let coord = |i: usize| coords.and_then(|c| c.get(i)).and_then(Value::as_f64);

    Ok(SeismicEvent {
        usgs_id,
        time: epoch_millis(props.get("time")),
        updated: epoch_millis(props.get("updated")),
        mag: props.get("mag").and_then(Value::as_f64),
        place: opt_string(props, "place"),
        event_type: opt_string(props, "type"),
        status: opt_string(props, "status"),
        tsunami: props.get("tsunami").and_then(Value::as_i64),
        sig: props.get("sig").and_then(Value::as_i64),
        felt: props.get("felt").and_then(Value::as_i64),
        cdi: props.get("cdi").and_then(Value::as_f64),
        mmi: props.get("mmi").and_then(Value::as_f64),
        alert: opt_string(props, "alert"),
        lon: coord(0),
        lat: coord(1),
        depth_km: coord(2),
        url: opt_string(props, "url"),
        detail: opt_string(props, "detail"),
        title: opt_string(props, "title"),
    })
}

/// Converts a catalog epoch-milliseconds value into a UTC timestamp.
/// Zero and missing values both mean "unknown".
fn epoch_millis(value: Option<&Value>) -> Option<chrono::DateTime<chrono::Utc>> {
    value
        .and_then(Value::as_i64)
        .filter(|&ms| ms != 0)
        .and_then(|ms| chrono::Utc.timestamp_millis_opt(ms).single())
}

fn opt_string(props: &Value, key: &str) -> Option<String> {
    props.get(key).and_then(Value::as_str).map(String::from)
}
