//! Page-view connector for the Wikimedia REST per-article metrics API.
//!
//! Issues one request per article over a date window and flattens each
//! per-bucket item into a [`PageviewSample`]. Bucket bounds are
//! `YYYYMMDDHH`; day-precision input (`YYYYMMDD`) is widened to the
//! midnight bucket.

use std::sync::Arc;

use datamill_source_models::{Access, Agent, Granularity, PageviewSample};
use serde_json::Value;

use crate::progress::ProgressCallback;
use crate::{SourceError, retry};

/// Per-article endpoint; the path is
/// `/{project}/{access}/{agent}/{article}/{granularity}/{start}/{end}`.
const PAGEVIEWS_BASE: &str = "https://wikimedia.org/api/rest_v1/metrics/pageviews/per-article";

/// Connector identifier used in logs, errors, and the data card.
pub const SOURCE_ID: &str = "wikimedia_pageviews";

/// Parameters for one page-view fetch.
#[derive(Debug, Clone)]
pub struct PageviewQuery {
    /// Wiki project domain (e.g. `"en.wikipedia"`).
    pub project: String,
    /// Article titles; spaces are converted to underscores per the API's
    /// title convention.
    pub articles: Vec<String>,
    /// Access method filter.
    pub access: Access,
    /// Agent filter.
    pub agent: Agent,
    /// Bucket granularity.
    pub granularity: Granularity,
    /// Window start, `YYYYMMDD` or `YYYYMMDDHH`.
    pub start: String,
    /// Window end, `YYYYMMDD` or `YYYYMMDDHH`.
    pub end: String,
}

/// Fetches per-bucket view counts for every article in the query.
///
/// # Errors
///
/// Returns [`SourceError::InvalidQuery`] for malformed window bounds and
/// [`SourceError`] if a request fails after retries or a response has no
/// `items` array.
#[allow(clippy::future_not_send)]
pub async fn fetch_pageviews(
    client: &reqwest::Client,
    query: &PageviewQuery,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<Vec<PageviewSample>, SourceError> {
    let start = bucket_bound(&query.start)?;
    let end = bucket_bound(&query.end)?;

    let mut samples = Vec::new();

    if let Some(p) = &progress {
        p.set_total(query.articles.len() as u64);
    }

    for article in &query.articles {
        let title = article.replace(' ', "_");
        let url = format!(
            "{PAGEVIEWS_BASE}/{}/{}/{}/{title}/{}/{start}/{end}",
            query.project, query.access, query.agent, query.granularity
        );
        log::info!("Fetching pageviews: article={title}");

        let body = retry::send_json(SOURCE_ID, || client.get(&url)).await?;
        samples.extend(parse_pageview_items(&body)?);

        if let Some(p) = &progress {
            p.inc(1);
        }
    }

    log::info!(
        "Downloaded {} pageview buckets across {} article(s)",
        samples.len(),
        query.articles.len()
    );
    Ok(samples)
}

/// Normalizes a window bound to the API's `YYYYMMDDHH` form.
///
/// # Errors
///
/// Returns [`SourceError::InvalidQuery`] unless the bound is 8 or 10
/// digits.
pub fn bucket_bound(bound: &str) -> Result<String, SourceError> {
    let digits = bound.trim();
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(SourceError::InvalidQuery {
            message: format!("window bound must be numeric YYYYMMDD[HH], got {bound:?}"),
        });
    }
    match digits.len() {
        8 => Ok(format!("{digits}00")),
        10 => Ok(digits.to_string()),
        n => Err(SourceError::InvalidQuery {
            message: format!("window bound must be 8 or 10 digits, got {n}"),
        }),
    }
}

/// Flattens a metrics payload's `items` array into records.
///
/// # Errors
///
/// Returns [`SourceError::Fetch`] if the payload has no `items` array or
/// an item is missing a required field.
pub fn parse_pageview_items(body: &Value) -> Result<Vec<PageviewSample>, SourceError> {
    let items = body
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| SourceError::Fetch {
            source_id: SOURCE_ID.to_string(),
            message: "response has no 'items' array".to_string(),
        })?;

    items.iter().map(flatten_item).collect()
}

fn flatten_item(item: &Value) -> Result<PageviewSample, SourceError> {
    let field = |key: &str| -> Result<String, SourceError> {
        item.get(key)
            .and_then(Value::as_str)
            .map(String::from)
            .ok_or_else(|| SourceError::Fetch {
                source_id: SOURCE_ID.to_string(),
                message: format!("pageview item has no '{key}': {item}"),
            })
    };

    Ok(PageviewSample {
        project: field("project")?,
        article: field("article")?,
        granularity: field("granularity")?,
        timestamp: field("timestamp")?,
        access: field("access")?,
        agent: field("agent")?,
        views: item
            .get("views")
            .and_then(Value::as_u64)
            .ok_or_else(|| SourceError::Fetch {
                source_id: SOURCE_ID.to_string(),
                message: format!("pageview item has no numeric 'views': {item}"),
            })?,
    })
}
