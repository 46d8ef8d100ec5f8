//! Display rules for the dashboard pages.
//!
//! Loading of the data each page needs, date navigation, the category filter,
//! and the small amount of arithmetic the stats panel and article views do.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use thiserror::Error;
use tracing::{error, warn};

use crate::client::ApiClient;
use crate::error::ApiError;
use crate::models::{Category, DailyDigest, Newsletter, Sentiment, Stats};

pub const DIGEST_LOAD_ERROR: &str =
    "Failed to load news digest. Make sure the backend is running.";
pub const NEWSLETTER_EMPTY_MESSAGE: &str =
    "No newsletter available yet. Trigger a fetch to load the latest tl;dr sec newsletter.";
pub const STATS_UNAVAILABLE_MESSAGE: &str = "Unable to load statistics";

const DATE_PARAM_FORMAT: &str = "%Y-%m-%d";

/// The digest for one date plus the dates that have a digest.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestLoad {
    pub digest: DailyDigest,
    pub available_dates: Vec<String>,
}

/// Either half of the digest load failed. The cause is kept for logging but
/// never shown.
#[derive(Debug, Error)]
#[error("Failed to load news digest. Make sure the backend is running.")]
pub struct DigestLoadError(#[source] pub ApiError);

/// Fetch the digest for `date` and the available dates concurrently.
///
/// A failure in either request fails the whole load.
pub async fn load_digest(
    client: &ApiClient,
    date: NaiveDate,
) -> Result<DigestLoad, DigestLoadError> {
    let date_param = format_date_param(date);
    let (digest, dates) = tokio::try_join!(
        client.daily_digest(Some(&date_param)),
        client.available_dates(),
    )
    .map_err(|e| {
        error!("Failed to fetch digest for {}: {}", date_param, e);
        DigestLoadError(e)
    })?;

    Ok(DigestLoad {
        digest,
        available_dates: dates.dates,
    })
}

/// Stats for the side panel; `None` when they could not be loaded.
pub async fn load_stats(client: &ApiClient) -> Option<Stats> {
    match client.stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            error!("Failed to fetch stats: {}", e);
            None
        }
    }
}

/// Latest newsletter; a failure is the normal "nothing fetched yet" state.
pub async fn load_newsletter(client: &ApiClient) -> Option<Newsletter> {
    match client.latest_newsletter().await {
        Ok(newsletter) => Some(newsletter),
        Err(e) => {
            warn!("No newsletter available: {}", e);
            None
        }
    }
}

pub fn format_date_param(date: NaiveDate) -> String {
    date.format(DATE_PARAM_FORMAT).to_string()
}

/// Date requested in a `?date=` parameter; missing or malformed means today.
pub fn parse_date_param(raw: Option<&str>, today: NaiveDate) -> NaiveDate {
    raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), DATE_PARAM_FORMAT).ok())
        .unwrap_or(today)
}

pub fn is_today(date: NaiveDate, today: NaiveDate) -> bool {
    date == today
}

/// Label on the date selector: "Today" or e.g. "Oct 18, 2026".
pub fn date_label(date: NaiveDate, today: NaiveDate) -> String {
    if is_today(date, today) {
        "Today".to_string()
    } else {
        date.format("%b %-d, %Y").to_string()
    }
}

/// One entry of the archive date list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDate {
    pub value: String,
    pub label: String,
    pub year: String,
    pub selected: bool,
}

/// Archive entries for the date dropdown. Today has its own entry and is
/// skipped here, as are dates that do not parse.
pub fn archive_dates(
    dates: &[String],
    selected: NaiveDate,
    today: NaiveDate,
) -> Vec<ArchiveDate> {
    dates
        .iter()
        .filter_map(|raw| NaiveDate::parse_from_str(raw, DATE_PARAM_FORMAT).ok())
        .filter(|date| !is_today(*date, today))
        .map(|date| ArchiveDate {
            value: format_date_param(date),
            label: date.format("%A, %b %-d").to_string(),
            year: date.format("%Y").to_string(),
            selected: date == selected,
        })
        .collect()
}

/// Filter after clicking `clicked` while `active` is set. Clicking the active
/// category clears the filter.
pub fn toggle_filter(active: Option<Category>, clicked: Option<Category>) -> Option<Category> {
    if active == clicked {
        None
    } else {
        clicked
    }
}

/// Categories to render, in display order.
pub fn displayed_categories(active: Option<Category>) -> Vec<Category> {
    Category::ALL
        .into_iter()
        .filter(|c| active.map_or(true, |a| a == *c))
        .collect()
}

/// Average Gregorian month, used to count whole months in a span.
const SECONDS_PER_MONTH: f64 = 365.25 / 12.0 * 86_400.0;

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Human phrasing of a span of time, e.g. "5 minutes" or "about 3 hours".
pub fn humanize_distance(distance: Duration) -> String {
    let seconds = distance.num_seconds().abs();
    let minutes = (seconds as f64 / 60.0).round() as i64;

    if seconds < 30 {
        "less than a minute".to_string()
    } else if minutes < 2 {
        "1 minute".to_string()
    } else if minutes < 45 {
        plural(minutes, "minute")
    } else if minutes < 90 {
        "about 1 hour".to_string()
    } else if minutes < 1440 {
        let hours = (minutes as f64 / 60.0).round() as i64;
        format!("about {}", plural(hours, "hour"))
    } else if minutes < 2520 {
        "1 day".to_string()
    } else if minutes < 43_200 {
        let days = (minutes as f64 / 1440.0).round() as i64;
        plural(days, "day")
    } else if minutes < 86_400 {
        let months = (minutes as f64 / 43_200.0).round() as i64;
        format!("about {}", plural(months, "month"))
    } else {
        let whole_months = (seconds as f64 / SECONDS_PER_MONTH).floor() as i64;
        if whole_months < 12 {
            let months = (minutes as f64 / 43_200.0).round() as i64;
            return plural(months, "month");
        }
        let years = whole_months / 12;
        match whole_months % 12 {
            0..=2 => format!("about {}", plural(years, "year")),
            3..=8 => format!("over {}", plural(years, "year")),
            _ => format!("almost {}", plural(years + 1, "year")),
        }
    }
}

/// "3 hours ago" style phrasing of `at` relative to `now`.
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let distance = humanize_distance(now - at);
    if at > now {
        format!("in {distance}")
    } else {
        format!("{distance} ago")
    }
}

pub fn last_fetch_label(stats: &Stats, now: DateTime<Utc>) -> String {
    match &stats.last_fetch {
        Some(fetch) => format!("{} ago", humanize_distance(now - fetch.started_at)),
        None => "Never".to_string(),
    }
}

/// Estimated next backend sync: one fetch interval after the last fetch
/// started. `None` when nothing has been fetched yet.
pub fn next_sync_label(stats: &Stats, now: DateTime<Utc>) -> Option<String> {
    let last = stats.last_fetch.as_ref()?;
    let next = last.started_at + Duration::hours(i64::from(stats.fetch_interval_hours));
    if next > now {
        Some(format!("in {}", humanize_distance(next - now)))
    } else {
        Some("soon".to_string())
    }
}

/// Rounded share of `count` in `total`, 0 when `total` is 0.
pub fn category_share(count: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    (f64::from(count) / f64::from(total) * 100.0).round() as u32
}

pub fn processed_percent(stats: &Stats) -> u32 {
    category_share(stats.processed_articles, stats.total_articles)
}

/// Relevance as a whole percentage. A missing or zero score shows nothing.
pub fn relevance_percent(score: Option<f64>) -> Option<u32> {
    score
        .filter(|s| *s != 0.0)
        .map(|s| (s * 100.0).round() as u32)
}

pub fn sentiment_label(sentiment: Option<Sentiment>) -> &'static str {
    match sentiment {
        Some(Sentiment::Positive) => "Positive Outlook",
        Some(Sentiment::Negative) => "Negative Outlook",
        _ => "Neutral",
    }
}

pub fn sentiment_emoji(sentiment: Option<Sentiment>) -> &'static str {
    match sentiment {
        Some(Sentiment::Positive) => "📈",
        Some(Sentiment::Negative) => "📉",
        _ => "📊",
    }
}
