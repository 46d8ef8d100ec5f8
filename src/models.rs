//! Types returned by the digest backend.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Accent colour used for categories the dashboard does not know about.
pub const DEFAULT_CATEGORY_COLOR: &str = "#3EE98A";

/// Parse a backend timestamp.
///
/// The backend emits RFC 3339 for zone-aware values and bare ISO 8601 for
/// naive ones; naive values are taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

mod timestamp {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => serializer.serialize_some(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => parse_timestamp(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}"))),
                None => Ok(None),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// The article categories the dashboard renders, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Cyber,
    Ai,
    Cloud,
    Crypto,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Cyber,
        Category::Ai,
        Category::Cloud,
        Category::Crypto,
    ];

    /// Key used by the backend.
    pub fn key(self) -> &'static str {
        match self {
            Category::Cyber => "cyber",
            Category::Ai => "ai",
            Category::Cloud => "cloud",
            Category::Crypto => "crypto",
        }
    }

    /// Short label for the filter bar.
    pub fn label(self) -> &'static str {
        match self {
            Category::Cyber => "Security",
            Category::Ai => "AI",
            Category::Cloud => "Cloud",
            Category::Crypto => "Crypto",
        }
    }

    /// Long label for section headings.
    pub fn full_label(self) -> &'static str {
        match self {
            Category::Cyber => "Cyber Security",
            Category::Ai => "Artificial Intelligence",
            Category::Cloud => "Cloud Engineering",
            Category::Crypto => "Cryptocurrency",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Category::Cyber => "#3EE98A",
            Category::Ai | Category::Cloud => "#4FD1C5",
            Category::Crypto => "#F2B84B",
        }
    }

    /// Icon name from the dashboard's icon set.
    pub fn icon(self) -> &'static str {
        match self {
            Category::Cyber => "shield",
            Category::Ai => "brain",
            Category::Cloud => "cloud",
            Category::Crypto => "bitcoin",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Accent colour for a backend category key, known or not.
pub fn category_color(key: &str) -> &'static str {
    key.parse::<Category>()
        .map_or(DEFAULT_CATEGORY_COLOR, Category::color)
}

/// Long label for a backend category key; unknown keys are shown as-is.
pub fn category_label(key: &str) -> String {
    key.parse::<Category>()
        .map_or_else(|_| key.to_string(), |c| c.full_label().to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub category: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_points: Option<Vec<String>>,
    #[serde(default)]
    pub ai_tags: Option<Vec<String>>,
    #[serde(default)]
    pub sentiment: Option<Sentiment>,
    #[serde(default)]
    pub relevance_score: Option<f64>,
    #[serde(default, with = "timestamp::option")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub featured_date: Option<String>,
    #[serde(default)]
    pub source_name: Option<String>,
}

impl Article {
    pub fn category_kind(&self) -> Option<Category> {
        self.category.parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyDigest {
    pub date: String,
    pub categories: BTreeMap<String, Vec<Article>>,
    pub total_articles: u32,
}

impl DailyDigest {
    pub fn articles_for(&self, category: Category) -> &[Article] {
        self.categories
            .get(category.key())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Sum of the per-category article counts.
    ///
    /// The backend reports `total_articles` separately; the two are expected
    /// to agree but nothing here enforces it.
    pub fn counted_articles(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    pub fn has_articles(&self) -> bool {
        self.total_articles > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableDates {
    pub dates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryArticles {
    pub category: String,
    pub articles: Vec<Article>,
    pub total: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastFetch {
    pub status: String,
    #[serde(with = "timestamp")]
    pub started_at: DateTime<Utc>,
    pub articles_fetched: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub total_articles: u32,
    pub processed_articles: u32,
    pub articles_by_category: BTreeMap<String, u32>,
    pub total_sources: u32,
    pub active_sources: u32,
    #[serde(default)]
    pub last_fetch: Option<LastFetch>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub fetch_interval_hours: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchLog {
    pub id: i64,
    #[serde(with = "timestamp")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: String,
    pub articles_fetched: u32,
    pub articles_processed: u32,
    #[serde(default)]
    pub errors: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Newsletter {
    pub id: i64,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(with = "timestamp")]
    pub fetched_at: DateTime<Utc>,
    #[serde(default)]
    pub executive_summary: Option<String>,
    pub processed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub feed_url: String,
    pub category: String,
    pub active: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "timestamp::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchTriggered {
    pub message: String,
    pub log_id: i64,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterTriggered {
    pub message: String,
    #[serde(default)]
    pub newsletter_id: Option<i64>,
    pub status: String,
}

/// Filters for `GET /api/articles`. Unset fields are left out of the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleQuery {
    pub category: Option<String>,
    pub featured_date: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ArticleQuery {
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty()) {
            pairs.push(("category", category.to_string()));
        }
        if let Some(date) = self.featured_date.as_deref().filter(|d| !d.is_empty()) {
            pairs.push(("featured_date", date.to_string()));
        }
        // Zero is treated as unset, like an absent value.
        if let Some(limit) = self.limit.filter(|l| *l > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset.filter(|o| *o > 0) {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod category_tests {
        use super::*;

        #[test]
        fn test_display_order() {
            let keys: Vec<&str> = Category::ALL.iter().map(|c| c.key()).collect();
            assert_eq!(keys, vec!["cyber", "ai", "cloud", "crypto"]);
        }

        #[test]
        fn test_parse_round_trips_keys() {
            for category in Category::ALL {
                assert_eq!(category.key().parse::<Category>(), Ok(category));
            }
        }

        #[test]
        fn test_parse_unknown() {
            assert_eq!(
                "sports".parse::<Category>(),
                Err(UnknownCategory("sports".to_string()))
            );
        }

        #[test]
        fn test_unknown_category_fallbacks() {
            assert_eq!(category_color("sports"), DEFAULT_CATEGORY_COLOR);
            assert_eq!(category_label("sports"), "sports");
        }

        #[test]
        fn test_known_category_lookups() {
            assert_eq!(category_color("crypto"), "#F2B84B");
            assert_eq!(category_label("ai"), "Artificial Intelligence");
            assert_eq!(Category::Cyber.label(), "Security");
        }
    }

    mod deserialize_tests {
        use super::*;

        #[test]
        fn test_article_with_nulls() {
            let json = r#"{
                "id": 7,
                "title": "Title",
                "url": "https://example.com/a",
                "category": "cyber",
                "summary": null,
                "key_points": null,
                "ai_tags": null,
                "sentiment": null,
                "relevance_score": null,
                "published_at": null,
                "featured_date": null,
                "source_name": null
            }"#;
            let article: Article = serde_json::from_str(json).unwrap();
            assert_eq!(article.id, 7);
            assert_eq!(article.category_kind(), Some(Category::Cyber));
            assert!(article.summary.is_none());
            assert!(article.sentiment.is_none());
        }

        #[test]
        fn test_article_full() {
            let json = r#"{
                "id": 1,
                "title": "Title",
                "url": "https://example.com/a",
                "category": "crypto",
                "summary": "Text.",
                "key_points": ["a", "b"],
                "ai_tags": ["defi"],
                "sentiment": "negative",
                "relevance_score": 0.82,
                "published_at": "2026-10-18T09:30:00Z",
                "featured_date": "2026-10-18",
                "source_name": "CoinDesk"
            }"#;
            let article: Article = serde_json::from_str(json).unwrap();
            assert_eq!(article.sentiment, Some(Sentiment::Negative));
            assert_eq!(article.key_points.as_ref().unwrap().len(), 2);
            assert_eq!(article.relevance_score, Some(0.82));
            assert!(article.published_at.is_some());
        }

        #[test]
        fn test_digest_helpers() {
            let json = r#"{
                "date": "2026-10-18",
                "categories": {
                    "cyber": [{"id": 1, "title": "t", "url": "u", "category": "cyber"}],
                    "ai": []
                },
                "total_articles": 1
            }"#;
            let digest: DailyDigest = serde_json::from_str(json).unwrap();
            assert_eq!(digest.articles_for(Category::Cyber).len(), 1);
            assert!(digest.articles_for(Category::Crypto).is_empty());
            assert_eq!(digest.counted_articles(), 1);
            assert!(digest.has_articles());
        }

        #[test]
        fn test_naive_timestamps_are_utc() {
            let json = r#"{
                "id": 3,
                "title": "tl;dr sec #300",
                "url": "https://tldrsec.com/p/300",
                "content": null,
                "published_at": "2026-10-16T14:00:00",
                "fetched_at": "2026-10-16T15:30:12.123456",
                "executive_summary": null,
                "processed": false
            }"#;
            let newsletter: Newsletter = serde_json::from_str(json).unwrap();
            assert_eq!(
                newsletter.published_at.unwrap().to_rfc3339(),
                "2026-10-16T14:00:00+00:00"
            );
            assert!(!newsletter.processed);
        }

        #[test]
        fn test_invalid_timestamp_is_rejected() {
            assert!(parse_timestamp("yesterday").is_none());
            let json = r#"{"status": "ok", "started_at": "nope", "articles_fetched": 1}"#;
            assert!(serde_json::from_str::<LastFetch>(json).is_err());
        }

        #[test]
        fn test_stats_without_last_fetch() {
            let json = r#"{
                "total_articles": 0,
                "processed_articles": 0,
                "articles_by_category": {},
                "total_sources": 4,
                "active_sources": 3,
                "last_fetch": null,
                "categories": ["cyber"],
                "fetch_interval_hours": 6
            }"#;
            let stats: Stats = serde_json::from_str(json).unwrap();
            assert!(stats.last_fetch.is_none());
            assert_eq!(stats.fetch_interval_hours, 6);
        }
    }

    mod article_query_tests {
        use super::*;

        #[test]
        fn test_empty_query_has_no_pairs() {
            assert!(ArticleQuery::default().to_pairs().is_empty());
        }

        #[test]
        fn test_set_fields_become_pairs() {
            let query = ArticleQuery {
                category: Some("ai".to_string()),
                featured_date: Some("2026-10-18".to_string()),
                limit: Some(20),
                offset: Some(0),
            };
            assert_eq!(
                query.to_pairs(),
                vec![
                    ("category", "ai".to_string()),
                    ("featured_date", "2026-10-18".to_string()),
                    ("limit", "20".to_string()),
                ]
            );
        }
    }
}
