//! Summary segmentation.
//!
//! Turns the free-text summaries attached to articles and newsletters into the
//! bullet points and named sections shown on the dashboard. Everything here is
//! a pure function of its input.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Maximum number of bullet points produced for one article summary.
pub const MAX_BULLET_POINTS: usize = 5;

/// Sentences of this many characters or fewer are discarded outright.
const MIN_SENTENCE_CHARS: usize = 15;
/// A cleaned sentence must be longer than this to become a bullet point.
const MIN_POINT_CHARS: usize = 20;
const MIN_SEMICOLON_PART_CHARS: usize = 25;
const MIN_DASH_PART_CHARS: usize = 20;
/// Below this many points the fallback splits are attempted.
const MIN_DESIRED_POINTS: usize = 3;

static SENTENCE_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"));
static SEMICOLON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r";\s*").expect("valid semicolon regex"));
static DASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+[-–—]\s+").expect("valid dash regex"));
static SECTION_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"##\s").expect("valid header regex"));
static PREAMBLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^Based on.*?:\s*").expect("valid preamble regex"));
static HEADER_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^##\s*").expect("valid header marker regex"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[•\-*]\s*").expect("valid bullet regex"));
static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*[^*]+\*\*").expect("valid emphasis regex"));

/// An article summary reshaped for the detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleSummary {
    /// The summary exactly as received.
    pub overview: String,
    pub bullet_points: Vec<String>,
}

/// Named sections of a newsletter executive summary.
///
/// A section is `None` when the summary had no header for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutiveSummarySections {
    pub intro: Option<String>,
    pub key_themes: Option<Vec<String>>,
    pub critical_alerts: Option<Vec<String>>,
    pub tools: Option<Vec<String>>,
    pub trends: Option<Vec<String>>,
    pub takeaways: Option<Vec<String>>,
}

impl ExecutiveSummarySections {
    /// True when neither intro text nor any recognised section was found.
    pub fn is_empty(&self) -> bool {
        self.intro.as_deref().map_or(true, str::is_empty)
            && self.key_themes.is_none()
            && self.critical_alerts.is_none()
            && self.tools.is_none()
            && self.trends.is_none()
            && self.takeaways.is_none()
    }
}

/// One run of text inside a newsletter item, bold or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmphasisSpan {
    pub text: String,
    pub strong: bool,
}

/// Length in UTF-16 code units, the unit the length thresholds are written
/// in. Characters outside the Basic Multilingual Plane, such as most emoji,
/// count as two.
fn text_len(s: &str) -> usize {
    s.encode_utf16().count()
}

/// Split text after each `.`, `!` or `?` that is followed by whitespace.
///
/// The punctuation stays attached to the sentence it ends.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END_RE.find_iter(text) {
        // The punctuation is a single ASCII byte.
        sentences.push(&text[start..=m.start()]);
        start = m.end();
    }
    sentences.push(&text[start..]);
    sentences
}

/// Split every point on `splitter`, replacing it with its parts when there is
/// more than one part and all of them are longer than `min_part_chars`.
fn subdivide(points: Vec<String>, splitter: &Regex, min_part_chars: usize) -> Vec<String> {
    let mut out = Vec::new();
    for point in points {
        let parts: Vec<&str> = splitter.split(&point).collect();
        if parts.len() > 1 && parts.iter().all(|p| text_len(p) > min_part_chars) {
            for part in parts {
                if out.len() < MAX_BULLET_POINTS {
                    out.push(part.trim().to_string());
                }
            }
        } else {
            out.push(point);
        }
    }
    out
}

/// Break an article summary into at most five bullet points.
///
/// Sentences are used first. When that yields fewer than three points the
/// points are subdivided on semicolons, and failing that on spaced dashes.
/// Abbreviations such as "U.S." and decimals are not special-cased.
///
/// Returns `None` for an empty summary.
pub fn segment_article_summary(summary: &str) -> Option<ArticleSummary> {
    if summary.is_empty() {
        return None;
    }

    let mut points: Vec<String> = Vec::new();
    let sentences = split_sentences(summary)
        .into_iter()
        .map(str::trim)
        .filter(|s| text_len(s) > MIN_SENTENCE_CHARS);

    for sentence in sentences {
        if points.len() >= MAX_BULLET_POINTS {
            break;
        }
        let point = sentence.strip_suffix('.').unwrap_or(sentence);
        if text_len(point) > MIN_POINT_CHARS {
            points.push(point.to_string());
        }
    }

    if !points.is_empty() && points.len() < MIN_DESIRED_POINTS {
        points = subdivide(points, &SEMICOLON_RE, MIN_SEMICOLON_PART_CHARS);
        if points.len() < MIN_DESIRED_POINTS {
            points = subdivide(points, &DASH_RE, MIN_DASH_PART_CHARS);
        }
    }

    points.truncate(MAX_BULLET_POINTS);

    Some(ArticleSummary {
        overview: summary.to_string(),
        bullet_points: points,
    })
}

/// Split text immediately before every `##` header marker.
fn split_sections(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for m in SECTION_HEADER_RE.find_iter(text) {
        if m.start() > start {
            parts.push(&text[start..m.start()]);
        }
        start = m.start();
    }
    parts.push(&text[start..]);
    parts
}

/// Parse a newsletter executive summary into its named sections.
///
/// Text before the first `##` header becomes the intro, minus any leading
/// "Based on ...:" preamble. Each header is matched by keyword, first match
/// wins: "key theme", "critical alert", "tool"/"resource", "trend",
/// "takeaway"/"actionable". Sections with any other header are dropped.
pub fn parse_executive_summary(summary: &str) -> ExecutiveSummarySections {
    let mut sections = ExecutiveSummarySections::default();

    for part in split_sections(summary) {
        let trimmed = part.trim();

        if !trimmed.starts_with("##") {
            if !trimmed.is_empty() {
                let intro = PREAMBLE_RE.replace(trimmed, "");
                sections.intro = Some(intro.trim().to_string());
            }
            continue;
        }

        let mut lines = trimmed.split('\n');
        let header = lines
            .next()
            .map(|line| HEADER_MARKER_RE.replace(line, "").to_lowercase())
            .unwrap_or_default();
        let items: Vec<String> = lines
            .map(|line| BULLET_RE.replace(line, "").trim().to_string())
            .filter(|line| !line.is_empty() && !line.starts_with("##"))
            .collect();

        if header.contains("key theme") {
            sections.key_themes = Some(items);
        } else if header.contains("critical alert") {
            sections.critical_alerts = Some(items);
        } else if header.contains("tool") || header.contains("resource") {
            sections.tools = Some(items);
        } else if header.contains("trend") {
            sections.trends = Some(items);
        } else if header.contains("takeaway") || header.contains("actionable") {
            sections.takeaways = Some(items);
        }
    }

    sections
}

/// Split a newsletter item into plain and `**bold**` runs.
pub fn emphasis_spans(text: &str) -> Vec<EmphasisSpan> {
    let mut spans = Vec::new();
    let mut last = 0;
    for m in EMPHASIS_RE.find_iter(text) {
        if m.start() > last {
            spans.push(EmphasisSpan {
                text: text[last..m.start()].to_string(),
                strong: false,
            });
        }
        let inner = &m.as_str()[2..m.as_str().len() - 2];
        spans.push(EmphasisSpan {
            text: inner.to_string(),
            strong: true,
        });
        last = m.end();
    }
    if last < text.len() {
        spans.push(EmphasisSpan {
            text: text[last..].to_string(),
            strong: false,
        });
    }
    spans
}
