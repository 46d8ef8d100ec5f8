use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::Deserialize;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::client::{resolve_base_url, ApiClient, ExecutionContext};
use crate::config::Config;
use crate::dashboard::{
    self, ArchiveDate, DIGEST_LOAD_ERROR, NEWSLETTER_EMPTY_MESSAGE, STATS_UNAVAILABLE_MESSAGE,
};
use crate::error::ApiError;
use crate::models::{
    category_color, category_label, Article, ArticleQuery, Category, FetchLog, Newsletter, Source,
    Stats,
};
use crate::proxy::{self, ProxyState};
use crate::segment::{self, EmphasisSpan};

const DEFAULT_LOG_LIMIT: u32 = 10;
/// A category section features its first article when it has more than this.
const FEATURE_THRESHOLD: usize = 3;

pub struct AppState {
    pub client: ApiClient,
    pub config: Config,
}

impl AppState {
    fn layout(&self, active_tab: &'static str) -> Layout {
        Layout {
            active_tab,
            api_base: resolve_base_url(ExecutionContext::Browser, &self.config),
            ga_measurement_id: self.config.ga_measurement_id.clone().unwrap_or_default(),
        }
    }
}

/// Build the dashboard router with the `/api` proxy in front of it.
pub fn router(state: Arc<AppState>, proxy: ProxyState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/newsletter", get(newsletter))
        .route("/articles", get(article_list))
        .route("/articles/:id", get(article_detail))
        .route("/categories/:category", get(category_articles))
        .route("/logs", get(fetch_logs))
        .route("/logs/:id", get(fetch_log))
        .route("/sources", get(sources))
        .route("/fetch/trigger", post(trigger_fetch))
        .route("/newsletter/trigger", post(trigger_newsletter))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new("static"))
        .fallback(not_found)
        .with_state(state)
        .layer(middleware::from_fn_with_state(proxy, proxy::forward_api))
        .layer(TraceLayer::new_for_http())
}

// Shared page chrome
pub struct Layout {
    pub active_tab: &'static str,
    /// Base URL for API calls made from the browser; empty means relative.
    pub api_base: String,
    pub ga_measurement_id: String,
}

// Template structs
#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub layout: Layout,
    pub date_label: String,
    pub selected_date: String,
    pub viewing_today: bool,
    pub today_href: String,
    pub archive: Vec<ArchiveLink>,
    pub error: String,
    pub has_articles: bool,
    pub total_articles: u32,
    /// Articles in view: the filtered category's count, or the digest total.
    pub shown_articles: usize,
    pub all_href: String,
    pub all_active: bool,
    pub filters: Vec<FilterLink>,
    pub sections: Vec<SectionView>,
    pub stats: StatsPanelView,
}

#[derive(Template)]
#[template(path = "article.html")]
pub struct ArticleTemplate {
    pub layout: Layout,
    pub article: ArticleDetailView,
}

#[derive(Template)]
#[template(path = "article_list.html")]
pub struct ArticleListTemplate {
    pub layout: Layout,
    pub heading: String,
    pub color: String,
    pub subtitle: String,
    pub articles: Vec<ArticleCardView>,
}

#[derive(Template)]
#[template(path = "newsletter.html")]
pub struct NewsletterTemplate {
    pub layout: Layout,
    pub newsletter: Option<NewsletterView>,
    pub empty_message: &'static str,
}

#[derive(Template)]
#[template(path = "logs.html")]
pub struct LogsTemplate {
    pub layout: Layout,
    pub logs: Vec<FetchLogView>,
}

#[derive(Template)]
#[template(path = "sources.html")]
pub struct SourcesTemplate {
    pub layout: Layout,
    pub sources: Vec<SourceView>,
}

#[derive(Template)]
#[template(path = "trigger_result.html")]
pub struct TriggerResultTemplate {
    pub ok: bool,
    pub message: String,
    pub status: String,
}

// View models
pub struct ArchiveLink {
    pub href: String,
    pub label: String,
    pub year: String,
    pub selected: bool,
}

pub struct FilterLink {
    pub label: &'static str,
    pub color: &'static str,
    pub href: String,
    pub active: bool,
    pub count: usize,
}

pub struct SectionView {
    pub key: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub count_label: String,
    pub articles: Vec<ArticleCardView>,
}

pub struct ArticleCardView {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub color: &'static str,
    pub source: String,
    pub published: String,
    pub summary: String,
    pub relevance: String,
    pub sentiment_emoji: &'static str,
    pub tags: Vec<String>,
    pub featured: bool,
}

impl ArticleCardView {
    fn new(article: &Article, now: DateTime<Utc>) -> Self {
        Self {
            id: article.id,
            title: article.title.clone(),
            url: article.url.clone(),
            color: category_color(&article.category),
            source: article.source_name.clone().unwrap_or_default(),
            published: published_relative(article, now),
            summary: article.summary.clone().unwrap_or_default(),
            relevance: dashboard::relevance_percent(article.relevance_score)
                .map(|p| format!("{p}%"))
                .unwrap_or_default(),
            sentiment_emoji: dashboard::sentiment_emoji(article.sentiment),
            tags: article.ai_tags.clone().unwrap_or_default(),
            featured: false,
        }
    }
}

pub struct ArticleDetailView {
    pub title: String,
    pub url: String,
    pub category_label: String,
    pub color: &'static str,
    pub source: String,
    pub published: String,
    pub published_full: String,
    pub has_summary: bool,
    pub overview: String,
    pub bullet_points: Vec<String>,
    pub key_points: Vec<String>,
    pub tags: Vec<String>,
    pub sentiment_label: &'static str,
    pub sentiment_emoji: &'static str,
    pub relevance: String,
}

impl ArticleDetailView {
    fn new(article: &Article, now: DateTime<Utc>) -> Self {
        let summary = article
            .summary
            .as_deref()
            .and_then(segment::segment_article_summary);

        Self {
            title: article.title.clone(),
            url: article.url.clone(),
            category_label: category_label(&article.category),
            color: category_color(&article.category),
            source: article.source_name.clone().unwrap_or_default(),
            published: published_relative(article, now),
            published_full: article
                .published_at
                .map(|at| at.format("%B %-d, %Y • %-I:%M %p").to_string())
                .unwrap_or_default(),
            has_summary: summary.is_some(),
            overview: summary
                .as_ref()
                .map(|s| s.overview.clone())
                .unwrap_or_default(),
            bullet_points: summary.map(|s| s.bullet_points).unwrap_or_default(),
            key_points: article.key_points.clone().unwrap_or_default(),
            tags: article.ai_tags.clone().unwrap_or_default(),
            sentiment_label: dashboard::sentiment_label(article.sentiment),
            sentiment_emoji: dashboard::sentiment_emoji(article.sentiment),
            relevance: dashboard::relevance_percent(article.relevance_score)
                .map(|p| format!("{p}%"))
                .unwrap_or_default(),
        }
    }
}

pub struct CategoryShareView {
    pub label: String,
    pub color: &'static str,
    pub count: u32,
    pub percent: u32,
}

pub struct StatsPanelView {
    pub available: bool,
    pub message: &'static str,
    pub total_articles: u32,
    pub processed_percent: u32,
    pub total_sources: u32,
    pub active_sources: u32,
    pub last_fetch: String,
    pub next_sync: String,
    pub fetch_interval_hours: u32,
    pub categories: Vec<CategoryShareView>,
}

impl StatsPanelView {
    fn new(stats: Option<&Stats>, now: DateTime<Utc>) -> Self {
        let Some(stats) = stats else {
            return Self {
                available: false,
                message: STATS_UNAVAILABLE_MESSAGE,
                total_articles: 0,
                processed_percent: 0,
                total_sources: 0,
                active_sources: 0,
                last_fetch: String::new(),
                next_sync: String::new(),
                fetch_interval_hours: 0,
                categories: Vec::new(),
            };
        };

        // Known categories first in display order, then anything else the
        // backend reports.
        let known = Category::ALL.iter().map(|c| c.key().to_string());
        let extra = stats
            .articles_by_category
            .keys()
            .filter(|k| k.parse::<Category>().is_err())
            .cloned();
        let categories = known
            .chain(extra)
            .map(|key| {
                let count = stats.articles_by_category.get(&key).copied().unwrap_or(0);
                CategoryShareView {
                    label: category_label(&key),
                    color: category_color(&key),
                    count,
                    percent: dashboard::category_share(count, stats.total_articles),
                }
            })
            .collect();

        Self {
            available: true,
            message: STATS_UNAVAILABLE_MESSAGE,
            total_articles: stats.total_articles,
            processed_percent: dashboard::processed_percent(stats),
            total_sources: stats.total_sources,
            active_sources: stats.active_sources,
            last_fetch: dashboard::last_fetch_label(stats, now),
            next_sync: dashboard::next_sync_label(stats, now).unwrap_or_default(),
            fetch_interval_hours: stats.fetch_interval_hours,
            categories,
        }
    }
}

pub struct NewsletterSectionView {
    pub title: &'static str,
    pub accent: &'static str,
    pub items: Vec<Vec<EmphasisSpan>>,
}

pub struct NewsletterView {
    pub title: String,
    pub url: String,
    pub published: String,
    pub has_summary: bool,
    pub intro: String,
    pub sections: Vec<NewsletterSectionView>,
    pub takeaways: Vec<Vec<EmphasisSpan>>,
    pub content: String,
}

impl NewsletterView {
    fn new(newsletter: &Newsletter) -> Self {
        let parsed = newsletter
            .executive_summary
            .as_deref()
            .map(segment::parse_executive_summary);

        let spans = |items: &Option<Vec<String>>| -> Vec<Vec<EmphasisSpan>> {
            items
                .iter()
                .flatten()
                .map(|item| segment::emphasis_spans(item))
                .collect()
        };

        let (intro, sections, takeaways) = match &parsed {
            Some(p) => {
                let sections: Vec<NewsletterSectionView> = [
                    ("Key Themes", "#4FD1C5", &p.key_themes),
                    ("Critical Alerts", "#F45D5D", &p.critical_alerts),
                    ("Tools & Resources", "#1F6F4A", &p.tools),
                    ("Industry Trends", "#F2B84B", &p.trends),
                ]
                .into_iter()
                .map(|(title, accent, items)| NewsletterSectionView {
                    title,
                    accent,
                    items: spans(items),
                })
                .filter(|s| !s.items.is_empty())
                .collect();
                (
                    p.intro.clone().unwrap_or_default(),
                    sections,
                    spans(&p.takeaways),
                )
            }
            None => (String::new(), Vec::new(), Vec::new()),
        };

        Self {
            title: newsletter.title.clone(),
            url: newsletter.url.clone(),
            published: newsletter
                .published_at
                .map(|at| at.format("%A, %B %-d, %Y").to_string())
                .unwrap_or_default(),
            has_summary: parsed.is_some(),
            intro,
            sections,
            takeaways,
            content: newsletter.content.clone().unwrap_or_default(),
        }
    }
}

pub struct FetchLogView {
    pub id: i64,
    pub status: String,
    pub started: String,
    pub completed: String,
    pub articles_fetched: u32,
    pub articles_processed: u32,
    pub errors: Vec<String>,
}

impl FetchLogView {
    fn new(log: &FetchLog, now: DateTime<Utc>) -> Self {
        Self {
            id: log.id,
            status: log.status.clone(),
            started: dashboard::relative_time(log.started_at, now),
            completed: log
                .completed_at
                .map(|at| dashboard::relative_time(at, now))
                .unwrap_or_else(|| "In progress".to_string()),
            articles_fetched: log.articles_fetched,
            articles_processed: log.articles_processed,
            errors: log.errors.clone().unwrap_or_default(),
        }
    }
}

pub struct SourceView {
    pub name: String,
    pub url: String,
    pub feed_url: String,
    pub category_label: String,
    pub color: &'static str,
    pub active: bool,
}

impl From<&Source> for SourceView {
    fn from(source: &Source) -> Self {
        Self {
            name: source.name.clone(),
            url: source.url.clone(),
            feed_url: source.feed_url.clone(),
            category_label: category_label(&source.category),
            color: category_color(&source.category),
            active: source.active,
        }
    }
}

fn published_relative(article: &Article, now: DateTime<Utc>) -> String {
    article
        .published_at
        .map(|at| dashboard::relative_time(at, now))
        .unwrap_or_else(|| "Unknown date".to_string())
}

fn article_count_label(count: usize) -> String {
    if count == 1 {
        "1 article".to_string()
    } else {
        format!("{count} articles")
    }
}

/// Link to the digest page for `date` with an optional category filter.
fn digest_href(date: Option<&str>, category: Option<Category>) -> String {
    let mut params = Vec::new();
    if let Some(date) = date {
        params.push(format!("date={date}"));
    }
    if let Some(category) = category {
        params.push(format!("category={}", category.key()));
    }
    if params.is_empty() {
        "/".to_string()
    } else {
        format!("/?{}", params.join("&"))
    }
}

// Wrapper for HTML responses
struct HtmlTemplate<T>(T);

impl<T: Template> IntoResponse for HtmlTemplate<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template: {}", err),
            )
                .into_response(),
        }
    }
}

// Custom error type
pub struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<ApiError>() {
            Some(ApiError::Status { status: 404, .. }) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, format!("Error: {}", self.0)).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

#[derive(Deserialize)]
pub struct IndexQuery {
    pub date: Option<String>,
    pub category: Option<String>,
}

// Route handlers
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IndexQuery>,
) -> impl IntoResponse {
    let today = Local::now().date_naive();
    HtmlTemplate(build_index(&state, &query, today, Utc::now()).await)
}

async fn build_index(
    state: &AppState,
    query: &IndexQuery,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> IndexTemplate {
    let selected = dashboard::parse_date_param(query.date.as_deref(), today);
    let active = query
        .category
        .as_deref()
        .and_then(|c| c.parse::<Category>().ok());
    let viewing_today = dashboard::is_today(selected, today);
    let selected_date = dashboard::format_date_param(selected);
    let date_param = (!viewing_today).then_some(selected_date.as_str());

    // Stats never hold up the digest; both run concurrently.
    let (digest, stats) = tokio::join!(
        dashboard::load_digest(&state.client, selected),
        dashboard::load_stats(&state.client),
    );

    let (error, digest, available_dates) = match digest {
        Ok(load) => (String::new(), Some(load.digest), load.available_dates),
        Err(_) => (DIGEST_LOAD_ERROR.to_string(), None, Vec::new()),
    };

    let archive: Vec<ArchiveLink> = dashboard::archive_dates(&available_dates, selected, today)
        .into_iter()
        .map(|ArchiveDate { value, label, year, selected }| ArchiveLink {
            href: digest_href(Some(&value), active),
            label,
            year,
            selected,
        })
        .collect();

    let filters: Vec<FilterLink> = Category::ALL
        .into_iter()
        .map(|category| FilterLink {
            label: category.label(),
            color: category.color(),
            href: digest_href(date_param, dashboard::toggle_filter(active, Some(category))),
            active: active == Some(category),
            count: digest
                .as_ref()
                .map_or(0, |d| d.articles_for(category).len()),
        })
        .collect();

    let sections: Vec<SectionView> = digest
        .as_ref()
        .map(|digest| {
            dashboard::displayed_categories(active)
                .into_iter()
                .filter_map(|category| {
                    let articles = digest.articles_for(category);
                    if articles.is_empty() {
                        return None;
                    }
                    let featured = articles.len() > FEATURE_THRESHOLD;
                    let count_label = if articles.len() == 1 {
                        "1 story".to_string()
                    } else {
                        format!("{} stories", articles.len())
                    };
                    Some(SectionView {
                        key: category.key(),
                        label: category.full_label(),
                        color: category.color(),
                        icon: category.icon(),
                        count_label,
                        articles: articles
                            .iter()
                            .enumerate()
                            .map(|(i, article)| ArticleCardView {
                                featured: featured && i == 0,
                                ..ArticleCardView::new(article, now)
                            })
                            .collect(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let all_href = digest_href(date_param, None);
    let shown_articles = match (&digest, active) {
        (Some(d), Some(category)) => d.articles_for(category).len(),
        (Some(d), None) => d.total_articles as usize,
        (None, _) => 0,
    };

    IndexTemplate {
        layout: state.layout("digest"),
        date_label: dashboard::date_label(selected, today),
        selected_date,
        viewing_today,
        today_href: digest_href(None, active),
        archive,
        error,
        has_articles: digest.as_ref().is_some_and(|d| d.has_articles()),
        total_articles: digest.as_ref().map_or(0, |d| d.total_articles),
        shown_articles,
        all_href,
        all_active: active.is_none(),
        filters,
        sections,
        stats: StatsPanelView::new(stats.as_ref(), now),
    }
}

pub async fn newsletter(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let newsletter = dashboard::load_newsletter(&state.client).await;
    HtmlTemplate(NewsletterTemplate {
        layout: state.layout("newsletter"),
        newsletter: newsletter.as_ref().map(NewsletterView::new),
        empty_message: NEWSLETTER_EMPTY_MESSAGE,
    })
}

pub async fn article_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let article = state.client.article(id).await?;
    Ok(HtmlTemplate(ArticleTemplate {
        layout: state.layout("digest"),
        article: ArticleDetailView::new(&article, Utc::now()),
    }))
}

pub async fn article_list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticleQuery>,
) -> Result<impl IntoResponse, AppError> {
    let articles = state.client.articles(&query).await?;
    let now = Utc::now();

    let heading = query
        .category
        .as_deref()
        .map_or_else(|| "All Articles".to_string(), category_label);
    let count = article_count_label(articles.len());
    let subtitle = match query.featured_date.as_deref().filter(|d| !d.is_empty()) {
        Some(date) => format!("{date} · {count}"),
        None => count,
    };

    Ok(HtmlTemplate(ArticleListTemplate {
        layout: state.layout("digest"),
        color: query
            .category
            .as_deref()
            .map_or(crate::models::DEFAULT_CATEGORY_COLOR, category_color)
            .to_string(),
        heading,
        subtitle,
        articles: articles
            .iter()
            .map(|a| ArticleCardView::new(a, now))
            .collect(),
    }))
}

#[derive(Deserialize)]
pub struct CategoryQuery {
    pub date: Option<String>,
}

pub async fn category_articles(
    State(state): State<Arc<AppState>>,
    Path(category): Path<String>,
    Query(query): Query<CategoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let result = state
        .client
        .category_articles(&category, query.date.as_deref())
        .await?;
    let now = Utc::now();

    Ok(HtmlTemplate(ArticleListTemplate {
        layout: state.layout("digest"),
        heading: category_label(&result.category),
        color: category_color(&result.category).to_string(),
        subtitle: article_count_label(result.total as usize),
        articles: result
            .articles
            .iter()
            .map(|a| ArticleCardView::new(a, now))
            .collect(),
    }))
}

#[derive(Deserialize)]
pub struct LogsQuery {
    #[serde(default = "default_log_limit")]
    pub limit: u32,
}

fn default_log_limit() -> u32 {
    DEFAULT_LOG_LIMIT
}

pub async fn fetch_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let logs = state.client.fetch_logs(query.limit).await?;
    let now = Utc::now();
    Ok(HtmlTemplate(LogsTemplate {
        layout: state.layout("logs"),
        logs: logs.iter().map(|log| FetchLogView::new(log, now)).collect(),
    }))
}

pub async fn fetch_log(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let log = state.client.fetch_log(id).await?;
    Ok(HtmlTemplate(LogsTemplate {
        layout: state.layout("logs"),
        logs: vec![FetchLogView::new(&log, Utc::now())],
    }))
}

pub async fn sources(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let sources = state.client.sources().await?;
    Ok(HtmlTemplate(SourcesTemplate {
        layout: state.layout("sources"),
        sources: sources.iter().map(SourceView::from).collect(),
    }))
}

fn trigger_response<T>(
    action: &str,
    result: Result<T, ApiError>,
    describe: impl FnOnce(T) -> (String, String),
) -> impl IntoResponse {
    match result {
        Ok(value) => {
            let (message, status) = describe(value);
            info!("{} triggered: {}", action, status);
            (
                StatusCode::OK,
                HtmlTemplate(TriggerResultTemplate {
                    ok: true,
                    message,
                    status,
                }),
            )
        }
        Err(e) => {
            error!("Failed to trigger {}: {}", action, e);
            (
                StatusCode::BAD_GATEWAY,
                HtmlTemplate(TriggerResultTemplate {
                    ok: false,
                    message: format!("Failed to trigger {action}: {e}"),
                    status: "error".to_string(),
                }),
            )
        }
    }
}

pub async fn trigger_fetch(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    trigger_response("fetch", state.client.trigger_fetch().await, |t| {
        (t.message, t.status)
    })
}

pub async fn trigger_newsletter(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    trigger_response(
        "newsletter fetch",
        state.client.trigger_newsletter_fetch().await,
        |t| (t.message, t.status),
    )
}

pub async fn health() -> impl IntoResponse {
    Html("OK")
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Html("Not Found"))
}
