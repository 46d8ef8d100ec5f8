//! Reverse proxy for `/api/*`.
//!
//! Requests under the API prefix are forwarded to the backend origin with the
//! same method, path, query, headers and body. Everything else falls through to
//! the dashboard routes.

use std::error::Error as StdError;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header, request::Parts, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use reqwest::Client;
use tracing::{debug, error, warn};

pub const API_PREFIX: &str = "/api/";

/// Largest request body the proxy will buffer.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct ProxyState {
    client: Client,
    origin: String,
}

impl ProxyState {
    pub fn new(origin: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent("NewsDigest/1.0 (Proxy)")
            .build()?;

        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    async fn forward(
        &self,
        target: String,
        parts: Parts,
        body: Bytes,
    ) -> anyhow::Result<Response> {
        let mut headers = parts.headers;
        headers.remove(header::HOST);

        let upstream = self
            .client
            .request(parts.method, &target)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        headers.remove(header::TRANSFER_ENCODING);
        headers.remove(header::CONNECTION);
        let bytes = upstream.bytes().await?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Backend URL for `uri`, or `None` when the path is not under [`API_PREFIX`].
pub fn rewrite_target(origin: &str, uri: &Uri) -> Option<String> {
    let path = uri.path();
    if !path.starts_with(API_PREFIX) {
        return None;
    }
    let path_and_query = uri.path_and_query().map_or(path, |pq| pq.as_str());
    Some(format!("{}{}", origin.trim_end_matches('/'), path_and_query))
}

fn exceeds_body_limit(err: &axum::Error) -> bool {
    std::iter::successors(Some(err as &(dyn StdError + 'static)), |e| (*e).source())
        .any(|e| e.is::<LengthLimitError>())
}

/// Middleware forwarding API requests to the backend.
///
/// Bodies larger than the buffer limit are rejected with `413` without
/// contacting the backend.
pub async fn forward_api(State(proxy): State<ProxyState>, req: Request, next: Next) -> Response {
    let Some(target) = rewrite_target(&proxy.origin, req.uri()) else {
        return next.run(req).await;
    };

    debug!("Proxying {} {} -> {}", req.method(), req.uri(), target);

    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) if exceeds_body_limit(&e) => {
            warn!(
                "Rejecting {} {}: body over {} bytes",
                parts.method, parts.uri, MAX_BODY_BYTES
            );
            return (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").into_response();
        }
        Err(e) => {
            warn!("Failed to read request body for {}: {}", parts.uri, e);
            return (StatusCode::BAD_REQUEST, "Bad Request").into_response();
        }
    };

    match proxy.forward(target, parts, body).await {
        Ok(response) => response,
        Err(e) => {
            error!("Proxy request to {} failed: {}", proxy.origin, e);
            (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use wiremock::matchers::{body_string, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_app(origin: &str) -> Router {
        let proxy = ProxyState::new(origin).unwrap();
        Router::new()
            .route("/", get(|| async { "dashboard" }))
            .fallback(|| async { (StatusCode::NOT_FOUND, "not found") })
            .layer(middleware::from_fn_with_state(proxy, forward_api))
    }

    async fn body_text(response: Response) -> String {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(body.to_vec()).unwrap()
    }

    mod rewrite_tests {
        use super::*;

        #[test]
        fn test_api_path_keeps_path_and_query() {
            let uri: Uri = "/api/digest?target_date=2026-10-18".parse().unwrap();
            assert_eq!(
                rewrite_target("http://backend:8000", &uri),
                Some("http://backend:8000/api/digest?target_date=2026-10-18".to_string())
            );
        }

        #[test]
        fn test_trailing_slash_on_origin() {
            let uri: Uri = "/api/stats".parse().unwrap();
            assert_eq!(
                rewrite_target("http://backend:8000/", &uri),
                Some("http://backend:8000/api/stats".to_string())
            );
        }

        #[test]
        fn test_non_api_paths_are_not_rewritten() {
            for raw in ["/", "/newsletter", "/apis", "/static/api/app.css"] {
                let uri: Uri = raw.parse().unwrap();
                assert_eq!(rewrite_target("http://backend:8000", &uri), None, "{raw}");
            }
        }

        #[test]
        fn test_origin_is_normalised() {
            let proxy = ProxyState::new("http://backend:8000/").unwrap();
            assert_eq!(proxy.origin(), "http://backend:8000");
        }
    }

    mod forwarding_tests {
        use super::*;

        #[tokio::test]
        async fn test_get_is_forwarded_with_query() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/fetch/logs"))
                .and(query_param("limit", "5"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_raw("[]", "application/json"),
                )
                .expect(1)
                .mount(&server)
                .await;

            let app = create_test_app(&server.uri());
            let response = app
                .oneshot(
                    axum::http::Request::builder()
                        .uri("/api/fetch/logs?limit=5")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers().get(header::CONTENT_TYPE).unwrap(),
                "application/json"
            );
            assert_eq!(body_text(response).await, "[]");
        }

        #[tokio::test]
        async fn test_post_body_is_forwarded() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/fetch/trigger"))
                .and(body_string("{}"))
                .respond_with(ResponseTemplate::new(202).set_body_string("queued"))
                .mount(&server)
                .await;

            let app = create_test_app(&server.uri());
            let response = app
                .oneshot(
                    axum::http::Request::builder()
                        .method("POST")
                        .uri("/api/fetch/trigger")
                        .body(Body::from("{}"))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::ACCEPTED);
            assert_eq!(body_text(response).await, "queued");
        }

        #[tokio::test]
        async fn test_backend_error_status_is_passed_through() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .and(path("/api/articles/99"))
                .respond_with(ResponseTemplate::new(404).set_body_string("missing"))
                .mount(&server)
                .await;

            let app = create_test_app(&server.uri());
            let response = app
                .oneshot(
                    axum::http::Request::builder()
                        .uri("/api/articles/99")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(body_text(response).await, "missing");
        }

        #[tokio::test]
        async fn test_non_api_request_passes_through() {
            let server = MockServer::start().await;
            Mock::given(method("GET"))
                .respond_with(ResponseTemplate::new(500))
                .expect(0)
                .mount(&server)
                .await;

            let app = create_test_app(&server.uri());
            let response = app
                .oneshot(axum::http::Request::builder().uri("/").body(Body::empty()).unwrap())
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_text(response).await, "dashboard");
        }

        #[tokio::test]
        async fn test_oversized_body_is_rejected_locally() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(200))
                .expect(0)
                .mount(&server)
                .await;

            let app = create_test_app(&server.uri());
            let response = app
                .oneshot(
                    axum::http::Request::builder()
                        .method("POST")
                        .uri("/api/fetch/trigger")
                        .body(Body::from(vec![b'x'; MAX_BODY_BYTES + 1]))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        }

        #[tokio::test]
        async fn test_body_at_limit_is_forwarded() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/fetch/trigger"))
                .respond_with(ResponseTemplate::new(200))
                .expect(1)
                .mount(&server)
                .await;

            let app = create_test_app(&server.uri());
            let response = app
                .oneshot(
                    axum::http::Request::builder()
                        .method("POST")
                        .uri("/api/fetch/trigger")
                        .body(Body::from(vec![b'x'; MAX_BODY_BYTES]))
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::OK);
        }

        #[tokio::test]
        async fn test_unreachable_backend_is_bad_gateway() {
            let app = create_test_app("http://127.0.0.1:1");
            let response = app
                .oneshot(
                    axum::http::Request::builder()
                        .uri("/api/stats")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        }
    }
}
