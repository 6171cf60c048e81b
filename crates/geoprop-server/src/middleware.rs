use std::{
    net::{IpAddr, SocketAddr},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use uuid::Uuid;

use crate::api::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Requests between sweeps of idle client windows.
const PRUNE_EVERY: usize = 1_024;

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Fixed-window request budget, tracked per client IP.
///
/// Requests with no peer address (in-process tests, unusual transports) share
/// one anonymous window.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    clients: Arc<DashMap<Option<IpAddr>, ClientWindow>>,
    seen: Arc<AtomicUsize>,
}

#[derive(Debug, Clone, Copy)]
struct ClientWindow {
    started_at: Instant,
    count: usize,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: Arc::new(DashMap::new()),
            seen: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counts one request from `client`; `false` once its budget is spent.
    fn admit(&self, client: Option<IpAddr>, now: Instant) -> bool {
        if self.seen.fetch_add(1, Ordering::Relaxed) % PRUNE_EVERY == PRUNE_EVERY - 1 {
            self.prune(now);
        }

        let mut entry = self.clients.entry(client).or_insert(ClientWindow {
            started_at: now,
            count: 0,
        });
        let window = entry.value_mut();
        if now.duration_since(window.started_at) >= self.window {
            window.started_at = now;
            window.count = 0;
        }
        if window.count >= self.max_requests {
            return false;
        }
        window.count += 1;
        true
    }

    /// Drops windows that have already rolled over.
    fn prune(&self, now: Instant) {
        self.clients
            .retain(|_, w| now.duration_since(w.started_at) < self.window);
    }

    #[cfg(test)]
    fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

fn client_ip(req: &Request) -> Option<IpAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Reuses a caller-supplied `x-request-id` or mints a `UUIDv4`, exposes it to
/// handlers as [`RequestId`] and echoes it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), ToOwned::to_owned);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;
    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, val);
    }
    res
}

/// Rejects a client with 429 once it has spent its budget for the window.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_ip(&req);
    if rate_limit.admit(client, Instant::now()) {
        return next.run(req).await;
    }

    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    tracing::warn!(
        client = ?client,
        path = %req.uri().path(),
        limit = rate_limit.max_requests,
        "rate limit exceeded"
    );
    ApiError::new(request_id, "rate_limited", "rate limit exceeded").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{self, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn limited_router(rate_limit: RateLimitState) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn_with_state(rate_limit, enforce_rate_limit))
            .layer(axum::middleware::from_fn(request_id))
    }

    fn get_from(peer: Option<[u8; 4]>) -> http::Request<Body> {
        let mut req = http::Request::builder()
            .uri("/")
            .body(Body::empty())
            .expect("request");
        if let Some(ip) = peer {
            req.extensions_mut()
                .insert(ConnectInfo(SocketAddr::from((ip, 40_000))));
        }
        req
    }

    #[tokio::test]
    async fn rate_limit_rejects_after_window_budget() {
        let app = limited_router(RateLimitState::new(2, Duration::from_secs(60)));
        for _ in 0..2 {
            let res = app.clone().oneshot(get_from(None)).await.expect("response");
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = app.oneshot(get_from(None)).await.expect("response");
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn each_client_gets_its_own_budget() {
        let app = limited_router(RateLimitState::new(1, Duration::from_secs(60)));
        let alice = Some([10, 0, 0, 1]);
        let bob = Some([10, 0, 0, 2]);

        let res = app.clone().oneshot(get_from(alice)).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);
        let res = app.clone().oneshot(get_from(alice)).await.expect("response");
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let res = app.oneshot(get_from(bob)).await.expect("response");
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn rolled_over_windows_are_pruned() {
        let limiter = RateLimitState::new(5, Duration::from_millis(10));
        let start = Instant::now();
        for i in 0..10u8 {
            assert!(limiter.admit(Some(IpAddr::from([10, 0, 0, i])), start));
        }
        assert_eq!(limiter.tracked_clients(), 10);

        limiter.prune(start + Duration::from_millis(20));
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[test]
    fn budget_resets_when_window_elapses() {
        let limiter = RateLimitState::new(1, Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.admit(None, start));
        assert!(!limiter.admit(None, start));
        assert!(limiter.admit(None, start + Duration::from_secs(61)));
    }

    #[tokio::test]
    async fn request_id_is_echoed_or_generated() {
        let app = limited_router(RateLimitState::new(10, Duration::from_secs(60)));
        let req = http::Request::builder()
            .uri("/")
            .header(REQUEST_ID_HEADER, "abc-123")
            .body(Body::empty())
            .expect("request");
        let res = app.clone().oneshot(req).await.expect("response");
        assert_eq!(res.headers()[REQUEST_ID_HEADER], "abc-123");

        let res = app.oneshot(get_from(None)).await.expect("response");
        let generated = res.headers()[REQUEST_ID_HEADER].to_str().expect("ascii");
        assert!(Uuid::parse_str(generated).is_ok());
    }
}
