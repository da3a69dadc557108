//! Request plumbing for the operator API: request ids, operator keys, and a
//! shared request budget.

use std::{collections::HashSet, sync::Arc, time::Duration};

use axum::{
    extract::Request,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::{sync::Mutex, time::Instant};
use uuid::Uuid;

use crate::api::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest caller-supplied request id that is echoed back as-is.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation id for one API request, carried as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Operator keys accepted as bearer tokens. With no keys the API is open,
/// which is only allowed in development.
#[derive(Debug, Clone)]
pub struct AuthState {
    keys: Option<Arc<HashSet<String>>>,
}

impl AuthState {
    /// Reads operator keys from `REELBOT_API_KEYS`.
    ///
    /// # Errors
    ///
    /// See [`AuthState::from_keys`].
    pub fn from_env(is_development: bool) -> anyhow::Result<Self> {
        let raw = std::env::var("REELBOT_API_KEYS").unwrap_or_default();
        Self::from_keys(&raw, is_development)
    }

    /// Parses a comma-separated key list; blanks are ignored.
    ///
    /// # Errors
    ///
    /// Fails when no key is left and `is_development` is false.
    pub fn from_keys(raw: &str, is_development: bool) -> anyhow::Result<Self> {
        let keys: HashSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(ToOwned::to_owned)
            .collect();

        if !keys.is_empty() {
            return Ok(Self {
                keys: Some(Arc::new(keys)),
            });
        }
        if !is_development {
            anyhow::bail!("REELBOT_API_KEYS must name at least one operator key");
        }
        tracing::warn!("no operator keys configured; the API is open to any caller");
        Ok(Self { keys: None })
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.keys.is_none()
    }

    fn admits(&self, headers: &HeaderMap) -> bool {
        match &self.keys {
            None => true,
            Some(keys) => bearer_token(headers.get(AUTHORIZATION)).is_some_and(|t| keys.contains(t)),
        }
    }
}

#[derive(Debug)]
struct Window {
    opened_at: Instant,
    used: usize,
}

/// One fixed window of `capacity` requests shared by every protected route.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    capacity: usize,
    period: Duration,
    window: Arc<Mutex<Window>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(capacity: usize, period: Duration) -> Self {
        Self {
            capacity,
            period,
            window: Arc::new(Mutex::new(Window {
                opened_at: Instant::now(),
                used: 0,
            })),
        }
    }

    async fn try_acquire(&self) -> bool {
        let mut window = self.window.lock().await;
        if window.opened_at.elapsed() >= self.period {
            *window = Window {
                opened_at: Instant::now(),
                used: 0,
            };
        }
        if window.used == self.capacity {
            return false;
        }
        window.used += 1;
        true
    }
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map_or_else(String::new, |id| id.0.clone())
}

/// The caller's request id, if it is short enough to echo.
fn caller_request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN)
        .map(ToOwned::to_owned)
}

/// Tags the request with a [`RequestId`] and returns it in `x-request-id`.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = caller_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    req: Request,
    next: Next,
) -> Response {
    if auth.admits(req.headers()) {
        return next.run(req).await;
    }
    tracing::debug!(path = %req.uri().path(), "operator key rejected");
    ApiError::new(
        request_id_of(&req),
        "unauthorized",
        "missing or unknown operator key",
    )
    .into_response()
}

pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    if rate_limit.try_acquire().await {
        return next.run(req).await;
    }
    ApiError::new(
        request_id_of(&req),
        "rate_limited",
        "request budget exhausted; retry later",
    )
    .into_response()
}

fn bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
