//! CORS handling.
//!
//! Preflight requests are answered with `204 No Content`; every other
//! response gets `Access-Control-Allow-Origin` when the origin is allowed.

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ORIGIN, VARY,
};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use super::AppState;

const ALLOW_METHODS: &str = "GET,OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// Origin allow-list. A `*` entry allows every origin.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allowed: Vec<String>,
}

impl CorsPolicy {
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed: allowed
                .into_iter()
                .map(|o| o.trim().trim_end_matches('/').to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }

    fn allows_any(&self) -> bool {
        self.allowed.iter().any(|o| o == "*")
    }

    /// Value for `Access-Control-Allow-Origin`, if the request origin is allowed.
    pub fn allow_origin(&self, origin: Option<&str>) -> Option<HeaderValue> {
        if self.allows_any() {
            return Some(HeaderValue::from_static("*"));
        }

        let origin = origin?;
        let normalized = origin.trim_end_matches('/');
        self.allowed
            .iter()
            .any(|o| o == normalized)
            .then(|| HeaderValue::from_str(origin).ok())
            .flatten()
    }

    fn apply(&self, response: &mut Response, origin: Option<&str>, preflight: bool) {
        let headers = response.headers_mut();

        if let Some(value) = self.allow_origin(origin) {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
        }
        if !self.allows_any() {
            headers.insert(VARY, HeaderValue::from_static("Origin"));
        }
        if preflight {
            headers.insert(
                ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static(ALLOW_METHODS),
            );
            headers.insert(
                ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static(ALLOW_HEADERS),
            );
        }
    }
}

pub(super) async fn cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        state.cors.apply(&mut response, origin.as_deref(), true);
        return response;
    }

    let mut response = next.run(request).await;
    state.cors.apply(&mut response, origin.as_deref(), false);
    response
}
