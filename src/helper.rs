use axum::response::{IntoResponse, Response};
use http::{
    header::{InvalidHeaderValue, CACHE_CONTROL, CONTENT_TYPE},
    HeaderMap, HeaderName, HeaderValue, StatusCode,
};
use thiserror::Error;

pub const CDN_CACHE_CONTROL: HeaderName = HeaderName::from_static("cdn-cache-control");

pub const NO_CACHE: &str = "no-cache, no-store, must-revalidate";

const PLAIN_TEXT: &str = "text/plain; charset=utf-8";

/// The fixed public caching policy applied to every static and proxied response.
#[derive(Clone, Debug)]
pub struct CachePolicy {
    max_age: u64,
    cache_control: HeaderValue,
    cdn_cache_control: HeaderValue,
}

impl CachePolicy {
    pub fn new(max_age: u64) -> Result<Self, InvalidHeaderValue> {
        Ok(Self {
            max_age,
            cache_control: HeaderValue::from_str(&format!("public, max-age={max_age}"))?,
            cdn_cache_control: HeaderValue::from_str(&format!("max-age={max_age}"))?,
        })
    }

    pub fn max_age(&self) -> u64 {
        self.max_age
    }

    /// Overwrites any cache directives already present.
    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(CACHE_CONTROL, self.cache_control.clone());
        headers.insert(CDN_CACHE_CONTROL, self.cdn_cache_control.clone());
    }

    pub fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::with_capacity(3);
        self.apply(&mut headers);

        headers
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to build upstream url")]
    Url(#[from] url::ParseError),
    #[error("upstream request failed")]
    Upstream(#[from] reqwest::Error),
    #[error("invalid header value")]
    Header(#[from] InvalidHeaderValue),
}

impl RelayError {
    /// Logs the failure and renders it as a cacheable 502.
    pub fn bad_gateway(self, cache: &CachePolicy) -> Response {
        tracing::error!("{}", error_chain(&self));

        let mut headers = cache.headers();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(PLAIN_TEXT));

        (StatusCode::BAD_GATEWAY, headers, "Bad Gateway").into_response()
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();

    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }

    message
}

pub fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not Found").into_response()
}

pub fn service_unavailable() -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").into_response()
}
