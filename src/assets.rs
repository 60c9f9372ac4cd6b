use std::path::Path;

use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{header::CONTENT_TYPE, HeaderValue};
use tracing::instrument;

use crate::helper::{not_found, service_unavailable, CachePolicy};

const ICON: &str = "image/x-icon";
const HTML: &str = "text/html; charset=utf-8";

/// A file read once at startup. `None` when it could not be loaded.
#[derive(Clone, Debug, Default)]
pub struct PreloadedAsset(Option<Bytes>);

impl PreloadedAsset {
    #[instrument]
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read(path).await {
            Ok(data) => {
                tracing::info!("Loaded {} bytes.", data.len());
                Self(Some(data.into()))
            }
            Err(err) => {
                tracing::warn!("Asset unavailable: {}", err);
                Self::missing()
            }
        }
    }

    pub fn missing() -> Self {
        Self(None)
    }

    pub fn bytes(&self) -> Option<&Bytes> {
        self.0.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.0.is_some()
    }

    fn respond(&self, content_type: &'static str, cache: &CachePolicy) -> Option<Response> {
        let data = self.0.clone()?;

        let mut headers = cache.headers();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));

        Some((headers, data).into_response())
    }
}

impl From<Bytes> for PreloadedAsset {
    fn from(data: Bytes) -> Self {
        Self(Some(data))
    }
}

pub fn favicon_response(favicon: &PreloadedAsset, cache: &CachePolicy) -> Response {
    favicon.respond(ICON, cache).unwrap_or_else(not_found)
}

pub fn homepage_response(homepage: &PreloadedAsset, cache: &CachePolicy) -> Response {
    homepage.respond(HTML, cache).unwrap_or_else(service_unavailable)
}
