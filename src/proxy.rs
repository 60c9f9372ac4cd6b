use axum::{
    body::{Body, HttpBody, StreamBody},
    response::{IntoResponse, Response},
};
use http::{
    header::{InvalidHeaderValue, CACHE_CONTROL, CONTENT_TYPE, HOST, LOCATION},
    HeaderMap, HeaderValue, Request, StatusCode,
};
use reqwest::Client;

use crate::{
    helper::{CachePolicy, RelayError, NO_CACHE},
    route::RouteMatch,
};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Sends the request to the matched upstream and streams its response back.
pub async fn forward(
    client: &Client,
    cache: &CachePolicy,
    matched: &RouteMatch<'_>,
    request: Request<Body>,
) -> Result<Response, RelayError> {
    let (parts, body) = request.into_parts();

    let url = matched.upstream_url_with_query(parts.uri.query())?;

    let mut headers = parts.headers;
    headers.remove(HOST);

    tracing::debug!("Forwarding {} to {}", parts.method, url);

    let mut upstream = client.request(parts.method, url).headers(headers);
    if !body.is_end_stream() {
        upstream = upstream.body(reqwest::Body::wrap_stream(body));
    }

    let response = upstream.send().await?;

    let status = response.status();
    let mut headers = response.headers().clone();
    cache.apply(&mut headers);
    with_charset(&mut headers)?;

    Ok((status, headers, StreamBody::new(response.bytes_stream())).into_response())
}

/// Raw mode: points the client at the origin and never contacts it.
pub fn redirect(matched: &RouteMatch<'_>, query: Option<&str>) -> Result<Response, RelayError> {
    let location = matched.redirect_location(query)?;

    tracing::debug!("Redirecting to {}", location);

    Ok((
        StatusCode::FOUND,
        [
            (LOCATION, HeaderValue::try_from(location)?),
            (CACHE_CONTROL, HeaderValue::from_static(NO_CACHE)),
        ],
    )
        .into_response())
}

fn with_charset(headers: &mut HeaderMap) -> Result<(), InvalidHeaderValue> {
    let content_type = match headers.get(CONTENT_TYPE).map(HeaderValue::to_str) {
        None => DEFAULT_CONTENT_TYPE,
        Some(Ok(content_type)) => content_type,
        Some(Err(_)) => return Ok(()),
    };

    if content_type.to_ascii_lowercase().contains("charset=") {
        return Ok(());
    }

    let value = HeaderValue::from_str(&format!(
        "{}; charset=utf-8",
        content_type.trim_end_matches(|c: char| c == ';' || c == ' ')
    ))?;
    headers.insert(CONTENT_TYPE, value);

    Ok(())
}
