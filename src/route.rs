use std::slice;

use thiserror::Error;
use url::{form_urlencoded, Url};

/// Placeholder replaced by the sanitized path in raw redirect templates.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// Query parameter that switches a request to raw redirect mode.
pub const RAW_PARAM: &str = "raw";

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route prefix must be non-empty and start with '/', got {0:?}")]
    Prefix(String),
    #[error("invalid route target {target:?}")]
    Target {
        target: String,
        #[source]
        source: url::ParseError,
    },
    #[error("route target {0:?} cannot be used as a base url")]
    TargetBase(String),
}

/// A path prefix paired with the upstream base it is forwarded to.
#[derive(Clone, Debug)]
pub struct ProxyRoute {
    prefix: String,
    target: Url,
    raw_redirect_template: Option<String>,
}

impl ProxyRoute {
    pub fn new(
        prefix: impl Into<String>,
        target: &str,
        raw_redirect_template: Option<String>,
    ) -> Result<Self, RouteError> {
        let prefix = prefix.into();

        if !prefix.starts_with('/') {
            return Err(RouteError::Prefix(prefix));
        }

        let target = Url::parse(target).map_err(|source| RouteError::Target {
            target: target.to_owned(),
            source,
        })?;

        if target.cannot_be_a_base() {
            return Err(RouteError::TargetBase(target.into()));
        }

        Ok(Self {
            prefix,
            target,
            raw_redirect_template,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn target(&self) -> &Url {
        &self.target
    }

    pub fn raw_redirect_template(&self) -> Option<&str> {
        self.raw_redirect_template.as_deref()
    }
}

/// Routes ordered by descending prefix length, so the first match is the most specific.
#[derive(Clone, Debug)]
pub struct RouteTable {
    routes: Vec<ProxyRoute>,
}

impl RouteTable {
    pub fn new(mut routes: Vec<ProxyRoute>) -> Self {
        routes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Self { routes }
    }

    pub fn find(&self, path: &str) -> Option<RouteMatch<'_>> {
        self.routes.iter().find_map(|route| {
            path.strip_prefix(route.prefix.as_str())
                .map(|rest| RouteMatch {
                    route,
                    path: sanitize_path(rest),
                })
        })
    }

    pub fn iter(&self) -> slice::Iter<'_, ProxyRoute> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a ProxyRoute;
    type IntoIter = slice::Iter<'a, ProxyRoute>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Removes every `|`, collapses repeated slashes and drops the leading slash.
pub fn sanitize_path(path: &str) -> String {
    let mut sanitized = String::with_capacity(path.len());

    for c in path.chars().filter(|&c| c != '|') {
        if c == '/' && sanitized.ends_with('/') {
            continue;
        }
        sanitized.push(c);
    }

    match sanitized.strip_prefix('/') {
        Some(rest) => rest.to_owned(),
        None => sanitized,
    }
}

/// True when the first `raw` parameter of the query is exactly `true`.
pub fn is_raw_request(query: Option<&str>) -> bool {
    query
        .map(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == RAW_PARAM)
                .is_some_and(|(_, value)| value == "true")
        })
        .unwrap_or(false)
}

/// The query string with every `raw` pair removed, other pairs kept verbatim.
fn passthrough_query(query: &str) -> String {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            form_urlencoded::parse(pair.as_bytes())
                .next()
                .map_or(true, |(key, _)| key != RAW_PARAM)
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// A route selected for a request path, with the sanitized remainder of that path.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a ProxyRoute,
    pub path: String,
}

impl RouteMatch<'_> {
    /// Resolves the sanitized path against the route target, keeping any query the target carries.
    pub fn upstream_url(&self) -> Result<Url, url::ParseError> {
        let target = &self.route.target;
        let mut url = target.join(&format!("./{}", self.path))?;
        url.set_query(target.query());

        Ok(url)
    }

    /// Upstream url with the inbound query appended verbatim.
    pub fn upstream_url_with_query(&self, query: Option<&str>) -> Result<Url, url::ParseError> {
        let mut url = self.upstream_url()?;

        if let Some(query) = query.filter(|query| !query.is_empty()) {
            let combined = match url.query() {
                Some(existing) if !existing.is_empty() => format!("{existing}&{query}"),
                _ => query.to_owned(),
            };
            url.set_query(Some(&combined));
        }

        Ok(url)
    }

    pub fn redirect_location(&self, query: Option<&str>) -> Result<String, url::ParseError> {
        let mut location = match self.route.raw_redirect_template() {
            Some(template) if template.contains(PATH_PLACEHOLDER) => {
                template.replace(PATH_PLACEHOLDER, &self.path)
            }
            _ => self.upstream_url()?.into(),
        };

        let passthrough = passthrough_query(query.unwrap_or_default());
        if !passthrough.is_empty() {
            location.push(if location.contains('?') { '&' } else { '?' });
            location.push_str(&passthrough);
        }

        Ok(location)
    }
}
