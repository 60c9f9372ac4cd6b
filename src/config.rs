use std::{env, num::ParseIntError, path::PathBuf};

use http::header::InvalidHeaderValue;
use thiserror::Error;

use crate::{
    helper::CachePolicy,
    route::{ProxyRoute, RouteError, RouteTable},
};

pub const DEFAULT_PORT: u16 = 3000;

/// Sixty days.
pub const DEFAULT_CACHE_MAX_AGE: u64 = 5184000;

pub const DEFAULT_HOMEPAGE_PATH: &str = "./index.html";
pub const DEFAULT_FAVICON_PATH: &str = "./favicon.ico";

const DEFAULT_ROUTES: &[(&str, &str)] = &[
    ("/imlazy/", "https://cdn.imlazy.ink:233/img/background/"),
    (
        "/image/",
        "https://cdn.statically.io/gh/FrecklyComb1728/image-cdn@master/image/",
    ),
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name} {value:?}")]
    Number {
        name: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },
    #[error("route entry {0:?} must be `prefix target [raw_template]`")]
    RouteFields(String),
    #[error("invalid route")]
    Route(#[from] RouteError),
    #[error("invalid cache policy")]
    CachePolicy(#[from] InvalidHeaderValue),
}

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub port: u16,
    pub cache: CachePolicy,
    pub homepage_path: PathBuf,
    pub favicon_path: PathBuf,
    pub routes: RouteTable,
}

impl RelayConfig {
    /// Reads `PORT`, `CACHE_MAX_AGE`, `HOMEPAGE_PATH`, `FAVICON_PATH` and `PROXY_ROUTES`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(value) => parse_number("PORT", value)?,
            None => DEFAULT_PORT,
        };

        let max_age = match lookup("CACHE_MAX_AGE") {
            Some(value) => parse_number("CACHE_MAX_AGE", value)?,
            None => DEFAULT_CACHE_MAX_AGE,
        };

        let routes = match lookup("PROXY_ROUTES") {
            Some(value) => parse_routes(&value)?,
            None => default_routes()?,
        };

        Ok(Self {
            port,
            cache: CachePolicy::new(max_age)?,
            homepage_path: lookup("HOMEPAGE_PATH")
                .unwrap_or_else(|| DEFAULT_HOMEPAGE_PATH.to_owned())
                .into(),
            favicon_path: lookup("FAVICON_PATH")
                .unwrap_or_else(|| DEFAULT_FAVICON_PATH.to_owned())
                .into(),
            routes: RouteTable::new(routes),
        })
    }

    /// Default settings serving the given routes.
    pub fn with_routes(routes: RouteTable) -> Result<Self, ConfigError> {
        Ok(Self {
            routes,
            ..Self::from_lookup(|_| None)?
        })
    }
}

fn parse_number<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = ParseIntError>,
{
    value
        .trim()
        .parse()
        .map_err(|source| ConfigError::Number {
            name,
            value,
            source,
        })
}

pub fn default_routes() -> Result<Vec<ProxyRoute>, RouteError> {
    DEFAULT_ROUTES
        .iter()
        .map(|(prefix, target)| ProxyRoute::new(*prefix, target, None))
        .collect()
}

/// Parses `prefix target [raw_template]` entries separated by `;`.
pub fn parse_routes(value: &str) -> Result<Vec<ProxyRoute>, ConfigError> {
    value
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| -> Result<ProxyRoute, ConfigError> {
            let fields: Vec<_> = entry.split_whitespace().collect();

            match fields[..] {
                [prefix, target] => Ok(ProxyRoute::new(prefix, target, None)?),
                [prefix, target, template] => {
                    Ok(ProxyRoute::new(prefix, target, Some(template.to_owned()))?)
                }
                _ => Err(ConfigError::RouteFields(entry.to_owned())),
            }
        })
        .collect()
}
