//! URL predicates deciding how a request is routed.

use url::Url;

const ASSET_EXTENSIONS: &[&str] = &[
  ".js", ".css", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".woff", ".woff2", ".ttf",
  ".eot",
];

const API_SEGMENT: &str = "/api/";

/// Broad category of a request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
  Asset,
  Api,
  Other,
}

impl RequestKind {
  pub fn of(url: &str) -> Self {
    if is_api_request(url) {
      RequestKind::Api
    } else if is_asset_request(url) {
      RequestKind::Asset
    } else {
      RequestKind::Other
    }
  }
}

/// Path component of a URL. Falls back to the raw text minus query and
/// fragment when the URL does not parse (e.g. a bare path).
fn url_path(url: &str) -> String {
  match Url::parse(url) {
    Ok(parsed) => parsed.path().to_string(),
    Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
  }
}

/// True iff the URL path ends with a static file extension.
pub fn is_asset_request(url: &str) -> bool {
  let path = url_path(url).to_ascii_lowercase();
  ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// True iff the URL path contains an API segment.
pub fn is_api_request(url: &str) -> bool {
  url_path(url).contains(API_SEGMENT)
}

/// True iff the URL contains any of the excluded substrings.
pub fn is_excluded(url: &str, patterns: &[String]) -> bool {
  patterns
    .iter()
    .any(|p| !p.is_empty() && url.contains(p.as_str()))
}
