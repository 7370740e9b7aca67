use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const OBSOLETE_DATE_FORMATS: &[&str] = &["%A, %d-%b-%y %T GMT", "%a %b %e %T %Y"];

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
  /// Top-level page navigation
  Navigate,
  /// Script, stylesheet, image, XHR...
  #[default]
  Subresource,
}

/// A request descriptor as seen by the cache: method, absolute URL and mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
  pub method: Method,
  pub url: String,
  pub mode: RequestMode,
}

impl Request {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      mode: RequestMode::Subresource,
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::GET, url)
  }

  /// A GET issued by a top-level navigation.
  pub fn navigate(url: impl Into<String>) -> Self {
    Self {
      mode: RequestMode::Navigate,
      ..Self::get(url)
    }
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }

  /// Only read-only GET requests may be stored.
  pub fn is_cacheable(&self) -> bool {
    self.method == Method::GET
  }

  /// Stable, fixed-length storage key for this request.
  pub fn cache_key(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A response, either fresh from the network or replayed from a cache store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  /// Header pairs in arrival order; names are matched case-insensitively
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Synthetic reply handed back when the network is unreachable and nothing is cached.
  pub fn network_error() -> Self {
    Self::new(408, "Network error happened").with_header("content-type", "text/plain")
  }

  /// Successful status range (200-299).
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// Capture time taken from the `date` header, if present and parseable.
  /// Accepts IMF-fixdate plus the obsolete RFC 850 and asctime forms.
  pub fn date(&self) -> Option<DateTime<Utc>> {
    let raw = self.header("date")?;
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw.trim()) {
      return Some(dt.with_timezone(&Utc));
    }

    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    OBSOLETE_DATE_FORMATS
      .iter()
      .find_map(|fmt| NaiveDateTime::parse_from_str(&normalized, fmt).ok())
      .map(|naive| naive.and_utc())
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  #[test]
  fn test_only_get_is_cacheable() {
    assert!(Request::get("https://app.test/").is_cacheable());
    assert!(!Request::new(Method::POST, "https://app.test/api/report").is_cacheable());
  }

  #[test]
  fn test_cache_key_depends_on_method_and_url() {
    let get = Request::get("https://app.test/a.js");
    let nav = Request::navigate("https://app.test/a.js");
    let post = Request::new(Method::POST, "https://app.test/a.js");

    assert_eq!(get.cache_key(), nav.cache_key());
    assert_ne!(get.cache_key(), post.cache_key());
    assert_eq!(get.cache_key().len(), 64);
  }

  #[test]
  fn test_network_error_response() {
    let resp = Response::network_error();
    assert_eq!(resp.status, 408);
    assert!(!resp.is_ok());
    assert_eq!(resp.header("Content-Type"), Some("text/plain"));
    assert_eq!(resp.text(), "Network error happened");
  }

  #[test]
  fn test_date_header_parsing() {
    let resp = Response::new(200, "x").with_header("Date", "Sun, 06 Nov 1994 08:49:37 GMT");
    let expected = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
    assert_eq!(resp.date(), Some(expected));
  }

  #[test]
  fn test_obsolete_date_formats() {
    let expected = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
    let rfc850 = Response::new(200, "x").with_header("Date", "Sunday, 06-Nov-94 08:49:37 GMT");
    let asctime = Response::new(200, "x").with_header("Date", "Sun Nov  6 08:49:37 1994");
    assert_eq!(rfc850.date(), Some(expected));
    assert_eq!(asctime.date(), Some(expected));
  }

  #[test]
  fn test_unusable_date_header() {
    assert_eq!(Response::new(200, "x").date(), None);
    let resp = Response::new(200, "x").with_header("date", "yesterday");
    assert_eq!(resp.date(), None);
  }

  #[test]
  fn test_ok_range() {
    assert!(Response::new(200, "").is_ok());
    assert!(Response::new(204, "").is_ok());
    assert!(!Response::new(304, "").is_ok());
    assert!(!Response::new(500, "").is_ok());
  }
}
