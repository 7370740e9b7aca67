//! Outcome types shared by the strategies and the interceptor.

use crate::net::Response;

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Replayed from a cache store
  Cache,
  /// Network unavailable, serving the offline fallback page
  Offline,
  /// Network unavailable and nothing cached: synthetic 408
  Synthetic,
}

/// A response together with metadata about its origin.
#[derive(Debug, Clone)]
pub struct StrategyOutcome {
  pub response: Response,
  pub source: CacheSource,
}

impl StrategyOutcome {
  pub fn from_network(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Network,
    }
  }

  pub fn from_cache(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Cache,
    }
  }

  pub fn offline(response: Response) -> Self {
    Self {
      response,
      source: CacheSource::Offline,
    }
  }

  pub fn network_error() -> Self {
    Self {
      response: Response::network_error(),
      source: CacheSource::Synthetic,
    }
  }
}
