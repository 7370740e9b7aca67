//! Cache-first and network-first fetch strategies.
//!
//! Both take the registry and the fetcher as parameters so they can run
//! against any backend. Network failures never escape: the caller always
//! gets a response, at worst the synthetic 408. Only registry failures are
//! returned as errors.

use color_eyre::Result;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::StrategyOutcome;
use crate::net::{Fetcher, Request};

/// Serve any cached copy when present, otherwise fetch and remember ok
/// responses in `store`. Pass a request-time store here: the install-time
/// static store is only written by `precache`.
pub async fn cache_first<S, F>(
  storage: &S,
  fetcher: &F,
  store: &str,
  request: &Request,
) -> Result<StrategyOutcome>
where
  S: CacheStorage + ?Sized,
  F: Fetcher + ?Sized,
{
  if request.is_cacheable() {
    if let Some(cached) = storage.match_any(request)? {
      debug!(url = %request.url, store = %cached.store, "cache-first hit");
      return Ok(StrategyOutcome::from_cache(cached.response));
    }
  }

  match fetcher.fetch(request).await {
    Ok(response) => {
      if response.is_ok() && request.is_cacheable() {
        storage.put(store, request, &response)?;
      }
      Ok(StrategyOutcome::from_network(response))
    }
    Err(e) => {
      warn!(url = %request.url, error = %e, "cache-first fetch failed");
      Ok(StrategyOutcome::network_error())
    }
  }
}

/// Prefer the network, remembering ok responses in `store`; fall back to
/// anything cached for the request when the fetch fails.
pub async fn network_first<S, F>(
  storage: &S,
  fetcher: &F,
  store: &str,
  request: &Request,
) -> Result<StrategyOutcome>
where
  S: CacheStorage + ?Sized,
  F: Fetcher + ?Sized,
{
  match fetcher.fetch(request).await {
    Ok(response) => {
      if response.is_ok() && request.is_cacheable() {
        storage.put(store, request, &response)?;
      }
      Ok(StrategyOutcome::from_network(response))
    }
    Err(e) => {
      warn!(url = %request.url, error = %e, "network-first fetch failed, trying cache");
      if request.is_cacheable() {
        if let Some(cached) = storage.match_any(request)? {
          return Ok(StrategyOutcome::from_cache(cached.response));
        }
      }
      Ok(StrategyOutcome::network_error())
    }
  }
}
