//! Install-time precache, staleness sweep and orphaned store cleanup.

use chrono::{DateTime, Duration, Utc};
use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use tracing::{debug, info, warn};

use super::storage::CacheStorage;
use crate::net::{Fetcher, Request};

/// Counters from one staleness sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  /// Entries inspected
  pub checked: usize,
  /// Entries without a usable `date` header
  pub skipped: usize,
  /// Stale entries overwritten with a fresh copy
  pub refreshed: usize,
  /// Stale entries whose re-fetch failed or came back non-ok
  pub failed: usize,
}

/// Fetch every manifest entry and write them all to `store`.
///
/// All-or-nothing: one failed fetch or non-ok status fails the step and
/// nothing is written.
pub async fn precache<S, F>(
  storage: &S,
  fetcher: &F,
  store: &str,
  manifest: &[Request],
) -> Result<usize>
where
  S: CacheStorage + ?Sized,
  F: Fetcher + ?Sized,
{
  let responses = try_join_all(manifest.iter().map(|request| async move {
    let response = fetcher.fetch(request).await?;
    if !response.is_ok() {
      return Err(eyre!(
        "Precache of {} failed with status {}",
        request.url,
        response.status
      ));
    }
    Ok::<_, color_eyre::Report>(response)
  }))
  .await?;

  storage.open_store(store)?;
  for (request, response) in manifest.iter().zip(&responses) {
    storage.put(store, request, response)?;
  }

  info!(store, count = responses.len(), "precached static assets");
  Ok(responses.len())
}

/// Re-fetch entries of `store` whose `date` header is older than `max_age`.
///
/// Best effort: fetch failures are logged and counted, never returned.
pub async fn refresh_stale_entries<S, F>(
  storage: &S,
  fetcher: &F,
  store: &str,
  max_age: Duration,
  now: DateTime<Utc>,
) -> Result<SweepReport>
where
  S: CacheStorage + ?Sized,
  F: Fetcher + ?Sized,
{
  let mut report = SweepReport::default();

  for request in storage.keys(store)? {
    let Some(entry) = storage.get(store, &request)? else {
      continue;
    };
    report.checked += 1;

    let Some(captured) = entry.response.date() else {
      report.skipped += 1;
      continue;
    };

    if now - captured <= max_age {
      continue;
    }

    debug!(url = %request.url, %captured, "refreshing stale entry");
    match fetcher.fetch(&request).await {
      Ok(fresh) if fresh.is_ok() => {
        storage.put(store, &request, &fresh)?;
        report.refreshed += 1;
      }
      Ok(fresh) => {
        warn!(url = %request.url, status = fresh.status, "stale entry refresh returned non-ok status");
        report.failed += 1;
      }
      Err(e) => {
        warn!(url = %request.url, error = %e, "stale entry refresh failed");
        report.failed += 1;
      }
    }
  }

  Ok(report)
}

/// Delete every store whose name is not in `keep`. Returns the deleted names.
pub fn cleanup_orphans<S>(storage: &S, keep: &[String]) -> Result<Vec<String>>
where
  S: CacheStorage + ?Sized,
{
  let mut deleted = Vec::new();
  for name in storage.store_names()? {
    if keep.contains(&name) {
      continue;
    }
    if storage.delete_store(&name)? {
      info!(store = %name, "deleted orphaned cache store");
      deleted.push(name);
    }
  }
  Ok(deleted)
}
