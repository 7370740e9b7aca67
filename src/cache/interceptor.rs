//! Top-level request router.

use color_eyre::Result;
use serde::Deserialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::classify::{is_excluded, RequestKind};
use super::storage::CacheStorage;
use super::strategy::{cache_first, network_first};
use super::traits::StrategyOutcome;
use crate::net::{Fetcher, Request};

/// How `dispatch` picks a strategy for requests the interceptor owns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
  /// Serve any cached copy, refresh it in the background
  #[default]
  Revalidate,
  /// Any cached copy first, then network into the dynamic store
  CacheFirst,
  /// Network first, then any cached copy
  NetworkFirst,
  /// Assets cache-first, API calls network-first, the rest revalidate
  Auto,
}

/// Store names and URLs the interceptor works with.
#[derive(Debug, Clone)]
pub struct InterceptorSettings {
  pub static_store: String,
  pub dynamic_store: String,
  /// Pre-cached page served when a navigation fails offline
  pub offline_page: Request,
  /// Substrings of URLs that bypass every cache
  pub excluded: Vec<String>,
}

/// A response produced by the interceptor.
#[derive(Debug)]
pub struct Served {
  pub outcome: StrategyOutcome,
  /// Detached refresh of the dynamic store, set on cache hits.
  /// Dropping the handle does not cancel the task.
  pub revalidation: Option<JoinHandle<()>>,
}

#[derive(Debug)]
pub enum Intercepted {
  /// Not ours: the host performs its default network fetch
  Passthrough,
  Served(Served),
}

/// Routes every request through the cache registry and the network.
pub struct FetchInterceptor<S, F> {
  storage: Arc<S>,
  fetcher: Arc<F>,
  settings: InterceptorSettings,
}

impl<S, F> Clone for FetchInterceptor<S, F> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      fetcher: Arc::clone(&self.fetcher),
      settings: self.settings.clone(),
    }
  }
}

impl<S, F> FetchInterceptor<S, F>
where
  S: CacheStorage + 'static,
  F: Fetcher + 'static,
{
  pub fn new(storage: Arc<S>, fetcher: Arc<F>, settings: InterceptorSettings) -> Self {
    Self {
      storage,
      fetcher,
      settings,
    }
  }

  pub fn settings(&self) -> &InterceptorSettings {
    &self.settings
  }

  /// Whether the interceptor leaves this request to the host untouched.
  pub fn bypasses(&self, request: &Request) -> bool {
    !request.is_cacheable() || is_excluded(&request.url, &self.settings.excluded)
  }

  /// Stale-while-revalidate routing.
  ///
  /// 1. Non-GET and excluded URLs pass through.
  /// 2. A cached copy anywhere is served at once while a detached task
  ///    refreshes the dynamic store.
  /// 3. On a miss the network answers; ok responses are stored.
  /// 4. A failed navigation gets the offline page; any other failure (or a
  ///    missing offline page) is returned as the error.
  pub async fn handle(&self, request: &Request) -> Result<Intercepted> {
    if self.bypasses(request) {
      debug!(method = %request.method, url = %request.url, "passing request through");
      return Ok(Intercepted::Passthrough);
    }

    if let Some(cached) = self.storage.match_any(request)? {
      debug!(
        url = %request.url,
        store = %cached.store,
        cached_at = %cached.cached_at,
        "serving cached copy"
      );
      let revalidation = self.spawn_revalidation(request.clone());
      return Ok(Intercepted::Served(Served {
        outcome: StrategyOutcome::from_cache(cached.response),
        revalidation: Some(revalidation),
      }));
    }

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if response.is_ok() {
          self
            .storage
            .put(&self.settings.dynamic_store, request, &response)?;
        }
        Ok(Intercepted::Served(Served {
          outcome: StrategyOutcome::from_network(response),
          revalidation: None,
        }))
      }
      Err(e) if request.is_navigation() => {
        match self.storage.match_any(&self.settings.offline_page)? {
          Some(offline) => {
            info!(url = %request.url, error = %e, "navigation failed, serving offline page");
            Ok(Intercepted::Served(Served {
              outcome: StrategyOutcome::offline(offline.response),
              revalidation: None,
            }))
          }
          None => Err(e.wrap_err(format!(
            "Offline page {} is not cached",
            self.settings.offline_page.url
          ))),
        }
      }
      Err(e) => Err(e),
    }
  }

  /// Answer a request end to end under `policy`, performing the host's
  /// default fetch for requests the interceptor does not own.
  pub async fn dispatch(&self, request: &Request, policy: Policy) -> Result<Served> {
    if self.bypasses(request) {
      let response = self.fetcher.fetch(request).await?;
      return Ok(Served {
        outcome: StrategyOutcome::from_network(response),
        revalidation: None,
      });
    }

    let policy = match policy {
      Policy::Auto => match RequestKind::of(&request.url) {
        RequestKind::Asset => Policy::CacheFirst,
        RequestKind::Api => Policy::NetworkFirst,
        RequestKind::Other => Policy::Revalidate,
      },
      other => other,
    };

    let outcome = match policy {
      Policy::CacheFirst => {
        cache_first(
          &*self.storage,
          &*self.fetcher,
          &self.settings.dynamic_store,
          request,
        )
        .await?
      }
      Policy::NetworkFirst => {
        network_first(
          &*self.storage,
          &*self.fetcher,
          &self.settings.dynamic_store,
          request,
        )
        .await?
      }
      Policy::Revalidate | Policy::Auto => {
        return match self.handle(request).await? {
          Intercepted::Served(served) => Ok(served),
          Intercepted::Passthrough => {
            let response = self.fetcher.fetch(request).await?;
            Ok(Served {
              outcome: StrategyOutcome::from_network(response),
              revalidation: None,
            })
          }
        };
      }
    };

    Ok(Served {
      outcome,
      revalidation: None,
    })
  }

  fn spawn_revalidation(&self, request: Request) -> JoinHandle<()> {
    let storage = Arc::clone(&self.storage);
    let fetcher = Arc::clone(&self.fetcher);
    let store = self.settings.dynamic_store.clone();

    tokio::spawn(async move {
      if let Err(e) = revalidate(&*storage, &*fetcher, &store, &request).await {
        debug!(url = %request.url, error = %e, "background revalidation failed");
      }
    })
  }
}

async fn revalidate<S, F>(storage: &S, fetcher: &F, store: &str, request: &Request) -> Result<()>
where
  S: CacheStorage + ?Sized,
  F: Fetcher + ?Sized,
{
  let response = fetcher.fetch(request).await?;
  if response.is_ok() {
    storage.put(store, request, &response)?;
  }
  Ok(())
}
