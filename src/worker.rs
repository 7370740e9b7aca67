//! Lifecycle and event entry points of the offline shell.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::sync::Arc;
use tracing::info;

use crate::cache::{
  cleanup_orphans, precache, refresh_stale_entries, CacheStorage, FetchInterceptor, Policy,
  Served, SweepReport,
};
use crate::config::Config;
use crate::net::{Fetcher, Request};
use crate::notify::{
  handle_click, handle_push, ClickOutcome, ClientWindows, NotificationClick, NotificationDefaults,
  NotificationId, NotificationSurface,
};

/// Where a notification click opens the app when no window exists.
const APP_ROOT: &str = "/";

/// What an activation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationReport {
  /// Stores removed because they are not in the allow-list
  pub deleted_stores: Vec<String>,
  pub sweep: SweepReport,
}

/// The offline shell wired to its capabilities: a cache registry, a
/// fetcher and a host providing notifications and windows.
pub struct ServiceWorker<S, F, H> {
  storage: Arc<S>,
  fetcher: Arc<F>,
  host: H,
  interceptor: FetchInterceptor<S, F>,
  manifest: Vec<Request>,
  keep_stores: Vec<String>,
  max_age: chrono::Duration,
  notifications: NotificationDefaults,
}

impl<S, F, H> ServiceWorker<S, F, H>
where
  S: CacheStorage + 'static,
  F: Fetcher + 'static,
  H: NotificationSurface + ClientWindows,
{
  pub fn new(config: &Config, storage: Arc<S>, fetcher: Arc<F>, host: H) -> Result<Self> {
    config.validate()?;
    let interceptor = FetchInterceptor::new(
      Arc::clone(&storage),
      Arc::clone(&fetcher),
      config.interceptor_settings()?,
    );

    Ok(Self {
      storage,
      fetcher,
      host,
      interceptor,
      manifest: config.manifest()?,
      keep_stores: config.keep_stores(),
      max_age: config.max_age()?,
      notifications: config.notifications.clone(),
    })
  }

  /// Open the dynamic store and precache the manifest into the static
  /// store. Fails if any manifest entry cannot be fetched.
  pub async fn install(&self) -> Result<usize> {
    let settings = self.interceptor.settings();
    self.storage.open_store(&settings.dynamic_store)?;
    let count = precache(
      &*self.storage,
      &*self.fetcher,
      &settings.static_store,
      &self.manifest,
    )
    .await?;
    info!(count, "install complete");
    Ok(count)
  }

  /// Drop superseded stores, then refresh stale static entries.
  pub async fn activate(&self, now: DateTime<Utc>) -> Result<ActivationReport> {
    let deleted_stores = cleanup_orphans(&*self.storage, &self.keep_stores)?;
    let sweep = refresh_stale_entries(
      &*self.storage,
      &*self.fetcher,
      &self.interceptor.settings().static_store,
      self.max_age,
      now,
    )
    .await?;

    info!(
      deleted = deleted_stores.len(),
      refreshed = sweep.refreshed,
      failed = sweep.failed,
      "activation complete"
    );
    Ok(ActivationReport {
      deleted_stores,
      sweep,
    })
  }

  pub async fn fetch(&self, request: &Request, policy: Policy) -> Result<Served> {
    self.interceptor.dispatch(request, policy).await
  }

  pub async fn push(&self, raw: Option<&[u8]>) -> Result<Option<NotificationId>> {
    handle_push(&self.host, &self.notifications, raw).await
  }

  pub async fn notification_click(&self, click: &NotificationClick) -> Result<ClickOutcome> {
    handle_click(&self.host, &self.host, click, APP_ROOT).await
  }

  pub fn stores(&self) -> Result<Vec<String>> {
    self.storage.store_names()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, MemoryStorage};
  use crate::net::Response;
  use crate::notify::{NotificationDescriptor, WindowId};
  use crate::testing::{FakeWindows, RecordingSurface, StubFetcher};
  use async_trait::async_trait;

  #[derive(Default)]
  struct TestHost {
    surface: RecordingSurface,
    windows: FakeWindows,
  }

  #[async_trait]
  impl NotificationSurface for TestHost {
    async fn show(&self, descriptor: &NotificationDescriptor) -> Result<NotificationId> {
      self.surface.show(descriptor).await
    }

    async fn close(&self, id: NotificationId) -> Result<()> {
      self.surface.close(id).await
    }
  }

  #[async_trait]
  impl ClientWindows for TestHost {
    async fn windows(&self) -> Result<Vec<WindowId>> {
      self.windows.windows().await
    }

    async fn focus(&self, id: WindowId) -> Result<()> {
      self.windows.focus(id).await
    }

    async fn open(&self, url: &str) -> Result<WindowId> {
      self.windows.open(url).await
    }
  }

  const ASSETS: &[&str] = &["/", "/offline.html", "/js/app.js"];

  fn config() -> Config {
    let mut config = Config::default();
    config.origin = "https://app.test".to_string();
    config.cache.assets = ASSETS.iter().map(|s| s.to_string()).collect();
    config
  }

  fn online_fetcher() -> StubFetcher {
    let fetcher = StubFetcher::new();
    for asset in ASSETS {
      fetcher.set(&format!("https://app.test{}", asset), Response::new(200, *asset));
    }
    fetcher
  }

  fn worker(
    fetcher: StubFetcher,
  ) -> (
    ServiceWorker<MemoryStorage, StubFetcher, TestHost>,
    Arc<StubFetcher>,
  ) {
    let fetcher = Arc::new(fetcher);
    let sw = ServiceWorker::new(
      &config(),
      Arc::new(MemoryStorage::new()),
      Arc::clone(&fetcher),
      TestHost::default(),
    )
    .unwrap();
    (sw, fetcher)
  }

  #[tokio::test]
  async fn test_installed_assets_are_served_without_network() {
    let (sw, fetcher) = worker(online_fetcher());
    assert_eq!(sw.install().await.unwrap(), ASSETS.len());
    assert_eq!(sw.stores().unwrap(), vec!["dynamic-v1", "static-v1"]);

    for asset in ASSETS {
      let url = format!("https://app.test{}", asset);
      fetcher.go_offline(&url);
      let served = sw.fetch(&Request::get(&url), Policy::CacheFirst).await.unwrap();
      assert_eq!(served.outcome.source, CacheSource::Cache);
      assert_eq!(fetcher.calls_to(&url), 1);
    }
  }

  #[tokio::test]
  async fn test_install_fails_when_an_asset_is_unreachable() {
    let fetcher = online_fetcher();
    fetcher.go_offline("https://app.test/js/app.js");
    let (sw, _fetcher) = worker(fetcher);

    assert!(sw.install().await.is_err());
    assert!(sw.storage.keys("static-v1").unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_activation_removes_superseded_stores() {
    let (sw, _fetcher) = worker(online_fetcher());
    sw.install().await.unwrap();
    sw.storage.open_store("secucitoyen-v1").unwrap();
    sw.storage.open_store("static-v0").unwrap();

    let report = sw.activate(Utc::now()).await.unwrap();

    assert_eq!(report.deleted_stores, vec!["secucitoyen-v1", "static-v0"]);
    assert_eq!(report.sweep.checked, ASSETS.len());
    assert_eq!(report.sweep.refreshed, 0);
    assert_eq!(sw.stores().unwrap(), vec!["dynamic-v1", "static-v1"]);
  }

  #[tokio::test]
  async fn test_offline_navigation_after_install() {
    let (sw, fetcher) = worker(online_fetcher());
    sw.install().await.unwrap();

    let page = "https://app.test/alerts";
    fetcher.go_offline(page);
    let served = sw
      .fetch(&Request::navigate(page), Policy::Revalidate)
      .await
      .unwrap();

    assert_eq!(served.outcome.source, CacheSource::Offline);
    assert_eq!(served.outcome.response.text(), "/offline.html");
  }

  #[tokio::test]
  async fn test_push_then_view_click_opens_app() {
    let (sw, _fetcher) = worker(StubFetcher::new());
    let raw = r#"{"notification":{"title":"Alerte","body":"Incendie signalé"}}"#.as_bytes();

    let id = sw.push(Some(raw)).await.unwrap().unwrap();
    let outcome = sw
      .notification_click(&NotificationClick {
        id,
        action: Some("view".to_string()),
      })
      .await
      .unwrap();

    assert!(matches!(outcome, ClickOutcome::Opened(_)));
    assert_eq!(*sw.host.windows.opened_urls.lock().unwrap(), vec!["/"]);
    assert_eq!(*sw.host.surface.closed.lock().unwrap(), vec![id]);
  }
}
