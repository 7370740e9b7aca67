use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cache::{InterceptorSettings, Policy};
use crate::net::Request;
use crate::notify::NotificationDefaults;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Origin the app is served from; relative URLs resolve against it
  pub origin: String,
  pub cache: CacheConfig,
  pub network: NetworkConfig,
  pub notifications: NotificationDefaults,
  pub logging: LoggingConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: "http://localhost:3000".to_string(),
      cache: CacheConfig::default(),
      network: NetworkConfig::default(),
      notifications: NotificationDefaults::default(),
      logging: LoggingConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Store populated at install time; bump the suffix to invalidate
  pub static_store: String,
  /// Store populated opportunistically at request time
  pub dynamic_store: String,
  pub offline_page: String,
  /// Install-time manifest. Must contain the offline page.
  pub assets: Vec<String>,
  /// URL substrings that bypass every cache
  pub excluded: Vec<String>,
  /// Age after which static entries are re-fetched on activation
  pub max_age_days: i64,
  pub policy: Policy,
  /// SQLite file (default: $XDG_DATA_HOME/secucitoyen/cache.db)
  pub database: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      static_store: "static-v1".to_string(),
      dynamic_store: "dynamic-v1".to_string(),
      offline_page: "/offline.html".to_string(),
      assets: DEFAULT_ASSETS.iter().map(|s| s.to_string()).collect(),
      excluded: vec![
        "firebase".to_string(),
        "google-analytics".to_string(),
        "googleapis".to_string(),
      ],
      max_age_days: 7,
      policy: Policy::default(),
      database: None,
    }
  }
}

const MAX_AGE_LIMIT_DAYS: i64 = 3650;

const DEFAULT_ASSETS: &[&str] = &[
  "/",
  "/index.html",
  "/offline.html",
  "/css/style.css",
  "/js/app.js",
  "/js/firebase-config.js",
  "/js/services/auth-service.js",
  "/js/services/storage-service.js",
  "/js/services/notification-service.js",
  "/js/components/auth-ui.js",
  "/js/components/storage-ui.js",
  "/js/components/notification-ui.js",
  "/js/components/ui-controller.js",
  "/manifest.json",
  "/icons/icon-72x72.png",
  "/icons/icon-96x96.png",
  "/icons/icon-128x128.png",
  "/icons/icon-144x144.png",
  "/icons/icon-152x152.png",
  "/icons/icon-192x192.png",
  "/icons/icon-384x384.png",
  "/icons/icon-512x512.png",
  "/icons/google.svg",
  "/icons/default-avatar.png",
  "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&display=swap",
  "https://fonts.googleapis.com/icon?family=Material+Icons+Round",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
  pub user_agent: String,
  /// Per-request timeout; unset means wait forever
  pub timeout_secs: Option<u64>,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      user_agent: concat!("secucitoyen-sw/", env!("CARGO_PKG_VERSION")).to_string(),
      timeout_secs: Some(30),
    }
  }
}

impl NetworkConfig {
  pub fn timeout(&self) -> Option<Duration> {
    self.timeout_secs.map(Duration::from_secs)
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Directory for daily-rolling log files; stderr when unset
  pub directory: Option<PathBuf>,
  /// Filter used when SECUCITOYEN_LOG is not set
  pub filter: Option<String>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./secucitoyen.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/secucitoyen/config.yaml
  ///
  /// Without a file the built-in defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };
    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("secucitoyen.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("secucitoyen").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// The offline page must be part of the install manifest, and store names
  /// must be distinct.
  pub fn validate(&self) -> Result<()> {
    let offline = self.resolve(&self.cache.offline_page)?;
    let manifest = self.manifest()?;
    if !manifest.iter().any(|r| r.url == offline) {
      return Err(eyre!(
        "Offline page {} is missing from the asset manifest",
        self.cache.offline_page
      ));
    }

    if self.cache.static_store == self.cache.dynamic_store {
      return Err(eyre!(
        "Static and dynamic stores must differ (both are '{}')",
        self.cache.static_store
      ));
    }

    self.max_age()?;
    Ok(())
  }

  /// Resolve a possibly relative URL against the origin.
  pub fn resolve(&self, url: &str) -> Result<String> {
    let origin = Url::parse(&self.origin)
      .map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))?;
    let resolved = origin
      .join(url)
      .map_err(|e| eyre!("Invalid URL '{}': {}", url, e))?;
    Ok(resolved.to_string())
  }

  /// Install-time manifest as absolute GET requests, in order.
  pub fn manifest(&self) -> Result<Vec<Request>> {
    self
      .cache
      .assets
      .iter()
      .map(|asset| self.resolve(asset).map(Request::get))
      .collect()
  }

  /// Store names that survive activation cleanup.
  pub fn keep_stores(&self) -> Vec<String> {
    vec![
      self.cache.static_store.clone(),
      self.cache.dynamic_store.clone(),
    ]
  }

  /// Age after which a static entry is re-fetched. Must be 1 to 3650 days.
  pub fn max_age(&self) -> Result<chrono::Duration> {
    let days = self.cache.max_age_days;
    if !(1..=MAX_AGE_LIMIT_DAYS).contains(&days) {
      return Err(eyre!(
        "cache.max_age_days must be between 1 and {} (got {})",
        MAX_AGE_LIMIT_DAYS,
        days
      ));
    }
    chrono::Duration::try_days(days).ok_or_else(|| eyre!("Invalid max age: {} days", days))
  }

  pub fn interceptor_settings(&self) -> Result<InterceptorSettings> {
    Ok(InterceptorSettings {
      static_store: self.cache.static_store.clone(),
      dynamic_store: self.cache.dynamic_store.clone(),
      offline_page: Request::get(self.resolve(&self.cache.offline_page)?),
      excluded: self.cache.excluded.clone(),
    })
  }
}
