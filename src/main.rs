mod cache;
mod config;
mod logging;
mod net;
mod notify;
#[cfg(test)]
mod testing;
mod worker;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::{CacheSource, CacheStorage, MemoryStorage, Policy, SqliteStorage};
use crate::net::{HttpFetcher, Request};
use crate::notify::permission::{resolve_token, PermissionState, PermissionStatus};
use crate::notify::{ConsoleHost, NotificationClick, NotificationId};
use crate::worker::ServiceWorker;

#[derive(Parser, Debug)]
#[command(name = "secucitoyen-sw")]
#[command(about = "Offline shell for the SecuCitoyen PWA")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/secucitoyen/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Origin the app is served from
  #[arg(long)]
  origin: Option<String>,

  /// Cache database file
  #[arg(long)]
  database: Option<PathBuf>,

  /// Keep the cache in process memory for this run only
  #[arg(long, conflicts_with = "database")]
  ephemeral: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Precache the static asset manifest
  Install,
  /// Remove superseded stores and refresh stale static entries
  Activate,
  /// Send a request through the interceptor
  Fetch {
    url: String,
    #[arg(long, default_value = "GET")]
    method: String,
    /// Treat the request as a top-level navigation
    #[arg(long)]
    navigate: bool,
    #[arg(long, value_enum)]
    policy: Option<Policy>,
  },
  /// Deliver a push payload (JSON) and display the notification
  Push { payload: Option<String> },
  /// Click a displayed notification
  Click {
    #[arg(long, default_value_t = 1)]
    id: u64,
    /// `view`, `close`, or omit for a click on the body
    #[arg(long)]
    action: Option<String>,
    /// Pretend an app window is already open
    #[arg(long)]
    window_open: bool,
  },
  /// List cache stores
  Stores,
  /// Show the status for a notification permission state
  Permission {
    state: PermissionState,
    /// Messaging token to validate against the permission
    #[arg(long)]
    token: Option<String>,
    /// Error code returned by the messaging backend (e.g. messaging/permission-blocked)
    #[arg(long)]
    error_code: Option<String>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = config::Config::load(args.config.as_deref())?;
  if let Some(origin) = args.origin {
    config.origin = origin;
  }
  if let Some(database) = args.database {
    config.cache.database = Some(database);
  }

  let _log_guard = logging::init(&config.logging)?;

  if let Command::Permission {
    state,
    token,
    error_code,
  } = &args.command
  {
    show_permission(*state, token.as_deref(), error_code.as_deref());
    return Ok(());
  }

  let fetcher = Arc::new(HttpFetcher::new(
    &config.network.user_agent,
    config.network.timeout(),
  )?);
  let host = match &args.command {
    Command::Click {
      window_open: true, ..
    } => ConsoleHost::new().with_open_window(),
    _ => ConsoleHost::new(),
  };

  if args.ephemeral {
    let storage = Arc::new(MemoryStorage::new());
    let sw = ServiceWorker::new(&config, storage, fetcher, host)?;
    run(&sw, &config, args.command).await
  } else {
    let storage = Arc::new(SqliteStorage::open(config.cache.database.as_deref())?);
    let sw = ServiceWorker::new(&config, storage, fetcher, host)?;
    run(&sw, &config, args.command).await
  }
}

async fn run<S>(
  sw: &ServiceWorker<S, HttpFetcher, ConsoleHost>,
  config: &config::Config,
  command: Command,
) -> Result<()>
where
  S: CacheStorage + 'static,
{
  match command {
    Command::Install => {
      let count = sw.install().await?;
      println!("precached {} assets", count);
    }
    Command::Activate => {
      let report = sw.activate(Utc::now()).await?;
      for store in &report.deleted_stores {
        println!("deleted store {}", store);
      }
      println!(
        "checked {} entries: {} refreshed, {} failed, {} without date",
        report.sweep.checked, report.sweep.refreshed, report.sweep.failed, report.sweep.skipped
      );
    }
    Command::Fetch {
      url,
      method,
      navigate,
      policy,
    } => {
      let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|e| eyre!("Invalid method '{}': {}", method, e))?;
      let url = config.resolve(&url)?;
      let mut request = if navigate {
        Request::navigate(url)
      } else {
        Request::get(url)
      };
      request.method = method;

      let served = sw
        .fetch(&request, policy.unwrap_or(config.cache.policy))
        .await?;
      let response = &served.outcome.response;
      let source = match served.outcome.source {
        CacheSource::Network => "network",
        CacheSource::Cache => "cache",
        CacheSource::Offline => "offline page",
        CacheSource::Synthetic => "network error",
      };
      println!("{} ({})", response.status, source);
      for (name, value) in &response.headers {
        println!("{}: {}", name, value);
      }
      println!();
      println!("{}", response.text());

      // Let the background refresh land before the runtime shuts down
      if let Some(revalidation) = served.revalidation {
        let _ = revalidation.await;
      }
    }
    Command::Push { payload } => match sw.push(payload.as_deref().map(str::as_bytes)).await? {
      Some(id) => println!("displayed notification #{}", id.0),
      None => println!("no notification (empty or malformed payload)"),
    },
    Command::Click { id, action, .. } => {
      let outcome = sw
        .notification_click(&NotificationClick {
          id: NotificationId(id),
          action,
        })
        .await?;
      println!("{:?}", outcome);
    }
    Command::Stores => {
      for store in sw.stores()? {
        println!("{}", store);
      }
    }
    Command::Permission {
      state,
      token,
      error_code,
    } => show_permission(state, token.as_deref(), error_code.as_deref()),
  }

  Ok(())
}

fn show_permission(state: PermissionState, token: Option<&str>, error_code: Option<&str>) {
  let status = PermissionStatus::from(state);
  println!("{}: {}", state, status.message);
  println!(
    "enable control: {}",
    if status.can_enable { "enabled" } else { "disabled" }
  );

  if token.is_none() && error_code.is_none() {
    return;
  }
  match resolve_token(state, token, error_code) {
    Ok(token) => println!("token accepted: {}", token),
    Err(e) => println!("token refused: {}", e),
  }
}
