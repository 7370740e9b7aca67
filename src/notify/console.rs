//! Terminal stand-in for the platform notification surface and window list.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::info;

use super::descriptor::NotificationDescriptor;
use super::handler::{ClientWindows, NotificationId, NotificationSurface, WindowId};

/// Prints notifications to stdout and keeps an in-process window list.
#[derive(Default)]
pub struct ConsoleHost {
  next_id: AtomicU64,
  windows: Mutex<Vec<WindowId>>,
}

impl ConsoleHost {
  pub fn new() -> Self {
    Self::default()
  }

  /// Pretend an application window is already open.
  pub fn with_open_window(self) -> Self {
    let id = WindowId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
    if let Ok(mut windows) = self.windows.lock() {
      windows.push(id);
    }
    self
  }
}

#[async_trait]
impl NotificationSurface for ConsoleHost {
  async fn show(&self, descriptor: &NotificationDescriptor) -> Result<NotificationId> {
    let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
    let rendered = serde_json::to_string_pretty(descriptor)
      .map_err(|e| eyre!("Failed to render notification: {}", e))?;
    println!("notification #{}\n{}", id.0, rendered);
    Ok(id)
  }

  async fn close(&self, id: NotificationId) -> Result<()> {
    info!(id = id.0, "notification closed");
    Ok(())
  }
}

#[async_trait]
impl ClientWindows for ConsoleHost {
  async fn windows(&self) -> Result<Vec<WindowId>> {
    let windows = self
      .windows
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(windows.clone())
  }

  async fn focus(&self, id: WindowId) -> Result<()> {
    println!("focus window #{}", id.0);
    Ok(())
  }

  async fn open(&self, url: &str) -> Result<WindowId> {
    let id = WindowId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
    self
      .windows
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?
      .push(id);
    println!("open window #{} at {}", id.0, url);
    Ok(id)
  }
}
