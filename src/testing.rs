//! In-memory fakes for the network and notification capabilities.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::net::{Fetcher, Request, Response};
use crate::notify::{ClientWindows, NotificationDescriptor, NotificationId, NotificationSurface, WindowId};

/// Fetcher answering from a fixed table. Unknown URLs fail like an offline network.
#[derive(Default)]
pub struct StubFetcher {
  routes: Mutex<HashMap<String, Response>>,
  calls: Mutex<Vec<Request>>,
}

impl StubFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with(self, url: &str, response: Response) -> Self {
    self.set(url, response);
    self
  }

  pub fn set(&self, url: &str, response: Response) {
    self
      .routes
      .lock()
      .unwrap()
      .insert(url.to_string(), response);
  }

  /// Make subsequent fetches of `url` fail.
  pub fn go_offline(&self, url: &str) {
    self.routes.lock().unwrap().remove(url);
  }

  pub fn calls_to(&self, url: &str) -> usize {
    self
      .calls
      .lock()
      .unwrap()
      .iter()
      .filter(|r| r.url == url)
      .count()
  }

  pub fn total_calls(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

#[async_trait]
impl Fetcher for StubFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    self.calls.lock().unwrap().push(request.clone());
    self
      .routes
      .lock()
      .unwrap()
      .get(&request.url)
      .cloned()
      .ok_or_else(|| eyre!("network unreachable: {}", request.url))
  }
}

/// Notification surface that remembers what was shown and closed.
#[derive(Default)]
pub struct RecordingSurface {
  pub shown: Mutex<Vec<NotificationDescriptor>>,
  pub closed: Mutex<Vec<NotificationId>>,
}

#[async_trait]
impl NotificationSurface for RecordingSurface {
  async fn show(&self, descriptor: &NotificationDescriptor) -> Result<NotificationId> {
    let mut shown = self.shown.lock().unwrap();
    shown.push(descriptor.clone());
    Ok(NotificationId(shown.len() as u64))
  }

  async fn close(&self, id: NotificationId) -> Result<()> {
    self.closed.lock().unwrap().push(id);
    Ok(())
  }
}

/// Window registry tracking focus and open calls.
#[derive(Default)]
pub struct FakeWindows {
  pub open_windows: Mutex<Vec<WindowId>>,
  pub focused: Mutex<Vec<WindowId>>,
  pub opened_urls: Mutex<Vec<String>>,
}

impl FakeWindows {
  pub fn with_window(id: u64) -> Self {
    let windows = Self::default();
    windows.open_windows.lock().unwrap().push(WindowId(id));
    windows
  }
}

#[async_trait]
impl ClientWindows for FakeWindows {
  async fn windows(&self) -> Result<Vec<WindowId>> {
    Ok(self.open_windows.lock().unwrap().clone())
  }

  async fn focus(&self, id: WindowId) -> Result<()> {
    self.focused.lock().unwrap().push(id);
    Ok(())
  }

  async fn open(&self, url: &str) -> Result<WindowId> {
    self.opened_urls.lock().unwrap().push(url.to_string());
    let mut open = self.open_windows.lock().unwrap();
    let id = WindowId(open.len() as u64 + 1);
    open.push(id);
    Ok(id)
  }
}
