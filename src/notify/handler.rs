//! Push receipt and notification click handlers.

use async_trait::async_trait;
use color_eyre::Result;
use tracing::{debug, info};

use super::descriptor::{ActionKind, NotificationDefaults, NotificationDescriptor, PushPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NotificationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(pub u64);

/// The platform surface notifications are rendered on.
#[async_trait]
pub trait NotificationSurface: Send + Sync {
  /// Display a notification. Completes once the platform has shown it.
  async fn show(&self, descriptor: &NotificationDescriptor) -> Result<NotificationId>;

  async fn close(&self, id: NotificationId) -> Result<()>;
}

/// Open application windows controlled by the shell.
#[async_trait]
pub trait ClientWindows: Send + Sync {
  async fn windows(&self) -> Result<Vec<WindowId>>;

  async fn focus(&self, id: WindowId) -> Result<()>;

  async fn open(&self, url: &str) -> Result<WindowId>;
}

/// A click on a displayed notification.
#[derive(Debug, Clone)]
pub struct NotificationClick {
  pub id: NotificationId,
  /// Action button identifier; `None` for a click on the body
  pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
  Dismissed,
  Focused(WindowId),
  Opened(WindowId),
}

/// Render an inbound push message.
///
/// Missing, empty or malformed payloads are ignored. The returned future
/// only completes once the surface has displayed the notification.
pub async fn handle_push<N>(
  surface: &N,
  defaults: &NotificationDefaults,
  raw: Option<&[u8]>,
) -> Result<Option<NotificationId>>
where
  N: NotificationSurface + ?Sized,
{
  let Some(raw) = raw.filter(|r| !r.is_empty()) else {
    debug!("push event without payload");
    return Ok(None);
  };

  let payload: PushPayload = match serde_json::from_slice(raw) {
    Ok(payload) => payload,
    Err(e) => {
      debug!(error = %e, "ignoring malformed push payload");
      return Ok(None);
    }
  };

  let descriptor = NotificationDescriptor::from_payload(payload, defaults);
  let id = surface.show(&descriptor).await?;
  info!(title = %descriptor.title, id = id.0, "notification displayed");
  Ok(Some(id))
}

/// Close the clicked notification and bring the app forward for `view` or
/// a body click: focus the first open window, or open one at `root`.
pub async fn handle_click<N, W>(
  surface: &N,
  windows: &W,
  click: &NotificationClick,
  root: &str,
) -> Result<ClickOutcome>
where
  N: NotificationSurface + ?Sized,
  W: ClientWindows + ?Sized,
{
  surface.close(click.id).await?;

  let wants_app = match click.action.as_deref() {
    None | Some("") => true,
    Some(action) => ActionKind::parse(action) == Some(ActionKind::View),
  };
  if !wants_app {
    return Ok(ClickOutcome::Dismissed);
  }

  match windows.windows().await?.first() {
    Some(&window) => {
      windows.focus(window).await?;
      Ok(ClickOutcome::Focused(window))
    }
    None => {
      let window = windows.open(root).await?;
      Ok(ClickOutcome::Opened(window))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{FakeWindows, RecordingSurface};

  fn click(action: Option<&str>) -> NotificationClick {
    NotificationClick {
      id: NotificationId(7),
      action: action.map(String::from),
    }
  }

  #[tokio::test]
  async fn test_push_displays_exactly_one_notification() {
    let surface = RecordingSurface::default();
    let raw: &[u8] = br#"{"notification":{"title":"T","body":"B"}}"#;

    let id = handle_push(&surface, &NotificationDefaults::default(), Some(raw))
      .await
      .unwrap();

    assert!(id.is_some());
    let shown = surface.shown.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "T");
    assert_eq!(shown[0].body, "B");
    assert_eq!(shown[0].icon, "/icons/icon-192x192.png");
  }

  #[tokio::test]
  async fn test_push_without_or_with_bad_payload_is_noop() {
    let surface = RecordingSurface::default();
    let defaults = NotificationDefaults::default();

    assert_eq!(handle_push(&surface, &defaults, None).await.unwrap(), None);
    assert_eq!(handle_push(&surface, &defaults, Some(&b""[..])).await.unwrap(), None);
    assert_eq!(handle_push(&surface, &defaults, Some(&b"not json"[..])).await.unwrap(), None);
    assert_eq!(
      handle_push(&surface, &defaults, Some(&br#"{"data":{}}"#[..])).await.unwrap(),
      None
    );
    assert!(surface.shown.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_view_opens_root_when_no_window() {
    let surface = RecordingSurface::default();
    let windows = FakeWindows::default();

    let outcome = handle_click(&surface, &windows, &click(Some("view")), "/")
      .await
      .unwrap();

    assert!(matches!(outcome, ClickOutcome::Opened(_)));
    assert_eq!(*windows.opened_urls.lock().unwrap(), vec!["/"]);
    assert!(windows.focused.lock().unwrap().is_empty());
    assert_eq!(*surface.closed.lock().unwrap(), vec![NotificationId(7)]);
  }

  #[tokio::test]
  async fn test_view_focuses_existing_window() {
    let surface = RecordingSurface::default();
    let windows = FakeWindows::with_window(3);

    let outcome = handle_click(&surface, &windows, &click(Some("view")), "/")
      .await
      .unwrap();

    assert_eq!(outcome, ClickOutcome::Focused(WindowId(3)));
    assert_eq!(*windows.focused.lock().unwrap(), vec![WindowId(3)]);
    assert!(windows.opened_urls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_body_click_behaves_like_view() {
    let surface = RecordingSurface::default();
    let windows = FakeWindows::default();

    let outcome = handle_click(&surface, &windows, &click(None), "/").await.unwrap();
    assert!(matches!(outcome, ClickOutcome::Opened(_)));
  }

  #[tokio::test]
  async fn test_close_only_dismisses() {
    let surface = RecordingSurface::default();
    let windows = FakeWindows::with_window(1);

    let outcome = handle_click(&surface, &windows, &click(Some("close")), "/")
      .await
      .unwrap();

    assert_eq!(outcome, ClickOutcome::Dismissed);
    assert_eq!(surface.closed.lock().unwrap().len(), 1);
    assert!(windows.focused.lock().unwrap().is_empty());
    assert!(windows.opened_urls.lock().unwrap().is_empty());
  }
}
