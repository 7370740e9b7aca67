use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of the built-in notification actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
  View,
  Close,
}

impl ActionKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ActionKind::View => "view",
      ActionKind::Close => "close",
    }
  }

  pub fn parse(action: &str) -> Option<Self> {
    match action {
      "view" => Some(ActionKind::View),
      "close" => Some(ActionKind::Close),
      _ => None,
    }
  }
}

/// A button rendered on the notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
  pub icon: String,
}

/// Presentation defaults applied to every notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotificationDefaults {
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub view_title: String,
  pub close_title: String,
}

impl Default for NotificationDefaults {
  fn default() -> Self {
    Self {
      icon: "/icons/icon-192x192.png".to_string(),
      badge: "/icons/icon-96x96.png".to_string(),
      vibrate: vec![100, 50, 100],
      view_title: "Voir".to_string(),
      close_title: "Fermer".to_string(),
    }
  }
}

/// Inbound push message: `{ notification: { title, body, icon? }, data? }`.
#[derive(Debug, Clone, Deserialize)]
pub struct PushPayload {
  pub notification: PushNotification,
  #[serde(default)]
  pub data: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushNotification {
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub body: String,
  #[serde(default)]
  pub icon: Option<String>,
}

/// Everything the platform needs to render one notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationDescriptor {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub data: Value,
  pub actions: Vec<NotificationAction>,
}

impl NotificationDescriptor {
  pub fn from_payload(payload: PushPayload, defaults: &NotificationDefaults) -> Self {
    let icon = payload
      .notification
      .icon
      .filter(|i| !i.is_empty())
      .unwrap_or_else(|| defaults.icon.clone());

    let data = match payload.data {
      Some(Value::Null) | None => Value::Object(Default::default()),
      Some(data) => data,
    };

    Self {
      title: payload.notification.title,
      body: payload.notification.body,
      icon,
      badge: defaults.badge.clone(),
      vibrate: defaults.vibrate.clone(),
      data,
      actions: vec![
        NotificationAction {
          action: ActionKind::View.as_str().to_string(),
          title: defaults.view_title.clone(),
          icon: defaults.badge.clone(),
        },
        NotificationAction {
          action: ActionKind::Close.as_str().to_string(),
          title: defaults.close_title.clone(),
          icon: defaults.badge.clone(),
        },
      ],
    }
  }
}
