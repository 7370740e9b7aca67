//! Notification permission state and messaging token gating.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Permission owned by the platform. Only its request flow writes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PermissionState {
  Granted,
  Denied,
  /// Not decided yet
  #[default]
  Default,
}

impl FromStr for PermissionState {
  type Err = NotificationError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_lowercase().as_str() {
      "granted" => Ok(PermissionState::Granted),
      "denied" => Ok(PermissionState::Denied),
      "default" | "prompt" => Ok(PermissionState::Default),
      other => Err(NotificationError::Other(format!(
        "unknown permission state '{}'",
        other
      ))),
    }
  }
}

impl fmt::Display for PermissionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      PermissionState::Granted => "granted",
      PermissionState::Denied => "denied",
      PermissionState::Default => "default",
    };
    f.write_str(s)
  }
}

/// What the settings screen shows for a permission state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionStatus {
  pub message: &'static str,
  /// Whether the "enable notifications" control is usable
  pub can_enable: bool,
}

impl From<PermissionState> for PermissionStatus {
  fn from(state: PermissionState) -> Self {
    match state {
      PermissionState::Granted => Self {
        message: "Notifications activées",
        can_enable: false,
      },
      PermissionState::Denied => Self {
        message: "Notifications bloquées par le navigateur",
        can_enable: false,
      },
      PermissionState::Default => Self {
        message: "Notifications désactivées",
        can_enable: true,
      },
    }
  }
}

/// Failures of the notification permission / token lifecycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
  #[error("Permission de notification non accordée")]
  PermissionNotGranted,

  #[error("Les notifications sont bloquées par le navigateur")]
  PermissionBlocked,

  #[error("Les notifications sont bloquées par l'utilisateur")]
  NotificationsBlocked,

  #[error("Token d'enregistrement invalide")]
  InvalidToken,

  #[error("Token d'enregistrement non enregistré")]
  TokenNotRegistered,

  #[error("Impossible d'obtenir le token")]
  TokenUnavailable,

  #[error("Une erreur est survenue avec les notifications: {0}")]
  Other(String),
}

impl NotificationError {
  /// Map a messaging backend error code to a user-facing error.
  pub fn from_code(code: &str) -> Self {
    match code {
      "messaging/permission-blocked" => NotificationError::PermissionBlocked,
      "messaging/notifications-blocked" => NotificationError::NotificationsBlocked,
      "messaging/invalid-registration-token" => NotificationError::InvalidToken,
      "messaging/registration-token-not-registered" => NotificationError::TokenNotRegistered,
      other => NotificationError::Other(other.to_string()),
    }
  }
}

/// Messaging tokens may only be requested once permission is granted.
pub fn ensure_granted(state: PermissionState) -> Result<(), NotificationError> {
  match state {
    PermissionState::Granted => Ok(()),
    _ => Err(NotificationError::PermissionNotGranted),
  }
}

/// Reject the empty token some backends hand out instead of an error.
pub fn validate_token(token: &str) -> Result<&str, NotificationError> {
  let token = token.trim();
  if token.is_empty() {
    Err(NotificationError::TokenUnavailable)
  } else {
    Ok(token)
  }
}

/// Result of a token request. A backend error code takes precedence over
/// whatever token came back with it.
pub fn resolve_token(
  state: PermissionState,
  token: Option<&str>,
  error_code: Option<&str>,
) -> Result<String, NotificationError> {
  ensure_granted(state)?;
  if let Some(code) = error_code {
    return Err(NotificationError::from_code(code));
  }
  validate_token(token.unwrap_or_default()).map(str::to_string)
}
