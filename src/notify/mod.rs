//! Push notifications: payload decoding, display, click routing and the
//! permission lifecycle.

mod console;
mod descriptor;
mod handler;
pub mod permission;

pub use console::ConsoleHost;
pub use descriptor::NotificationDefaults;
pub use handler::{
  handle_click, handle_push, ClickOutcome, ClientWindows, NotificationClick, NotificationId,
  NotificationSurface,
};

#[cfg(test)]
pub use descriptor::NotificationDescriptor;
#[cfg(test)]
pub use handler::WindowId;
