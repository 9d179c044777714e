//! Notification surface for price alerts.
//!
//! The [`Notifier`] formats alerts and hands them to one or more
//! [`NotificationSink`]s. Sinks report user interaction back as
//! [`NotificationEvent`]s over an mpsc channel; the single
//! [`ActionDispatcher`] consumes that channel and applies the resulting
//! [`UserAction`]s.

mod dispatcher;
mod notifier;
mod sink;

pub use dispatcher::{ActionDispatcher, LinkOpener, LogOpener, SystemOpener};
pub use notifier::{Notifier, format_price};
pub use sink::{DesktopSink, LogSink, NotificationSink};

#[cfg(test)]
pub use dispatcher::MockLinkOpener;
#[cfg(test)]
pub use sink::MockNotificationSink;

/// A button offered on an alert notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationAction {
    /// Open the reference page for the product.
    View,
    /// Stop alerting for the product.
    StopMonitoring,
}

impl NotificationAction {
    /// Buttons of an alert, in button-index order.
    pub const ALERT_BUTTONS: [NotificationAction; 2] = [Self::View, Self::StopMonitoring];

    pub fn label(self) -> &'static str {
        match self {
            Self::View => "View product",
            Self::StopMonitoring => "Stop monitoring",
        }
    }

    /// Stable identifier passed to desktop notification daemons.
    pub fn key(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::StopMonitoring => "stop",
        }
    }

    pub fn from_button_index(index: usize) -> Option<Self> {
        Self::ALERT_BUTTONS.get(index).copied()
    }
}

/// A notification handed to the sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    /// Product the notification is about, `None` for informational messages.
    pub product_id: Option<String>,
    pub title: String,
    pub message: String,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    /// An alert for a product with the view / stop buttons.
    pub fn alert(
        product_id: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: Some(product_id.into()),
            title: title.into(),
            message: message.into(),
            actions: NotificationAction::ALERT_BUTTONS.to_vec(),
        }
    }

    /// An informational message without buttons.
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            product_id: None,
            title: title.into(),
            message: message.into(),
            actions: Vec::new(),
        }
    }
}

/// User interaction reported by a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    ButtonClicked {
        notification_id: String,
        button_index: usize,
    },
    /// Dismissed without pressing a button.
    Closed { notification_id: String },
}

/// A resolved request from the user about a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAction {
    pub kind: NotificationAction,
    pub product_id: String,
}
