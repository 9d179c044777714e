//! Places notifications are shown.

use super::{Notification, NotificationEvent};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A surface that can display notifications.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Display a notification.
    async fn show(&self, notification: &Notification) -> Result<()>;

    /// Remove a notification once it was handled.
    async fn clear(&self, notification_id: &str) -> Result<()>;
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn show(&self, notification: &Notification) -> Result<()> {
        let actions: Vec<_> = notification.actions.iter().map(|a| a.label()).collect();
        info!(
            id = %notification.id,
            product_id = notification.product_id.as_deref().unwrap_or("-"),
            ?actions,
            "{}: {}",
            notification.title,
            notification.message
        );
        Ok(())
    }

    async fn clear(&self, notification_id: &str) -> Result<()> {
        debug!(id = notification_id, "Notification cleared");
        Ok(())
    }
}

/// Desktop notifications through the platform notifier.
///
/// On Linux alerts are shown with `notify-send --wait` and one `--action`
/// per button; the chosen action is read from its stdout and reported as a
/// [`NotificationEvent`]. On macOS `osascript` is used, which has no buttons.
#[derive(Debug, Clone)]
pub struct DesktopSink {
    app_name: String,
    events: mpsc::UnboundedSender<NotificationEvent>,
}

impl DesktopSink {
    pub fn new(events: mpsc::UnboundedSender<NotificationEvent>) -> Self {
        Self {
            app_name: env!("CARGO_PKG_NAME").to_string(),
            events,
        }
    }

    fn notify_send_args(&self, notification: &Notification) -> Vec<String> {
        let mut args = vec![format!("--app-name={}", self.app_name)];
        if !notification.actions.is_empty() {
            args.push("--wait".to_string());
            for action in &notification.actions {
                args.push(format!("--action={}={}", action.key(), action.label()));
            }
        }
        args.push(notification.title.clone());
        args.push(notification.message.clone());
        args
    }

    /// Map the action key printed by `notify-send` to a notification event.
    fn event_from_output(notification: &Notification, stdout: &str) -> NotificationEvent {
        let chosen = stdout.trim();
        match notification.actions.iter().position(|a| a.key() == chosen) {
            Some(button_index) => NotificationEvent::ButtonClicked {
                notification_id: notification.id.clone(),
                button_index,
            },
            None => NotificationEvent::Closed {
                notification_id: notification.id.clone(),
            },
        }
    }

    async fn show_linux(&self, notification: &Notification) -> Result<()> {
        let child = Command::new("notify-send")
            .args(self.notify_send_args(notification))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::notification(format!("notify-send: {e}")))?;

        if notification.actions.is_empty() {
            return Ok(());
        }

        let notification = notification.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            match child.wait_with_output().await {
                Ok(output) => {
                    let stdout = String::from_utf8_lossy(&output.stdout);
                    let event = Self::event_from_output(&notification, &stdout);
                    if events.send(event).is_err() {
                        debug!(id = %notification.id, "Event channel closed, dropping interaction");
                    }
                }
                Err(e) => warn!(error = %e, id = %notification.id, "notify-send failed"),
            }
        });
        Ok(())
    }

    async fn show_macos(&self, notification: &Notification) -> Result<()> {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape_applescript(&notification.message),
            escape_applescript(&notification.title)
        );
        Command::new("osascript")
            .arg("-e")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| Error::notification(format!("osascript: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for DesktopSink {
    async fn show(&self, notification: &Notification) -> Result<()> {
        if cfg!(target_os = "macos") {
            self.show_macos(notification).await
        } else if cfg!(unix) {
            self.show_linux(notification).await
        } else {
            Err(Error::notification(
                "desktop notifications are not supported on this platform",
            ))
        }
    }

    async fn clear(&self, _notification_id: &str) -> Result<()> {
        // The platform notifiers close their own bubbles.
        Ok(())
    }
}

fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
