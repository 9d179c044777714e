//! Alert formatting and notification handle tracking.

use super::{Notification, NotificationAction, NotificationEvent, NotificationSink, UserAction};
use crate::error::{Error, Result};
use crate::monitor::AlertDecision;
use crate::state::TrackedProduct;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Format a price with exactly two decimals.
pub fn format_price(price: Decimal) -> String {
    format!(
        "{:.2}",
        price.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

/// Surfaces alerts and maps user interaction back to products.
pub struct Notifier {
    sinks: Vec<Arc<dyn NotificationSink>>,
    currency_symbol: String,
    /// Open alert notifications, by notification id, with their product id.
    active: Mutex<HashMap<String, String>>,
}

impl Notifier {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>, currency_symbol: impl Into<String>) -> Self {
        Self {
            sinks,
            currency_symbol: currency_symbol.into(),
            active: Mutex::new(HashMap::new()),
        }
    }

    fn money(&self, price: Decimal) -> String {
        if self.currency_symbol.is_empty() {
            format_price(price)
        } else {
            format!("{} {}", self.currency_symbol, format_price(price))
        }
    }

    /// Title and message for an alert.
    pub fn format_alert(&self, decision: &AlertDecision, product: &TrackedProduct) -> (String, String) {
        match decision {
            AlertDecision::TargetReached {
                current_price,
                target_price,
            } => (
                "Target price reached!".to_string(),
                format!(
                    "{}: {} (target: {})",
                    product.domain,
                    self.money(*current_price),
                    self.money(*target_price)
                ),
            ),
            AlertDecision::PriceDrop {
                current_price,
                reference_price,
                drop_percent,
            } => (
                "Price drop detected!".to_string(),
                format!(
                    "{}: {} ({:.1}% below {})",
                    product.domain,
                    self.money(*current_price),
                    drop_percent.round_dp(1),
                    self.money(*reference_price)
                ),
            ),
        }
    }

    /// Show an alert for `product` and remember its handle.
    pub async fn raise(
        &self,
        decision: &AlertDecision,
        product: &TrackedProduct,
    ) -> Result<Notification> {
        let (title, message) = self.format_alert(decision, product);
        let notification = Notification::alert(&product.id, title, message);

        self.show(&notification).await?;

        // One live handle per product: a new alert replaces the previous one.
        let replaced: Vec<String> = {
            let mut active = self.active.lock().await;
            let stale = active
                .iter()
                .filter(|(_, product_id)| **product_id == product.id)
                .map(|(id, _)| id.clone())
                .collect::<Vec<_>>();
            for id in &stale {
                active.remove(id);
            }
            active.insert(notification.id.clone(), product.id.clone());
            stale
        };
        for id in &replaced {
            self.clear(id).await;
        }
        Ok(notification)
    }

    /// Show an informational message.
    pub async fn info(&self, title: &str, message: &str) -> Result<Notification> {
        let notification = Notification::info(title, message);
        self.show(&notification).await?;
        Ok(notification)
    }

    /// Succeeds when at least one sink displayed the notification.
    async fn show(&self, notification: &Notification) -> Result<()> {
        let mut last_error = None;
        let mut shown = false;
        for sink in &self.sinks {
            match sink.show(notification).await {
                Ok(()) => shown = true,
                Err(e) => {
                    warn!(error = %e, id = %notification.id, "Notification sink failed");
                    last_error = Some(e);
                }
            }
        }

        match (shown, last_error) {
            (true, _) => Ok(()),
            (false, Some(e)) => Err(e),
            (false, None) => Err(Error::notification("no notification sink configured")),
        }
    }

    /// Turn a sink event into a user action, releasing the notification handle.
    pub async fn resolve(&self, event: NotificationEvent) -> Option<UserAction> {
        let (notification_id, button_index) = match event {
            NotificationEvent::ButtonClicked {
                notification_id,
                button_index,
            } => (notification_id, Some(button_index)),
            NotificationEvent::Closed { notification_id } => (notification_id, None),
        };

        let product_id = self.active.lock().await.remove(&notification_id);
        self.clear(&notification_id).await;

        let Some(button_index) = button_index else {
            debug!(id = %notification_id, "Notification dismissed");
            return None;
        };
        let Some(product_id) = product_id else {
            warn!(id = %notification_id, "Click on unknown notification ignored");
            return None;
        };
        let Some(kind) = NotificationAction::from_button_index(button_index) else {
            warn!(id = %notification_id, button_index, "Unknown notification button ignored");
            return None;
        };

        Some(UserAction { kind, product_id })
    }

    async fn clear(&self, notification_id: &str) {
        for sink in &self.sinks {
            if let Err(e) = sink.clear(notification_id).await {
                debug!(error = %e, id = %notification_id, "Failed to clear notification");
            }
        }
    }

    /// Number of alert notifications still awaiting interaction.
    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }
}
