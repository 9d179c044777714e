//! Background price monitoring.
//!
//! - [`Scheduler`]: fires a poll cycle on a fixed period, never overlapping
//! - [`Poller`]: sequential, rate-limited force-checks against the remote API
//! - [`AlertEvaluator`]: decides whether a polled price deserves an alert
//! - [`Monitor`]: one full poll cycle from settings to notifications

mod evaluator;
mod poller;
mod scheduler;

pub use evaluator::{AlertDecision, AlertEvaluator};
pub use poller::Poller;
pub use scheduler::{Scheduler, SchedulerStats};

use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::state::{LastAlert, SettingsStore};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Receiving side of the process-wide shutdown flag.
pub type ShutdownSignal = watch::Receiver<bool>;

/// Resolves once shutdown is requested; never resolves if the sender is gone without requesting it.
pub async fn wait_for_shutdown(shutdown: &mut ShutdownSignal) {
    let sender_dropped = shutdown.wait_for(|stop| *stop).await.is_err();
    if sender_dropped {
        std::future::pending::<()>().await;
    }
}

/// Summary of one poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Products in the tracked list.
    pub tracked: usize,
    /// Products whose check succeeded.
    pub checked: usize,
    /// Alerts raised.
    pub alerts: usize,
    /// Alerts withheld as repeats.
    pub suppressed: usize,
}

impl std::fmt::Display for CycleReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} products checked, {} alert(s) raised, {} repeat(s) suppressed",
            self.checked, self.tracked, self.alerts, self.suppressed
        )
    }
}

/// Something the scheduler can run once per firing.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run_cycle(&self, shutdown: ShutdownSignal) -> Result<CycleReport>;
}

/// Runs full poll cycles: load settings, poll, evaluate, notify, record.
pub struct Monitor {
    store: Arc<SettingsStore>,
    poller: Poller,
    evaluator: AlertEvaluator,
    notifier: Arc<Notifier>,
}

impl Monitor {
    pub fn new(
        store: Arc<SettingsStore>,
        poller: Poller,
        evaluator: AlertEvaluator,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            store,
            poller,
            evaluator,
            notifier,
        }
    }
}

#[async_trait]
impl CycleRunner for Monitor {
    async fn run_cycle(&self, mut shutdown: ShutdownSignal) -> Result<CycleReport> {
        let settings = self.store.load_or_empty().await;
        let mut report = CycleReport {
            tracked: settings.tracked_products.len(),
            ..CycleReport::default()
        };

        if settings.tracked_products.is_empty() {
            debug!("No products tracked, nothing to check");
            return Ok(report);
        }

        info!(count = report.tracked, api = %settings.api_base_url, "Checking tracked products");
        let results = self
            .poller
            .poll_all(
                &settings.tracked_products,
                &settings.api_base_url,
                &mut shutdown,
            )
            .await?;
        report.checked = results.len();

        let now = Utc::now();
        let mut raised: Vec<(String, LastAlert)> = Vec::new();
        for result in &results {
            let Some(current_price) = result.current_price else {
                continue;
            };
            if current_price <= Decimal::ZERO {
                debug!(product_id = %result.product_id, %current_price, "No usable price, skipping");
                continue;
            }
            let Some(product) = settings.product(&result.product_id) else {
                continue;
            };
            if product.muted {
                debug!(product_id = %product.id, "Product muted, no alert");
                continue;
            }
            let Some(decision) = self.evaluator.evaluate(product, current_price) else {
                continue;
            };
            if self.evaluator.is_repeat(product, &decision, now) {
                debug!(product_id = %product.id, kind = %decision.kind(), "Repeat alert suppressed");
                report.suppressed += 1;
                continue;
            }

            match self.notifier.raise(&decision, product).await {
                Ok(notification) => {
                    info!(product_id = %product.id, notification_id = %notification.id, kind = %decision.kind(), "Price alert raised");
                    report.alerts += 1;
                    raised.push((product.id.clone(), decision.to_last_alert(now)));
                }
                Err(e) => warn!(product_id = %product.id, error = %e, "Could not raise price alert"),
            }
        }

        if *shutdown.borrow() {
            return Err(Error::Cancelled);
        }
        if !raised.is_empty() {
            self.store
                .update_products(move |products| {
                    for (product_id, alert) in raised {
                        if let Some(product) = products.iter_mut().find(|p| p.id == product_id) {
                            product.last_alert = Some(alert);
                        }
                    }
                })
                .await?;
        }

        Ok(report)
    }
}
