//! Sequential force-checks over the tracked product list.

use super::{ShutdownSignal, wait_for_shutdown};
use crate::api::PriceApi;
use crate::error::{Error, Result};
use crate::state::{PollResult, TrackedProduct};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Issues one remote status check per tracked product, in stored order.
pub struct Poller {
    api: Arc<dyn PriceApi>,
    request_delay: Duration,
}

impl Poller {
    pub fn new(api: Arc<dyn PriceApi>, request_delay: Duration) -> Self {
        Self { api, request_delay }
    }

    /// Check every product, waiting `request_delay` between two requests.
    ///
    /// A failing product is logged and left out of the results. Returns
    /// [`Error::Cancelled`] as soon as shutdown is observed.
    pub async fn poll_all(
        &self,
        products: &[TrackedProduct],
        api_base_url: &str,
        shutdown: &mut ShutdownSignal,
    ) -> Result<Vec<PollResult>> {
        let mut results = Vec::with_capacity(products.len());

        for (index, product) in products.iter().enumerate() {
            if index > 0 && !self.request_delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(self.request_delay) => {}
                    _ = wait_for_shutdown(shutdown) => return Err(Error::Cancelled),
                }
            }
            if *shutdown.borrow() {
                return Err(Error::Cancelled);
            }

            let outcome = tokio::select! {
                outcome = self.check(product, api_base_url) => outcome,
                _ = wait_for_shutdown(shutdown) => return Err(Error::Cancelled),
            };
            match outcome {
                Ok(result) => {
                    debug!(product_id = %product.id, updated = result.updated, price = ?result.current_price, "Product checked");
                    results.push(result);
                }
                Err(e) => warn!(product_id = %product.id, error = %e, "Price check failed, skipping product"),
            }
        }

        Ok(results)
    }

    /// Force-check one product and fetch its price when the check reports an update.
    pub async fn check(&self, product: &TrackedProduct, api_base_url: &str) -> Result<PollResult> {
        let status = self.api.scrape_now(api_base_url, &product.id).await?;
        if !status.updated {
            return Ok(PollResult::unchanged(&product.id));
        }

        let detail = self.api.product(api_base_url, &product.id).await?;
        Ok(PollResult::updated(&product.id, detail.current_price))
    }
}
