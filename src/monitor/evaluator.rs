//! Alert decisions for polled prices.

use crate::state::{AlertKind, LastAlert, TrackedProduct};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Why a product deserves a notification.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertDecision {
    /// The current price is at or below the product's target.
    TargetReached {
        current_price: Decimal,
        target_price: Decimal,
    },
    /// The price fell by at least the product's drop percentage.
    ///
    /// Never produced by [`AlertEvaluator::evaluate`] yet: it needs a
    /// reference price from a price history this client does not keep.
    PriceDrop {
        current_price: Decimal,
        reference_price: Decimal,
        drop_percent: Decimal,
    },
}

impl AlertDecision {
    pub fn kind(&self) -> AlertKind {
        match self {
            Self::TargetReached { .. } => AlertKind::TargetReached,
            Self::PriceDrop { .. } => AlertKind::PriceDrop,
        }
    }

    pub fn current_price(&self) -> Decimal {
        match self {
            Self::TargetReached { current_price, .. } | Self::PriceDrop { current_price, .. } => {
                *current_price
            }
        }
    }

    /// The record stored on the product once this alert was raised.
    pub fn to_last_alert(&self, at: DateTime<Utc>) -> LastAlert {
        LastAlert {
            kind: self.kind(),
            price: self.current_price(),
            at,
        }
    }
}

/// Decides whether a polled price raises an alert.
#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    repeat_window: Option<chrono::Duration>,
}

impl AlertEvaluator {
    /// Create an evaluator; identical alerts within `repeat_window` count as repeats.
    pub fn new(repeat_window: Option<chrono::Duration>) -> Self {
        Self { repeat_window }
    }

    /// Decide whether `current_price` triggers an alert for `product`.
    ///
    /// A price of zero or below is not a price and never alerts.
    pub fn evaluate(&self, product: &TrackedProduct, current_price: Decimal) -> Option<AlertDecision> {
        if current_price <= Decimal::ZERO {
            return None;
        }
        let target_price = product.target_price?;
        (current_price <= target_price).then_some(AlertDecision::TargetReached {
            current_price,
            target_price,
        })
    }

    /// Whether `decision` repeats the product's last alert inside the window.
    pub fn is_repeat(
        &self,
        product: &TrackedProduct,
        decision: &AlertDecision,
        now: DateTime<Utc>,
    ) -> bool {
        let (Some(window), Some(last)) = (self.repeat_window, product.last_alert.as_ref()) else {
            return false;
        };
        last.kind == decision.kind()
            && last.price == decision.current_price()
            && now.signed_duration_since(last.at) < window
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn product_with_target(target: Decimal) -> TrackedProduct {
        TrackedProduct::new("p1", "https://www.shop.com/item", Some(target), None).unwrap()
    }

    #[test]
    fn test_price_equal_to_target_alerts() {
        let evaluator = AlertEvaluator::default();
        let product = product_with_target(dec!(100.00));

        assert_eq!(
            evaluator.evaluate(&product, dec!(100.00)),
            Some(AlertDecision::TargetReached {
                current_price: dec!(100.00),
                target_price: dec!(100.00),
            })
        );
    }

    #[test]
    fn test_price_one_cent_above_target_does_not_alert() {
        let evaluator = AlertEvaluator::default();
        let product = product_with_target(dec!(100.00));

        assert_eq!(evaluator.evaluate(&product, dec!(100.01)), None);
    }

    #[test]
    fn test_below_target_alerts() {
        let evaluator = AlertEvaluator::default();
        let product = product_with_target(dec!(100.00));

        let decision = evaluator.evaluate(&product, dec!(95.50)).unwrap();
        assert_eq!(decision.kind(), AlertKind::TargetReached);
        assert_eq!(decision.current_price(), dec!(95.50));
    }

    #[test]
    fn test_drop_percent_only_never_alerts() {
        let evaluator = AlertEvaluator::default();
        let product = TrackedProduct::new("p1", "https://shop.com", None, Some(dec!(10))).unwrap();

        assert_eq!(evaluator.evaluate(&product, dec!(0.01)), None);
    }

    #[test]
    fn test_repeat_within_window() {
        let evaluator = AlertEvaluator::new(Some(chrono::Duration::minutes(60)));
        let mut product = product_with_target(dec!(100));
        let decision = evaluator.evaluate(&product, dec!(90)).unwrap();
        let now = Utc::now();

        assert!(!evaluator.is_repeat(&product, &decision, now));

        product.last_alert = Some(decision.to_last_alert(now - chrono::Duration::minutes(30)));
        assert!(evaluator.is_repeat(&product, &decision, now));

        product.last_alert = Some(decision.to_last_alert(now - chrono::Duration::minutes(61)));
        assert!(!evaluator.is_repeat(&product, &decision, now));
    }

    #[test]
    fn test_new_price_is_not_a_repeat() {
        let evaluator = AlertEvaluator::new(Some(chrono::Duration::minutes(60)));
        let mut product = product_with_target(dec!(100));
        let now = Utc::now();
        let first = evaluator.evaluate(&product, dec!(90)).unwrap();
        product.last_alert = Some(first.to_last_alert(now));

        let lower = evaluator.evaluate(&product, dec!(85)).unwrap();
        assert!(!evaluator.is_repeat(&product, &lower, now));
    }

    #[test]
    fn test_disabled_window_never_suppresses() {
        let evaluator = AlertEvaluator::new(None);
        let mut product = product_with_target(dec!(100));
        let now = Utc::now();
        let decision = evaluator.evaluate(&product, dec!(90)).unwrap();
        product.last_alert = Some(decision.to_last_alert(now));

        assert!(!evaluator.is_repeat(&product, &decision, now));
    }

    #[test]
    fn test_zero_price_never_alerts() {
        let evaluator = AlertEvaluator::default();
        let product = product_with_target(dec!(100));

        assert_eq!(evaluator.evaluate(&product, Decimal::ZERO), None);
        assert_eq!(evaluator.evaluate(&product, dec!(-1)), None);
        assert!(evaluator.evaluate(&product, dec!(0.01)).is_some());
    }
}
