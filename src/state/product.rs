//! Tracked product state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Display name used when a product URL has no usable host.
const UNKNOWN_DOMAIN: &str = "unknown";

/// The kind of alert raised for a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AlertKind {
    TargetReached,
    PriceDrop,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TargetReached => write!(f, "target-reached"),
            Self::PriceDrop => write!(f, "price-drop"),
        }
    }
}

/// The most recent alert raised for a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastAlert {
    pub kind: AlertKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub at: DateTime<Utc>,
}

/// A product registered with the remote API and watched locally.
///
/// Field names follow the camelCase layout of the stored `trackedProducts` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedProduct {
    /// Identifier issued by the remote API.
    #[serde(with = "opaque_id")]
    pub id: String,
    /// Canonical product page.
    pub url: String,
    /// Alert when the price is at or below this value.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_price: Option<Decimal>,
    /// Alert when the price drops by this percentage.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub drop_percent: Option<Decimal>,
    pub added_at: DateTime<Utc>,
    /// Host of `url` for display.
    pub domain: String,
    /// Polled but never alerted.
    #[serde(default)]
    pub muted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_alert: Option<LastAlert>,
}

impl TrackedProduct {
    /// Create a product after a successful remote registration.
    pub fn new(
        id: impl Into<String>,
        url: impl Into<String>,
        target_price: Option<Decimal>,
        drop_percent: Option<Decimal>,
    ) -> Result<Self> {
        validate_condition(target_price, drop_percent)?;

        let url = url.into();
        Ok(Self {
            id: id.into(),
            domain: domain_from_url(&url),
            url,
            target_price,
            drop_percent,
            added_at: Utc::now(),
            muted: false,
            last_alert: None,
        })
    }
}

/// API-issued ids arrive as JSON integers and are kept as opaque strings.
///
/// Ids that are plain numbers are written back as numbers so the stored list
/// keeps the layout other clients of the same store expect.
pub(crate) mod opaque_id {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(id: &str, serializer: S) -> Result<S::Ok, S::Error> {
        match id.parse::<u64>() {
            Ok(number) if number.to_string() == id => number.serialize(serializer),
            _ => id.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(number) => number.to_string(),
            RawId::Text(text) => text,
        })
    }
}

/// Check the alert condition of a new product.
pub fn validate_condition(target_price: Option<Decimal>, drop_percent: Option<Decimal>) -> Result<()> {
    if target_price.is_none() && drop_percent.is_none() {
        return Err(Error::invalid_input(
            "set a target price or a drop percentage",
        ));
    }
    if target_price.is_some_and(|target| target <= Decimal::ZERO) {
        return Err(Error::invalid_input("target price must be greater than zero"));
    }
    if drop_percent.is_some_and(|percent| percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED)
    {
        return Err(Error::invalid_input("drop percentage must be in (0, 100]"));
    }
    Ok(())
}

/// Derive the display domain of a product URL.
pub fn domain_from_url(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .map(|host| host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_domain_strips_www() {
        assert_eq!(
            domain_from_url("https://www.example.com.br/item/123?ref=x"),
            "example.com.br"
        );
        assert_eq!(domain_from_url("https://shop.example.com/p"), "shop.example.com");
        assert_eq!(domain_from_url("not a url"), "unknown");
    }

    #[test]
    fn test_new_requires_a_condition() {
        let err = TrackedProduct::new("p1", "https://example.com", None, None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_new_rejects_out_of_range_values() {
        assert!(TrackedProduct::new("p1", "https://a.com", Some(dec!(0)), None).is_err());
        assert!(TrackedProduct::new("p1", "https://a.com", None, Some(dec!(0))).is_err());
        assert!(TrackedProduct::new("p1", "https://a.com", None, Some(dec!(100.5))).is_err());
        assert!(TrackedProduct::new("p1", "https://a.com", None, Some(dec!(100))).is_ok());
    }

    #[test]
    fn test_new_derives_domain() {
        let product =
            TrackedProduct::new("p1", "https://www.loja.com/x", Some(dec!(99.90)), None).unwrap();
        assert_eq!(product.domain, "loja.com");
        assert!(!product.muted);
        assert_eq!(product.last_alert, None);
    }

    #[test]
    fn test_reads_stored_extension_layout() {
        let json = r#"{
            "id": "abc",
            "url": "https://www.loja.com/x",
            "targetPrice": 100,
            "dropPercent": null,
            "addedAt": "2024-05-01T12:00:00Z",
            "domain": "loja.com"
        }"#;
        let product: TrackedProduct = serde_json::from_str(json).unwrap();

        assert_eq!(product.target_price, Some(dec!(100)));
        assert_eq!(product.drop_percent, None);
        assert!(!product.muted);
    }

    #[test]
    fn test_integer_id_is_read_and_written_back_as_number() {
        let json = r#"{
            "id": 7,
            "url": "https://www.loja.com/x",
            "targetPrice": 100,
            "addedAt": "2024-05-01T12:00:00Z",
            "domain": "loja.com"
        }"#;
        let product: TrackedProduct = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, "7");

        let stored = serde_json::to_value(&product).unwrap();
        assert_eq!(stored["id"], serde_json::json!(7));

        let mut padded = product.clone();
        padded.id = "007".to_string();
        assert_eq!(serde_json::to_value(&padded).unwrap()["id"], serde_json::json!("007"));
    }
}
