//! Wire types of the remote API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `POST /track`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackRequest {
    pub url: String,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_price: Option<Decimal>,
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub drop_percent: Option<Decimal>,
    pub channel: String,
    pub endpoint: String,
}

/// Successful `POST /track` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackResponse {
    #[serde(deserialize_with = "crate::state::opaque_id::deserialize")]
    pub product_id: String,
}

/// Response of `POST /scrape-now`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ScrapeStatus {
    #[serde(default)]
    pub updated: bool,
}

/// Response of `GET /products/{id}`; only the fields the monitor reads.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProductDetail {
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub current_price: Option<Decimal>,
}

/// Error body returned by the API on non-success statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// Render `detail`, which is either a message or a list of validation errors.
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_track_request_omits_unset_conditions() {
        let request = TrackRequest {
            url: "https://shop.com/x".to_string(),
            target_price: Some(dec!(199.9)),
            drop_percent: None,
            channel: "webpush".to_string(),
            endpoint: "me".to_string(),
        };
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            json!({
                "url": "https://shop.com/x",
                "target_price": 199.9,
                "channel": "webpush",
                "endpoint": "me"
            })
        );
    }

    #[test]
    fn test_track_response_accepts_integer_id() {
        let response: TrackResponse =
            serde_json::from_str(r#"{"product_id": 7, "watch_id": 3}"#).unwrap();
        assert_eq!(response.product_id, "7");

        let text: TrackResponse = serde_json::from_str(r#"{"product_id": "abc"}"#).unwrap();
        assert_eq!(text.product_id, "abc");
    }

    #[test]
    fn test_product_detail_reads_full_product_body() {
        let detail: ProductDetail = serde_json::from_value(json!({
            "id": 7,
            "url": "https://www.shop.com/x",
            "domain": "shop.com",
            "title": "TV 50\"",
            "currency": "BRL",
            "current_price": 95.5,
            "in_stock": true
        }))
        .unwrap();
        assert_eq!(detail.current_price, Some(dec!(95.5)));

        let missing: ProductDetail = serde_json::from_value(json!({ "current_price": null })).unwrap();
        assert_eq!(missing.current_price, None);
    }

    #[test]
    fn test_error_body_message() {
        let plain: ErrorBody = serde_json::from_value(json!({ "detail": "Invalid URL" })).unwrap();
        assert_eq!(plain.message(), "Invalid URL");

        let listed: ErrorBody =
            serde_json::from_value(json!({ "detail": [{ "msg": "field required" }] })).unwrap();
        assert!(listed.message().contains("field required"));
    }
}
