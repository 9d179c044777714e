//! Remote price-tracking API integration.
//!
//! The monitor only talks to the API through [`PriceApi`], so the poll
//! cycle can be driven by a mock in tests and by [`ApiClient`] in production.

mod client;
mod types;

pub use client::{ApiClient, ApiClientBuilder, PriceApi, docs_url};
#[cfg(test)]
pub use client::MockPriceApi;
pub use types::{ProductDetail, ScrapeStatus, TrackRequest, TrackResponse};
