//! # pricedrop - background price-drop monitor
//!
//! Watches products registered with a remote price-tracking API and raises
//! a notification when a product reaches its target price.
//!
//! ## Architecture
//!
//! - **App**: wiring and the commands of the binary
//! - **Monitor**: scheduler, poller, alert evaluator and the poll cycle
//! - **Notify**: alert formatting, notification sinks and the action dispatcher
//! - **API**: remote price-tracking API client
//! - **State**: tracked products and the injected settings store
//! - **Config**: configuration management

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod state;

pub use app::App;
pub use config::Config;
pub use error::{Error, Result};
pub use monitor::{AlertDecision, AlertEvaluator, CycleReport, Monitor, Poller, Scheduler};
pub use notify::Notifier;
pub use state::{PollResult, Settings, SettingsStore, TrackedProduct};
