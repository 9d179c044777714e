//! Main application module.
//!
//! This module contains the `App` struct that wires the settings store, the
//! API client, the notifier and the monitor together, and implements every
//! command of the binary.

use crate::api::{ApiClient, PriceApi, TrackRequest};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::monitor::{AlertEvaluator, CycleReport, Monitor, Poller, Scheduler, ShutdownSignal};
use crate::notify::{
    ActionDispatcher, DesktopSink, LinkOpener, LogOpener, LogSink, NotificationEvent,
    NotificationSink, Notifier, SystemOpener,
};
use crate::state::{
    FileStore, KeyValueStore, Settings, SettingsStore, TrackedProduct, validate_condition,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// The main application.
pub struct App {
    /// Configuration.
    config: Config,
    /// Typed settings store.
    store: Arc<SettingsStore>,
    /// Remote API.
    api: Arc<dyn PriceApi>,
    /// Notification surface.
    notifier: Arc<Notifier>,
    /// Poll cycle runner.
    monitor: Arc<Monitor>,
    /// Sender handed to sinks that report user interaction.
    events_tx: mpsc::UnboundedSender<NotificationEvent>,
    /// Receiver consumed by the action dispatcher while running.
    events_rx: Option<mpsc::UnboundedReceiver<NotificationEvent>>,
}

impl App {
    /// Create the application from configuration: file store, HTTP client and configured sinks.
    pub fn new(config: Config) -> Result<Self> {
        let settings_path = config.storage.settings_path();
        info!(path = %settings_path.display(), "Using settings store");
        let kv: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(settings_path));
        let api: Arc<dyn PriceApi> = Arc::new(ApiClient::new(config.api.clone())?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let mut sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(LogSink)];
        if config.notifications.desktop {
            sinks.push(Arc::new(DesktopSink::new(events_tx.clone())));
        }

        Ok(Self::assemble(config, kv, api, sinks, events_tx, events_rx))
    }

    /// Create the application from explicit collaborators.
    pub fn with_parts(
        config: Config,
        kv: Arc<dyn KeyValueStore>,
        api: Arc<dyn PriceApi>,
        sinks: Vec<Arc<dyn NotificationSink>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self::assemble(config, kv, api, sinks, events_tx, events_rx)
    }

    fn assemble(
        config: Config,
        kv: Arc<dyn KeyValueStore>,
        api: Arc<dyn PriceApi>,
        sinks: Vec<Arc<dyn NotificationSink>>,
        events_tx: mpsc::UnboundedSender<NotificationEvent>,
        events_rx: mpsc::UnboundedReceiver<NotificationEvent>,
    ) -> Self {
        let store = Arc::new(SettingsStore::new(kv, config.api.base_url.clone()));
        let notifier = Arc::new(Notifier::new(sinks, config.alerts.currency_symbol.clone()));
        let monitor = Arc::new(Monitor::new(
            store.clone(),
            Poller::new(api.clone(), config.poller.request_delay()),
            AlertEvaluator::new(config.alerts.repeat_window()),
            notifier.clone(),
        ));

        Self {
            config,
            store,
            api,
            notifier,
            monitor,
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Sender for notification interaction events.
    pub fn event_sender(&self) -> mpsc::UnboundedSender<NotificationEvent> {
        self.events_tx.clone()
    }

    pub fn store(&self) -> &Arc<SettingsStore> {
        &self.store
    }

    fn dispatcher(&self) -> ActionDispatcher {
        let opener: Arc<dyn LinkOpener> = if self.config.notifications.open_links {
            Arc::new(SystemOpener)
        } else {
            Arc::new(LogOpener)
        };
        ActionDispatcher::new(
            self.notifier.clone(),
            self.store.clone(),
            opener,
            self.config.alerts.stop_action,
        )
    }

    /// Run the monitor until Ctrl-C.
    pub async fn run(&mut self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Shutdown requested"),
                Err(e) => warn!(error = %e, "Could not listen for Ctrl-C, shutting down"),
            }
            shutdown_tx.send_replace(true);
        });

        self.run_until(shutdown_rx).await
    }

    /// Run the monitor until `shutdown` is signalled.
    pub async fn run_until(&mut self, mut shutdown: ShutdownSignal) -> Result<()> {
        let events = self
            .events_rx
            .take()
            .ok_or_else(|| Error::channel("monitor is already running"))?;

        let mut scheduler = Scheduler::new(
            self.monitor.clone(),
            self.config.poller.interval(),
            shutdown.clone(),
        );
        scheduler.start();
        let dispatcher = tokio::spawn(self.dispatcher().run(events, shutdown.clone()));

        let settings = self.store.load_or_empty().await;
        info!(
            products = settings.tracked_products.len(),
            api = %settings.api_base_url,
            stop_action = %self.config.alerts.stop_action,
            "Price monitor running"
        );

        crate::monitor::wait_for_shutdown(&mut shutdown).await;

        scheduler.stop();
        scheduler.wait_idle().await;
        dispatcher
            .await
            .map_err(|e| Error::channel(format!("action dispatcher: {e}")))?;

        info!(fired = scheduler.stats().fired, skipped = scheduler.stats().skipped, "Price monitor stopped");
        Ok(())
    }

    /// Run a single poll cycle now; Ctrl-C cancels it cleanly.
    pub async fn check_now(&self) -> Result<CycleReport> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let watcher = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                shutdown_tx.send_replace(true);
            }
        });

        let scheduler = Scheduler::new(
            self.monitor.clone(),
            self.config.poller.interval(),
            shutdown_rx,
        );
        let report = match scheduler.trigger_now() {
            Some(cycle) => cycle
                .await
                .map_err(|e| Error::channel(format!("price check task: {e}")))
                .and_then(|outcome| outcome),
            None => Err(Error::channel("a price check is already running")),
        };
        watcher.abort();
        report
    }

    /// Register a product with the remote API and start tracking it.
    pub async fn track(
        &self,
        url: &str,
        target_price: Option<Decimal>,
        drop_percent: Option<Decimal>,
    ) -> Result<TrackedProduct> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::invalid_input("product URL is required"));
        }
        url::Url::parse(url).map_err(|e| Error::invalid_input(format!("{url}: {e}")))?;
        validate_condition(target_price, drop_percent)?;

        let base_url = self.store.api_base_url().await?;
        let request = TrackRequest {
            url: url.to_string(),
            target_price,
            drop_percent,
            channel: self.config.registration.channel.clone(),
            endpoint: self.config.registration.endpoint.clone(),
        };
        let response = self.api.track(&base_url, &request).await?;

        let product = TrackedProduct::new(response.product_id, url, target_price, drop_percent)?;
        self.store.add_product(product.clone()).await?;
        info!(product_id = %product.id, domain = %product.domain, "Product tracked");

        if let Err(e) = self
            .notifier
            .info(
                "Product added",
                &format!("Monitoring active for: {}", product.domain),
            )
            .await
        {
            warn!(error = %e, "Could not show confirmation");
        }
        Ok(product)
    }

    /// Current settings.
    pub async fn settings(&self) -> Result<Settings> {
        self.store.load().await
    }

    /// Remove a product from the tracked list.
    pub async fn untrack(&self, product_id: &str) -> Result<bool> {
        let removed = self.store.remove_product(product_id).await?;
        if removed {
            info!(product_id, "Product untracked");
        }
        Ok(removed)
    }

    /// Persist the API base URL.
    pub async fn set_api_url(&self, url: &str) -> Result<()> {
        self.store.set_api_base_url(url).await?;
        info!(url, "API URL saved");
        Ok(())
    }
}
