//! Applies user actions coming back from notifications.

use super::{NotificationAction, NotificationEvent, Notifier, UserAction};
use crate::api::docs_url;
use crate::config::StopAction;
use crate::error::{Error, Result};
use crate::monitor::{ShutdownSignal, wait_for_shutdown};
use crate::state::SettingsStore;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Opens a URL for the user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<()>;
}

/// Opens URLs with the platform's default handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

#[async_trait]
impl LinkOpener for SystemOpener {
    async fn open(&self, url: &str) -> Result<()> {
        let mut command = if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(windows) {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]);
            command
        } else {
            Command::new("xdg-open")
        };

        let status = command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::notification(format!("could not open {url}: {status}")))
        }
    }
}

/// Only logs the URL it was asked to open.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOpener;

#[async_trait]
impl LinkOpener for LogOpener {
    async fn open(&self, url: &str) -> Result<()> {
        info!(%url, "Open link");
        Ok(())
    }
}

/// Single consumer of the notification event channel.
pub struct ActionDispatcher {
    notifier: Arc<Notifier>,
    store: Arc<SettingsStore>,
    opener: Arc<dyn LinkOpener>,
    stop_action: StopAction,
}

impl ActionDispatcher {
    pub fn new(
        notifier: Arc<Notifier>,
        store: Arc<SettingsStore>,
        opener: Arc<dyn LinkOpener>,
        stop_action: StopAction,
    ) -> Self {
        Self {
            notifier,
            store,
            opener,
            stop_action,
        }
    }

    /// Consume events until the channel closes or shutdown is requested.
    pub async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<NotificationEvent>,
        mut shutdown: ShutdownSignal,
    ) {
        debug!(stop_action = %self.stop_action, "Action dispatcher started");
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                _ = wait_for_shutdown(&mut shutdown) => break,
            }
        }
        debug!("Action dispatcher stopped");
    }

    pub async fn handle_event(&self, event: NotificationEvent) {
        let Some(action) = self.notifier.resolve(event).await else {
            return;
        };
        if let Err(e) = self.apply(&action).await {
            warn!(error = %e, product_id = %action.product_id, kind = ?action.kind, "Notification action failed");
        }
    }

    pub async fn apply(&self, action: &UserAction) -> Result<()> {
        match action.kind {
            NotificationAction::View => {
                let base_url = self.store.api_base_url().await?;
                let url = docs_url(&base_url);
                info!(product_id = %action.product_id, %url, "Opening product reference page");
                self.opener.open(&url).await
            }
            NotificationAction::StopMonitoring => self.stop_monitoring(&action.product_id).await,
        }
    }

    async fn stop_monitoring(&self, product_id: &str) -> Result<()> {
        let found = match self.stop_action {
            StopAction::Remove => self.store.remove_product(product_id).await?,
            StopAction::Mute => self.store.set_muted(product_id, true).await?,
        };
        if found {
            info!(product_id, action = %self.stop_action, "Stopped monitoring product");
        } else {
            warn!(product_id, "Stop requested for a product that is no longer tracked");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::AlertDecision;
    use crate::notify::{LogSink, NotificationSink};
    use crate::state::{MemoryStore, TrackedProduct};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;
    use tokio::sync::watch;

    struct Fixture {
        notifier: Arc<Notifier>,
        store: Arc<SettingsStore>,
    }

    async fn fixture() -> Fixture {
        let sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(LogSink)];
        let notifier = Arc::new(Notifier::new(sinks, "R$"));
        let store = Arc::new(SettingsStore::new(
            Arc::new(MemoryStore::new()),
            "http://localhost:8000",
        ));
        for id in ["p1", "p2"] {
            let product =
                TrackedProduct::new(id, format!("https://shop.com/{id}"), Some(dec!(100)), None)
                    .unwrap();
            store.add_product(product).await.unwrap();
        }
        Fixture { notifier, store }
    }

    async fn raise_for(fixture: &Fixture, product_id: &str) -> String {
        let settings = fixture.store.load().await.unwrap();
        let product = settings.product(product_id).unwrap();
        let decision = AlertDecision::TargetReached {
            current_price: dec!(90),
            target_price: dec!(100),
        };
        fixture.notifier.raise(&decision, product).await.unwrap().id
    }

    #[tokio::test]
    async fn test_view_opens_docs_of_stored_api() {
        let fixture = fixture().await;
        fixture
            .store
            .set_api_base_url("https://prices.example.com")
            .await
            .unwrap();
        let mut opener = MockLinkOpener::new();
        opener
            .expect_open()
            .withf(|url| url == "https://prices.example.com/docs")
            .times(1)
            .returning(|_| Ok(()));
        let dispatcher = ActionDispatcher::new(
            fixture.notifier.clone(),
            fixture.store.clone(),
            Arc::new(opener),
            StopAction::Remove,
        );
        let id = raise_for(&fixture, "p1").await;

        dispatcher
            .handle_event(NotificationEvent::ButtonClicked {
                notification_id: id,
                button_index: 0,
            })
            .await;

        assert_eq!(fixture.store.tracked_products().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stop_removes_product() {
        let fixture = fixture().await;
        let dispatcher = ActionDispatcher::new(
            fixture.notifier.clone(),
            fixture.store.clone(),
            Arc::new(MockLinkOpener::new()),
            StopAction::Remove,
        );
        let id = raise_for(&fixture, "p1").await;

        dispatcher
            .handle_event(NotificationEvent::ButtonClicked {
                notification_id: id,
                button_index: 1,
            })
            .await;

        let ids: Vec<_> = fixture
            .store
            .tracked_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["p2".to_string()]);
    }

    #[tokio::test]
    async fn test_stop_mutes_product() {
        let fixture = fixture().await;
        let dispatcher = ActionDispatcher::new(
            fixture.notifier.clone(),
            fixture.store.clone(),
            Arc::new(MockLinkOpener::new()),
            StopAction::Mute,
        );

        dispatcher
            .apply(&UserAction {
                kind: NotificationAction::StopMonitoring,
                product_id: "p2".to_string(),
            })
            .await
            .unwrap();

        let products = fixture.store.tracked_products().await.unwrap();
        assert_eq!(products.len(), 2);
        assert!(!products[0].muted);
        assert!(products[1].muted);
    }

    #[tokio::test]
    async fn test_run_consumes_channel_until_closed() {
        let fixture = fixture().await;
        let dispatcher = ActionDispatcher::new(
            fixture.notifier.clone(),
            fixture.store.clone(),
            Arc::new(MockLinkOpener::new()),
            StopAction::Remove,
        );
        let id = raise_for(&fixture, "p2").await;
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        events_tx
            .send(NotificationEvent::ButtonClicked {
                notification_id: id,
                button_index: 1,
            })
            .unwrap();
        drop(events_tx);
        dispatcher.run(events_rx, shutdown_rx).await;

        let products = fixture.store.tracked_products().await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].id, "p1");
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let fixture = fixture().await;
        let dispatcher = ActionDispatcher::new(
            fixture.notifier.clone(),
            fixture.store.clone(),
            Arc::new(MockLinkOpener::new()),
            StopAction::Remove,
        );
        let (_events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(dispatcher.run(events_rx, shutdown_rx));
        shutdown_tx.send(true).unwrap();
        tokio_test::assert_ok!(task.await);
    }
}
