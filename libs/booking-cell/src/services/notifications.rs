// libs/booking-cell/src/services/notifications.rs
//
// Fire-and-forget outbound collaborators: state-transition notifications and
// the external credit ledger used by credit-only cancellation policies.
// Delivery failures are logged and never propagate into booking flows.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingCreated,
    BookingConfirmed,
    BookingCancelled,
    BookingRescheduled,
    NoShowRecorded,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub kind: NotificationKind,
    pub booking_id: Uuid,
    pub customer_id: Uuid,
    pub detail: String,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &NotificationEvent) -> anyhow::Result<()>;
}

pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        self.client
            .post(&self.url)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct Notifier {
    sink: Option<Arc<dyn NotificationSink>>,
}

impl Notifier {
    pub fn from_config(config: &AppConfig) -> Self {
        let sink: Option<Arc<dyn NotificationSink>> = if config.notification_webhook_url.is_empty()
        {
            None
        } else {
            Some(Arc::new(WebhookSink::new(
                config.notification_webhook_url.clone(),
            )))
        };
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn dispatch(&self, event: NotificationEvent) {
        let Some(sink) = self.sink.clone() else {
            debug!("notification sink not configured, dropping {:?}", event.kind);
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = sink.deliver(&event).await {
                warn!(
                    "notification delivery failed for booking {}: {}",
                    event.booking_id, e
                );
            }
        });
    }
}

/// External credit ledger collaborator. Credit-only cancellations refund
/// nothing; the credited amount is handed off here instead.
#[derive(Clone)]
pub struct CreditLedgerClient {
    client: reqwest::Client,
    url: String,
}

impl CreditLedgerClient {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.credit_ledger_url.clone(),
        }
    }

    pub fn post_credit(&self, booking_id: Uuid, customer_id: Uuid, amount: f64) {
        if self.url.is_empty() {
            debug!("credit ledger not configured, dropping credit for booking {}", booking_id);
            return;
        }
        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            let body = serde_json::json!({
                "booking_id": booking_id,
                "customer_id": customer_id,
                "amount": amount,
            });
            match client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => warn!(
                    "credit ledger rejected entry for booking {}: {}",
                    booking_id,
                    response.status()
                ),
                Err(e) => warn!("credit ledger unreachable for booking {}: {}", booking_id, e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingSink(AtomicUsize);

    #[async_trait]
    impl NotificationSink for CountingSink {
        async fn deliver(&self, _event: &NotificationEvent) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn event() -> NotificationEvent {
        NotificationEvent {
            kind: NotificationKind::BookingCancelled,
            booking_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            detail: "cancelled".to_string(),
        }
    }

    #[tokio::test]
    async fn dispatch_reaches_the_sink() {
        let sink = Arc::new(CountingSink(AtomicUsize::new(0)));
        let notifier = Notifier {
            sink: Some(sink.clone()),
        };

        notifier.dispatch(event());
        tokio::task::yield_now().await;
        // Give the spawned task a moment to run.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(sink.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn webhook_sink_posts_event() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/notify"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sink = WebhookSink::new(format!("{}/notify", mock_server.uri()));
        sink.deliver(&event()).await.unwrap();
    }

    #[tokio::test]
    async fn disabled_notifier_is_a_no_op() {
        Notifier::disabled().dispatch(event());
    }
}
