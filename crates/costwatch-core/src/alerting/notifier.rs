//! Alert notification channels
//!
//! Each channel implements [`Notifier`]; the [`AlertDispatcher`] routes
//! triggered alerts to the channels their rules name. Notification failures
//! are logged and counted, never fatal.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, warn};

use crate::config::{EmailConfig, NotificationsConfig, SlackConfig};
use crate::error::{Error, Result};
use crate::models::TriggeredAlert;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A delivery channel for triggered alerts
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// The channel identifier rules refer to (e.g., "slack")
    fn channel(&self) -> &str;

    /// Deliver one alert
    async fn notify(&self, alert: &TriggeredAlert) -> Result<()>;
}

fn describe(alert: &TriggeredAlert) -> String {
    format!(
        "Cost alert '{}' ({:?}): actual {} exceeds threshold {} by {} ({}%)",
        alert.rule,
        alert.period,
        alert.actual,
        alert.threshold,
        alert.overage,
        alert.overage_pct,
    )
}

/// Slack incoming-webhook channel
pub struct SlackNotifier {
    webhook_url: String,
    channel_override: Option<String>,
    client: reqwest::Client,
}

impl SlackNotifier {
    /// Create a notifier from its config section
    pub fn new(config: &SlackConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            webhook_url: config.webhook_url.clone(),
            channel_override: config.channel.clone(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    fn channel(&self) -> &str {
        "slack"
    }

    async fn notify(&self, alert: &TriggeredAlert) -> Result<()> {
        let mut payload = serde_json::json!({ "text": describe(alert) });
        if let Some(channel) = &self.channel_override {
            payload["channel"] = serde_json::Value::String(channel.clone());
        }

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notification(format!("slack webhook: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Notification(format!(
                "slack webhook returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// SMTP email channel (STARTTLS)
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl EmailNotifier {
    /// Create a notifier from its config section
    ///
    /// Address parsing happens here so malformed config fails at startup,
    /// not on the first alert.
    pub fn new(config: &EmailConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| Error::Notification(format!("smtp relay: {e}")))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        let from = config
            .from
            .parse()
            .map_err(|e| Error::config(format!("notifications.email.from: {e}")))?;
        let to = config
            .to
            .iter()
            .map(|addr| {
                addr.parse()
                    .map_err(|e| Error::config(format!("notifications.email.to '{addr}': {e}")))
            })
            .collect::<Result<Vec<Mailbox>>>()?;

        Ok(Self {
            transport,
            from,
            to,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for EmailNotifier {
    fn channel(&self) -> &str {
        "email"
    }

    async fn notify(&self, alert: &TriggeredAlert) -> Result<()> {
        for recipient in &self.to {
            let message = Message::builder()
                .from(self.from.clone())
                .to(recipient.clone())
                .subject(format!("Cloud Cost Alert: {}", alert.rule))
                .body(describe(alert))
                .map_err(|e| Error::Notification(format!("email build: {e}")))?;

            self.transport
                .send(message)
                .await
                .map_err(|e| Error::Notification(format!("email send: {e}")))?;
        }
        Ok(())
    }
}

/// Routes triggered alerts to their configured channels
#[derive(Default)]
pub struct AlertDispatcher {
    notifiers: HashMap<String, Arc<dyn Notifier>>,
}

impl AlertDispatcher {
    /// Build a dispatcher with every configured channel
    pub fn from_config(config: &NotificationsConfig) -> Result<Self> {
        let mut dispatcher = Self::default();
        if let Some(slack) = &config.slack {
            dispatcher.register(Arc::new(SlackNotifier::new(slack)));
        }
        if let Some(email) = &config.email {
            dispatcher.register(Arc::new(EmailNotifier::new(email)?));
        }
        Ok(dispatcher)
    }

    /// Register a channel; later registrations with the same name win
    pub fn register(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers
            .insert(notifier.channel().to_string(), notifier);
    }

    /// Deliver each alert to each of its channels
    ///
    /// Returns the number of failed deliveries. Failures are logged; an
    /// alert naming a channel with no registered notifier counts as failed.
    pub async fn dispatch(&self, alerts: &[TriggeredAlert]) -> usize {
        let mut failures = 0;
        for alert in alerts {
            for channel in &alert.channels {
                match self.notifiers.get(channel) {
                    Some(notifier) => match notifier.notify(alert).await {
                        Ok(()) => {
                            info!(rule = %alert.rule, channel = %channel, "alert delivered");
                        }
                        Err(err) => {
                            warn!(rule = %alert.rule, channel = %channel, error = %err, "alert delivery failed");
                            failures += 1;
                        }
                    },
                    None => {
                        warn!(rule = %alert.rule, channel = %channel, "no notifier for channel");
                        failures += 1;
                    }
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AlertPeriod;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert(channels: &[&str]) -> TriggeredAlert {
        TriggeredAlert {
            rule: "daily_cost_high".to_string(),
            period: AlertPeriod::Daily,
            threshold: dec!(700),
            actual: dec!(800),
            overage: dec!(100),
            overage_pct: dec!(14.29),
            channels: channels.iter().map(|c| c.to_string()).collect(),
            triggered_at: Utc::now(),
        }
    }

    struct RecordingNotifier {
        name: &'static str,
        delivered: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        fn channel(&self) -> &str {
            self.name
        }

        async fn notify(&self, _alert: &TriggeredAlert) -> Result<()> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Notification("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn slack_posts_alert_text_to_webhook() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/T0/B0/hook"))
            .and(body_string_contains("daily_cost_high"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(&SlackConfig {
            webhook_url: format!("{}/services/T0/B0/hook", server.uri()),
            channel: None,
        });
        notifier.notify(&alert(&["slack"])).await.unwrap();
    }

    #[tokio::test]
    async fn slack_failure_surfaces_as_notification_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new(&SlackConfig {
            webhook_url: server.uri(),
            channel: None,
        });
        let err = notifier.notify(&alert(&["slack"])).await.unwrap_err();
        assert!(matches!(err, Error::Notification(_)));
    }

    #[tokio::test]
    async fn dispatcher_routes_only_named_channels() {
        let slack = Arc::new(RecordingNotifier {
            name: "slack",
            delivered: AtomicUsize::new(0),
            fail: false,
        });
        let email = Arc::new(RecordingNotifier {
            name: "email",
            delivered: AtomicUsize::new(0),
            fail: false,
        });

        let mut dispatcher = AlertDispatcher::default();
        dispatcher.register(slack.clone());
        dispatcher.register(email.clone());

        let failures = dispatcher.dispatch(&[alert(&["slack"])]).await;
        assert_eq!(failures, 0);
        assert_eq!(slack.delivered.load(Ordering::SeqCst), 1);
        assert_eq!(email.delivered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_channel_failing_does_not_stop_the_other() {
        let failing = Arc::new(RecordingNotifier {
            name: "slack",
            delivered: AtomicUsize::new(0),
            fail: true,
        });
        let working = Arc::new(RecordingNotifier {
            name: "email",
            delivered: AtomicUsize::new(0),
            fail: false,
        });

        let mut dispatcher = AlertDispatcher::default();
        dispatcher.register(failing.clone());
        dispatcher.register(working.clone());

        let failures = dispatcher.dispatch(&[alert(&["slack", "email"])]).await;
        assert_eq!(failures, 1);
        assert_eq!(working.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_channel_counts_as_a_failure() {
        let dispatcher = AlertDispatcher::default();
        let failures = dispatcher.dispatch(&[alert(&["pager"])]).await;
        assert_eq!(failures, 1);
    }
}
