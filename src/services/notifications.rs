use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub(crate) enum NotificationEvent {
    TestPublished {
        test_id: String,
        course_id: String,
        title: String,
    },
    AttemptGraded {
        attempt_id: String,
        test_id: String,
        student_id: String,
        score: Option<Decimal>,
        max_score: Option<Decimal>,
        percentage: Option<Decimal>,
        passed: Option<bool>,
    },
}

impl NotificationEvent {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            NotificationEvent::TestPublished { .. } => "test_published",
            NotificationEvent::AttemptGraded { .. } => "attempt_graded",
        }
    }
}

#[async_trait]
pub(crate) trait Notifier: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()>;
}

pub(crate) struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        tracing::debug!(event = event.name(), "Notifications disabled; event dropped");
        Ok(())
    }
}

/// POSTs every event as JSON to a single endpoint.
pub(crate) struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub(crate) fn new(url: String, timeout_seconds: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .with_context(|| format!("Failed to deliver {} webhook", event.name()))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Webhook for {} returned HTTP {status}", event.name());
        }
        Ok(())
    }
}

/// Fire and forget: runs on a detached task, failures are only logged.
pub(crate) fn dispatch(notifier: Arc<dyn Notifier>, event: NotificationEvent) {
    tokio::spawn(async move {
        if let Err(err) = notifier.notify(&event).await {
            tracing::warn!(event = event.name(), error = %err, "Notification delivery failed");
        }
    });
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Captures events; optionally fails every delivery.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub(crate) events: Mutex<Vec<NotificationEvent>>,
        pub(crate) fail: bool,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: &NotificationEvent) -> anyhow::Result<()> {
            self.events.lock().expect("events lock").push(event.clone());
            if self.fail {
                anyhow::bail!("delivery refused");
            }
            Ok(())
        }
    }
}
