use std::sync::Arc;

use sqlx::PgPool;

use crate::core::config::Settings;
use crate::services::notifications::{NoopNotifier, Notifier, WebhookNotifier};

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    db: PgPool,
    notifier: Arc<dyn Notifier>,
}

impl AppState {
    pub(crate) fn new(settings: Settings, db: PgPool, notifier: Arc<dyn Notifier>) -> Self {
        Self { inner: Arc::new(InnerState { settings, db, notifier }) }
    }

    /// Builds state with the notifier selected by `NOTIFY_WEBHOOK_URL`.
    pub(crate) fn from_settings(settings: Settings, db: PgPool) -> anyhow::Result<Self> {
        let notifier: Arc<dyn Notifier> = match settings.notifications().webhook_url.clone() {
            Some(url) => {
                tracing::info!(url = %url, "Webhook notifications enabled");
                Arc::new(WebhookNotifier::new(url, settings.notifications().timeout_seconds)?)
            }
            None => Arc::new(NoopNotifier),
        };
        Ok(Self::new(settings, db, notifier))
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn db(&self) -> &PgPool {
        &self.inner.db
    }

    pub(crate) fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.inner.notifier)
    }
}
