use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};

use shared_config::AppConfig;

use crate::models::ContentNotice;

/// Delivery seam for "new content" mail-outs.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &ContentNotice, recipients: &[String]) -> Result<()>;
}

/// Records notices in the log only. Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &ContentNotice, recipients: &[String]) -> Result<()> {
        info!(
            "New {} '{}' ({}) for {} subscribers",
            notice.kind,
            notice.item.title,
            notice.item.id,
            recipients.len()
        );
        Ok(())
    }
}

/// Posts each notice to an external mailer endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notice: &ContentNotice, recipients: &[String]) -> Result<()> {
        debug!("Posting {} notice {} to {}", notice.kind, notice.item.id, self.url);

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(&json!({
                "kind": notice.kind,
                "item": notice.item,
                "recipients": recipients,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Notification webhook failed: {} - {}", status, body);
            bail!("notification webhook returned HTTP {}: {}", status, body);
        }

        info!("Delivered {} notice {} to {} recipients", notice.kind, notice.item.id, recipients.len());
        Ok(())
    }
}

pub fn notifier_from_config(config: &AppConfig) -> Arc<dyn Notifier> {
    if config.is_notification_webhook_configured() {
        Arc::new(WebhookNotifier::new(config.notification_webhook_url.clone()))
    } else {
        Arc::new(LogNotifier)
    }
}
