//! Transactional email notifications.
//!
//! New-lead notifications go to the operations inbox through the provider's
//! HTTP API. Always fire-and-forget: the send runs on a spawned task and a
//! provider failure is logged, never surfaced to the request that captured
//! the lead.

use serde_json::json;

use crate::config::EmailConfig;
use crate::models::lead::Lead;

#[derive(Debug, Clone)]
pub struct Mailer {
    config: EmailConfig,
    client: reqwest::Client,
}

impl Mailer {
    pub fn new(config: EmailConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Spawn the new-lead notification. Returns immediately.
    pub fn notify_new_lead(&self, lead: &Lead) {
        if !self.config.enabled {
            tracing::debug!(lead_id = %lead.id, "email disabled, skipping lead notification");
            return;
        }

        let mailer = self.clone();
        let lead = lead.clone();
        tokio::spawn(async move {
            if let Err(err) = mailer.send_lead_notification(&lead).await {
                tracing::warn!(lead_id = %lead.id, error = %err, "lead notification failed");
            }
        });
    }

    async fn send_lead_notification(&self, lead: &Lead) -> Result<(), reqwest::Error> {
        let (subject, body) = lead_template(lead);

        let mut payload = json!({
            "from": self.config.from_address,
            "to": [self.config.notify_address],
            "subject": subject,
            "text": body,
        });
        if let Some(reply_to) = &self.config.reply_to {
            payload["reply_to"] = json!(reply_to);
        }

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;

        tracing::info!(lead_id = %lead.id, status = %response.status(), "lead notification sent");
        Ok(())
    }
}

/// Bilingual subject and body. The lead's own locale picks the template so
/// staff see the message in the language the visitor wrote in.
fn lead_template(lead: &Lead) -> (String, String) {
    let phone = lead.phone.as_deref().unwrap_or("-");
    match lead.locale.as_str() {
        "es" => (
            format!("Nuevo contacto de {} ({})", lead.name, lead.source_site),
            format!(
                "Nuevo mensaje de contacto\n\nNombre: {}\nEmail: {}\nTeléfono: {}\nSitio: {}\n\nMensaje:\n{}\n",
                lead.name, lead.email, phone, lead.source_site, lead.message
            ),
        ),
        _ => (
            format!("New lead from {} ({})", lead.name, lead.source_site),
            format!(
                "New contact message\n\nName: {}\nEmail: {}\nPhone: {}\nSite: {}\n\nMessage:\n{}\n",
                lead.name, lead.email, phone, lead.source_site, lead.message
            ),
        ),
    }
}
