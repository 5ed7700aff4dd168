//! Chat notifications for completed promotions.
//!
//! Delivery is best effort: a failed webhook is logged and never changes the
//! outcome of the run.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{PromoterError, Result};
use crate::executor::PromotionResult;
use crate::obs;

/// Environment variable holding the Slack incoming-webhook URL.
pub const WEBHOOK_ENV: &str = "SLACK_WEBHOOK";

const FOOTER: &str = ":monkey_face: This message brought to you by munki-promoter.";

/// Something that can report promoted packages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, ring: &str, results: &[PromotionResult]) -> Result<()>;
}

/// Read the webhook URL from the environment, warning when it is unset.
pub fn webhook_from_env() -> Option<String> {
    match std::env::var(WEBHOOK_ENV) {
        Ok(url) if !url.trim().is_empty() => Some(url),
        _ => {
            warn!(
                "The '{}' environment variable is undefined. Webhooks will not be sent.",
                WEBHOOK_ENV
            );
            None
        }
    }
}

/// Slack Block Kit payload listing `name - version` lines sorted by name.
pub fn build_slack_blocks(ring: &str, results: &[PromotionResult]) -> Value {
    let mut sorted: Vec<&PromotionResult> = results.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let lines = sorted
        .iter()
        .map(|r| format!("{} - {}", r.name, r.version))
        .collect::<Vec<_>>()
        .join("\n");

    json!({
        "blocks": [
            {
                "type": "header",
                "text": {
                    "type": "plain_text",
                    "text": format!("New items automatically promoted to Munki {ring} catalog!"),
                }
            },
            { "type": "divider" },
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": lines }
            },
            {
                "type": "context",
                "elements": [ { "type": "mrkdwn", "text": FOOTER } ]
            }
        ]
    })
}

/// Posts promotion summaries to a Slack incoming webhook.
pub struct SlackWebhookNotifier {
    url: String,
    http_client: reqwest::Client,
}

impl SlackWebhookNotifier {
    pub fn new(url: &str) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("munki-promoter/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            url: url.to_string(),
            http_client,
        })
    }
}

#[async_trait]
impl Notifier for SlackWebhookNotifier {
    async fn notify(&self, ring: &str, results: &[PromotionResult]) -> Result<()> {
        let payload = build_slack_blocks(ring, results);
        debug!(ring = %ring, items = results.len(), "posting webhook");

        let response = self.http_client.post(&self.url).json(&payload).send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(PromoterError::Notify(format!(
                "HTTP response {} when sending the webhook",
                status.as_u16()
            )))
        }
    }
}

/// Send a summary if there is anything to report. Returns whether a message
/// was delivered; failures are logged only.
pub async fn deliver(notifier: &dyn Notifier, ring: &str, results: &[PromotionResult]) -> bool {
    if results.is_empty() {
        return false;
    }
    match notifier.notify(ring, results).await {
        Ok(()) => {
            obs::emit_notify_sent(ring, results.len());
            true
        }
        Err(e) => {
            obs::emit_notify_failed(ring, &e);
            false
        }
    }
}
