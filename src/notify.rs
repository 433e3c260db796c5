//! Outbound notifications. Delivery happens after a transition has been
//! committed and its failure never undoes the transition.

use async_trait::async_trait;
use uuid::Uuid;

use crate::store::OrderStore;

/// A message for one party, addressed by user id until delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub recipient: Uuid,
    pub subject: String,
    pub body: String,
}

impl Notice {
    pub fn new(recipient: Uuid, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient_address: &str, subject: &str, body: &str)
    -> anyhow::Result<()>;
}

/// Writes notifications to the log instead of sending them anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        recipient_address: &str,
        subject: &str,
        body: &str,
    ) -> anyhow::Result<()> {
        tracing::info!(to = %recipient_address, subject = %subject, body = %body, "notification");
        Ok(())
    }
}

/// Best-effort delivery. Failures are logged and swallowed.
pub async fn deliver(store: &dyn OrderStore, notifier: &dyn Notifier, notices: &[Notice]) {
    for notice in notices {
        let address = match store.contact_address(notice.recipient).await {
            Ok(Some(address)) => address,
            Ok(None) => {
                tracing::warn!(
                    user_id = %notice.recipient,
                    subject = %notice.subject,
                    "no contact address, notification dropped"
                );
                continue;
            }
            Err(err) => {
                tracing::warn!(error = %err, user_id = %notice.recipient, "contact lookup failed");
                continue;
            }
        };

        if let Err(err) = notifier
            .notify(&address, &notice.subject, &notice.body)
            .await
        {
            tracing::warn!(
                error = %err,
                to = %address,
                subject = %notice.subject,
                "notification failed"
            );
        }
    }
}
