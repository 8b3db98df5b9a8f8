//! Outbound notifications to users other than the one being served.
//!
//! Notifications are fire-and-forget: each send is attempted once, failures are
//! logged and counted, and one failure never stops the rest of a batch.

use crate::{entities::UserId, errors::Result};
use async_trait::async_trait;

/// A message addressed to some user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Plain text
    Text {
        /// Recipient
        to: UserId,
        /// Body
        text: String,
    },
    /// An image previously received from a user, with a caption
    Photo {
        /// Recipient
        to: UserId,
        /// Transport reference of the image
        image_ref: String,
        /// Caption
        caption: String,
    },
}

impl Notification {
    /// Text notification
    pub fn text(to: UserId, text: impl Into<String>) -> Self {
        Self::Text {
            to,
            text: text.into(),
        }
    }

    /// Recipient of this notification
    #[must_use]
    pub const fn recipient(&self) -> UserId {
        match self {
            Self::Text { to, .. } | Self::Photo { to, .. } => *to,
        }
    }
}

/// Transport capable of delivering notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends text to `to`.
    async fn send_text(&self, to: UserId, text: &str) -> Result<()>;

    /// Sends an image with a caption to `to`.
    async fn send_photo(&self, to: UserId, image_ref: &str, caption: &str) -> Result<()>;
}

/// Tally of one delivery batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Messages accepted by the transport
    pub delivered: usize,
    /// Messages that failed
    pub failed: usize,
}

/// Sends every notification in order, isolating failures.
pub async fn deliver(notifier: &dyn Notifier, batch: Vec<Notification>) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for notification in batch {
        let to = notification.recipient();
        let sent = match &notification {
            Notification::Text { text, .. } => notifier.send_text(to, text).await,
            Notification::Photo {
                image_ref, caption, ..
            } => notifier.send_photo(to, image_ref, caption).await,
        };
        match sent {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(user_id = to, "Notification delivery failed: {e}");
            }
        }
    }
    if report.failed > 0 {
        tracing::info!(
            delivered = report.delivered,
            failed = report.failed,
            "Notification batch finished with failures"
        );
    }
    report
}
