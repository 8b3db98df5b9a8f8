//! Direct-message delivery for core notifications.

use crate::{
    core::notify::Notifier,
    entities::UserId,
    errors::{Error, Result},
};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Sends notifications as Discord direct messages.
pub struct DiscordNotifier {
    http: Arc<serenity::Http>,
}

impl DiscordNotifier {
    /// Wraps an HTTP client authenticated with the bot token.
    #[must_use]
    pub const fn new(http: Arc<serenity::Http>) -> Self {
        Self { http }
    }

    async fn dm(&self, to: UserId, message: serenity::CreateMessage) -> Result<()> {
        let failed = |message: String| Error::Delivery {
            user_id: to,
            message,
        };
        let raw = u64::try_from(to)
            .ok()
            .filter(|id| *id != 0)
            .ok_or_else(|| failed("not a Discord user id".to_string()))?;

        let channel = serenity::UserId::new(raw)
            .create_dm_channel(&self.http)
            .await
            .map_err(|e| failed(e.to_string()))?;
        channel
            .send_message(&self.http, message)
            .await
            .map_err(|e| failed(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send_text(&self, to: UserId, text: &str) -> Result<()> {
        self.dm(
            to,
            serenity::CreateMessage::new().content(super::render::clip(text)),
        )
        .await
    }

    async fn send_photo(&self, to: UserId, image_ref: &str, caption: &str) -> Result<()> {
        let embed = serenity::CreateEmbed::new()
            .description(super::render::clip(caption))
            .image(image_ref);
        self.dm(to, serenity::CreateMessage::new().embed(embed)).await
    }
}
