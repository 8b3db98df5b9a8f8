//! Admin Discord commands - payment review, user management, codes and broadcasts.
//!
//! Authorization happens in the dispatcher; these commands only shape arguments.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, commands::forward},
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;

    /// Approves a pending payment and credits its submitter.
    #[poise::command(slash_command)]
    pub async fn approve(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Payment ID"] payment_id: String,
        #[description = "Credits to add"] credits: i64,
    ) -> Result<()> {
        forward(ctx, "approve", format!("{payment_id} {credits}")).await
    }

    /// Rejects a pending payment.
    #[poise::command(slash_command)]
    pub async fn reject(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Payment ID"] payment_id: String,
    ) -> Result<()> {
        forward(ctx, "reject", payment_id).await
    }

    /// Adds credits to a user.
    #[poise::command(slash_command)]
    pub async fn add(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "User to credit"] user: serenity::User,
        #[description = "Credits to add"] credits: i64,
    ) -> Result<()> {
        forward(ctx, "add", format!("{} {credits}", user.id.get())).await
    }

    /// Blocks a user from the bot.
    #[poise::command(slash_command)]
    pub async fn block(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "User to block"] user: serenity::User,
    ) -> Result<()> {
        forward(ctx, "block", user.id.get().to_string()).await
    }

    /// Lifts a block.
    #[poise::command(slash_command)]
    pub async fn unblock(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "User to unblock"] user: serenity::User,
    ) -> Result<()> {
        forward(ctx, "unblock", user.id.get().to_string()).await
    }

    /// Counts users, pending payments and codes.
    #[poise::command(slash_command)]
    pub async fn users(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        forward(ctx, "users", String::new()).await
    }

    /// Generates single-use bonus codes.
    #[poise::command(slash_command, rename = "gen")]
    pub async fn generate_codes(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Number of codes"] count: u32,
        #[description = "Credits per code"] credits: i64,
    ) -> Result<()> {
        forward(ctx, "gen", format!("{count} {credits}")).await
    }

    /// Lists payments awaiting review.
    #[poise::command(slash_command)]
    pub async fn pending(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        forward(ctx, "pending", String::new()).await
    }

    /// Shows bot statistics.
    #[poise::command(slash_command)]
    pub async fn stats(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        forward(ctx, "stats", String::new()).await
    }

    /// Lists active and redeemed codes.
    #[poise::command(slash_command)]
    pub async fn codes(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        forward(ctx, "codes", String::new()).await
    }

    /// Sends a message to every known user.
    #[poise::command(slash_command)]
    pub async fn broadcast(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Message to send"] message: String,
    ) -> Result<()> {
        forward(ctx, "broadcast", message).await
    }
}

// Re-export all commands
pub use inner::*;
