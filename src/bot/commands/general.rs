//! General Discord commands - start, help, balance and code redemption.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, commands::forward},
        errors::{Error, Result},
    };

    /// Shows the main menu and cancels anything in progress.
    #[poise::command(slash_command)]
    pub async fn start(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        forward(ctx, "start", String::new()).await
    }

    /// Explains pricing, payments and code redemption.
    #[poise::command(slash_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        forward(ctx, "help", String::new()).await
    }

    /// Shows your credit balance.
    #[poise::command(slash_command)]
    pub async fn balance(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        forward(ctx, "balance", String::new()).await
    }

    /// Redeems a bonus code for credits.
    #[poise::command(slash_command)]
    pub async fn redeem(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Code in XXX-XXX-XXX format"] code: String,
    ) -> Result<()> {
        forward(ctx, "redeem", code).await
    }
}

// Re-export all commands
pub use inner::*;
