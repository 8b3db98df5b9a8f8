//! Discord slash commands organized by audience.
//!
//! Every command forwards to the dispatcher as a command event, so slash commands,
//! typed `/name args` messages and button clicks share one code path.

#![allow(clippy::too_long_first_doc_paragraph)]

/// Admin-only commands
pub mod admin;

/// Commands available to every user
pub mod general;

use crate::{
    bot::{BotData, render, user_key},
    core::InboundEvent,
    errors::{Error, Result},
};

// Export commands
pub use admin::*;
pub use general::*;

/// Sends a command event for the caller and posts the replies.
pub(crate) async fn forward(
    ctx: poise::Context<'_, BotData, Error>,
    name: &str,
    args: String,
) -> Result<()> {
    ctx.defer_ephemeral().await?;
    let event = InboundEvent::Command {
        user_id: user_key(ctx.author().id)?,
        name: name.to_string(),
        args,
    };
    for reply in ctx.data().dispatcher.handle(event).await? {
        ctx.send(render::command_reply(&reply)).await?;
    }
    Ok(())
}

/// Every slash command the bot registers.
#[must_use]
pub fn all() -> Vec<poise::Command<BotData, Error>> {
    vec![
        start(),
        help(),
        balance(),
        redeem(),
        approve(),
        reject(),
        add(),
        block(),
        unblock(),
        users(),
        generate_codes(),
        pending(),
        stats(),
        codes(),
        broadcast(),
    ]
}
