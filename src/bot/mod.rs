//! Bot layer - Discord-specific interface and command handlers
//!
//! This module binds the dispatcher to Discord: slash commands, direct messages and
//! button clicks come in as core events; replies go back as messages with button
//! rows, and notifications go out as direct messages.

/// Discord slash command implementations (general, admin)
pub mod commands;
/// Discord gateway event handlers (direct messages, button clicks)
pub mod handlers;
/// Direct-message notifier
pub mod notifier;
/// Reply to Discord message conversion
pub mod render;

use crate::{
    config::AppConfig,
    core::Dispatcher,
    entities::UserId,
    errors::{Error, Result},
    lookup::{HttpLookup, RecordLookup},
};
use notifier::DiscordNotifier;
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{info, instrument};

/// Shared data available to all bot commands.
/// This structure holds the dispatcher, which owns the database connection,
/// configuration and conversation sessions.
pub struct BotData {
    /// Routes every inbound event
    pub dispatcher: Arc<Dispatcher>,
}

impl BotData {
    /// Creates a new `BotData` instance around a dispatcher.
    #[must_use]
    pub const fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }
}

/// Converts a Discord user id into the key used by the ledger.
pub fn user_key(id: serenity::UserId) -> Result<UserId> {
    UserId::try_from(id.get()).map_err(|_| Error::InvalidInput {
        message: format!("user id {id} is out of range"),
    })
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            tracing::error!("Failed to start bot: {error}");
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            tracing::error!("Error in command `{}`: {:?}", ctx.command().name, error);
            if let Err(e) = ctx
                .say("⚠️ Something went wrong. Please try again later.")
                .await
            {
                tracing::error!("Failed to send error message: {}", e);
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            tracing::error!("Error handling {}: {error}", event.snake_case_name());
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                tracing::error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Builds the dispatcher and runs the Discord client until it stops.
#[instrument(skip(token, config, db))]
pub async fn run_bot(token: String, config: AppConfig, db: DatabaseConnection) -> Result<()> {
    let http = Arc::new(serenity::Http::new(&token));
    let lookup: Arc<dyn RecordLookup> = Arc::new(HttpLookup::new(&config.lookup)?);
    let notifier = Arc::new(DiscordNotifier::new(Arc::clone(&http)));
    let dispatcher = Arc::new(Dispatcher::new(db, config, lookup, notifier));

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::events::event_handler(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            ..Default::default()
        })
        .setup(|ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(BotData::new(dispatcher))
            })
        })
        .build();

    // Direct messages need their content to drive the menus
    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::Client::builder(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| tracing::error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| tracing::error!("Client error: {:?}", e))?;
    Ok(())
}
