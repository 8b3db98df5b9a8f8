//! Gateway event handler - direct messages and button clicks.

use crate::{
    bot::{BotData, render, user_key},
    core::InboundEvent,
    entities::UserId,
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;

/// Maps a direct message to a core event.
///
/// An image attachment wins over text, `/name args` is a command, and anything else
/// non-empty is text.
#[must_use]
pub fn inbound_from_message(
    user_id: UserId,
    content: &str,
    image_url: Option<String>,
) -> Option<InboundEvent> {
    if let Some(image_ref) = image_url {
        return Some(InboundEvent::Photo { user_id, image_ref });
    }
    let content = content.trim();
    if content.is_empty() {
        return None;
    }
    if let Some(command) = content.strip_prefix('/') {
        let (name, args) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
        if !name.is_empty() {
            return Some(InboundEvent::Command {
                user_id,
                name: name.to_string(),
                args: args.trim().to_string(),
            });
        }
    }
    Some(InboundEvent::Text {
        user_id,
        text: content.to_string(),
    })
}

fn first_image(message: &serenity::Message) -> Option<String> {
    message
        .attachments
        .iter()
        .find(|a| {
            a.content_type
                .as_deref()
                .is_some_and(|t| t.starts_with("image/"))
        })
        .map(|a| a.url.clone())
}

/// Routes gateway events to the dispatcher.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<()> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if new_message.author.bot || new_message.guild_id.is_some() {
                return Ok(());
            }
            let user_id = user_key(new_message.author.id)?;
            let Some(inbound) =
                inbound_from_message(user_id, &new_message.content, first_image(new_message))
            else {
                return Ok(());
            };

            let replies = data.dispatcher.handle(inbound).await?;
            for reply in &replies {
                new_message
                    .channel_id
                    .send_message(&ctx.http, render::message(reply))
                    .await?;
            }
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => {
            let Some(label) = render::label_from_custom_id(&component.data.custom_id) else {
                return Ok(());
            };
            // Lookups can outlast the three second acknowledgement window
            component.defer_ephemeral(&ctx.http).await?;

            let inbound = InboundEvent::Text {
                user_id: user_key(component.user.id)?,
                text: label.to_string(),
            };
            let replies = data.dispatcher.handle(inbound).await?;
            for reply in &replies {
                component
                    .create_followup(&ctx.http, render::followup(reply))
                    .await?;
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_wins_over_text() {
        let event = inbound_from_message(3, "caption", Some("https://cdn/x.png".to_string()));
        assert_eq!(
            event,
            Some(InboundEvent::Photo {
                user_id: 3,
                image_ref: "https://cdn/x.png".to_string()
            })
        );
    }

    #[test]
    fn test_slash_text_is_a_command() {
        assert_eq!(
            inbound_from_message(3, "/approve P1 100", None),
            Some(InboundEvent::Command {
                user_id: 3,
                name: "approve".to_string(),
                args: "P1 100".to_string()
            })
        );
        assert_eq!(
            inbound_from_message(3, "/start", None),
            Some(InboundEvent::Command {
                user_id: 3,
                name: "start".to_string(),
                args: String::new()
            })
        );
    }

    #[test]
    fn test_plain_and_empty_text() {
        assert_eq!(
            inbound_from_message(3, "  10 ", None),
            Some(InboundEvent::Text {
                user_id: 3,
                text: "10".to_string()
            })
        );
        assert_eq!(inbound_from_message(3, "   ", None), None);
        assert_eq!(
            inbound_from_message(3, "/", None),
            Some(InboundEvent::Text {
                user_id: 3,
                text: "/".to_string()
            })
        );
    }
}
