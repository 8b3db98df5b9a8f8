//! Rendering of core replies as Discord messages.
//!
//! Keyboards become rows of buttons. Each button's custom id carries its label, and
//! a click is fed back to the dispatcher as if the user had typed that label.

use crate::core::replies::{Keyboard, Reply};
use poise::serenity_prelude as serenity;

/// Prefix of every keyboard button's custom id.
pub const BUTTON_PREFIX: &str = "menu:";

/// Discord's message length limit.
const MAX_CONTENT_CHARS: usize = 2000;

/// Cuts `text` to what Discord accepts in one message.
#[must_use]
pub fn clip(text: &str) -> String {
    if text.chars().count() <= MAX_CONTENT_CHARS {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(MAX_CONTENT_CHARS - 1).collect();
    clipped.push('…');
    clipped
}

/// Label carried by a keyboard button's custom id.
#[must_use]
pub fn label_from_custom_id(custom_id: &str) -> Option<&str> {
    custom_id
        .strip_prefix(BUTTON_PREFIX)
        .filter(|label| !label.is_empty())
}

/// Button rows for `keyboard`.
#[must_use]
pub fn components(keyboard: Option<Keyboard>) -> Vec<serenity::CreateActionRow> {
    keyboard
        .map(|k| {
            k.rows()
                .into_iter()
                .map(|row| {
                    serenity::CreateActionRow::Buttons(
                        row.into_iter()
                            .map(|label| {
                                serenity::CreateButton::new(format!("{BUTTON_PREFIX}{label}"))
                                    .label(label)
                                    .style(serenity::ButtonStyle::Secondary)
                            })
                            .collect(),
                    )
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Plain channel message.
#[must_use]
pub fn message(reply: &Reply) -> serenity::CreateMessage {
    serenity::CreateMessage::new()
        .content(clip(&reply.text))
        .components(components(reply.keyboard))
}

/// Slash command response, visible only to the caller.
#[must_use]
pub fn command_reply(reply: &Reply) -> poise::CreateReply {
    poise::CreateReply::default()
        .content(clip(&reply.text))
        .components(components(reply.keyboard))
        .ephemeral(true)
}

/// Follow-up to a deferred button click.
#[must_use]
pub fn followup(reply: &Reply) -> serenity::CreateInteractionResponseFollowup {
    serenity::CreateInteractionResponseFollowup::new()
        .content(clip(&reply.text))
        .components(components(reply.keyboard))
        .ephemeral(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::replies::labels;

    #[test]
    fn test_label_round_trip() {
        let id = format!("{BUTTON_PREFIX}{}", labels::CONFIRM_AMOUNT);
        assert_eq!(label_from_custom_id(&id), Some(labels::CONFIRM_AMOUNT));
        assert_eq!(label_from_custom_id("menu:"), None);
        assert_eq!(label_from_custom_id("other:x"), None);
    }

    #[test]
    fn test_components_follow_keyboard_rows() {
        assert!(components(None).is_empty());
        assert_eq!(components(Some(Keyboard::Main { admin: true })).len(), 4);
        assert_eq!(components(Some(Keyboard::Back)).len(), 1);
    }

    #[test]
    fn test_clip_long_text() {
        let long = "x".repeat(MAX_CONTENT_CHARS + 10);
        let clipped = clip(&long);
        assert_eq!(clipped.chars().count(), MAX_CONTENT_CHARS);
        assert!(clipped.ends_with('…'));
        assert_eq!(clip("short"), "short");
    }
}
