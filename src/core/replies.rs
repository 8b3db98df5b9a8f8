//! Outbound reply text and keyboard layouts.
//!
//! Everything the bot says lives here so the dispatcher and the transport share one
//! vocabulary. Keyboard labels double as control inputs: a button press arrives as a
//! text message carrying its label.

use crate::{
    config::AppConfig,
    core::{admin::Stats, codes::CodeOverview, conversation::Prompt, payments::ReviewOutcome},
    entities::{CodeModel, PaymentModel, UserModel},
    errors::Error,
};
use std::fmt::Write;

/// Button labels.
pub mod labels {
    /// Start a paid lookup
    pub const LOOKUP: &str = "🔍 Vehicle Lookup";
    /// Show price and payment instructions
    pub const BUY_CREDITS: &str = "💳 Buy Credits";
    /// Show balance
    pub const BALANCE: &str = "📊 My Balance";
    /// Show profile
    pub const PROFILE: &str = "👤 Profile";
    /// Show help
    pub const HELP: &str = "ℹ️ Help";
    /// Open the admin panel
    pub const ADMIN_PANEL: &str = "⚙️ Admin Panel";
    /// Abort whatever is in progress
    pub const BACK: &str = "⬅️ Back to Menu";
    /// Begin the purchase submission
    pub const PAYMENT_DONE: &str = "✅ Payment Done";
    /// Accept the entered amount
    pub const CONFIRM_AMOUNT: &str = "✅ Confirm Amount";
    /// Re-enter the amount
    pub const CHANGE_AMOUNT: &str = "✏️ Change Amount";
    /// Accept the uploaded screenshot
    pub const CONFIRM_SCREENSHOT: &str = "✅ Confirm Screenshot";
    /// Upload a different screenshot
    pub const REUPLOAD_SCREENSHOT: &str = "📤 Re-upload Screenshot";
    /// Accept the entered reference and submit
    pub const CONFIRM_REFERENCE: &str = "✅ Confirm Reference";
    /// Re-enter the reference
    pub const CHANGE_REFERENCE: &str = "✏️ Change Reference";
    /// Admin: list pending payments
    pub const PENDING_PAYMENTS: &str = "📬 Pending Payments";
    /// Admin: show stats
    pub const STATS: &str = "📈 Stats";
    /// Admin: code generation help
    pub const GENERATE_CODES: &str = "🎫 Generate Codes";
    /// Admin: list codes
    pub const VIEW_CODES: &str = "📋 View Codes";
}

/// Button layout attached to a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    /// Main menu; admins get an extra row
    Main {
        /// Whether to show the admin row
        admin: bool,
    },
    /// Only the back button
    Back,
    /// Buy screen
    BuyMain,
    /// Amount confirmation
    AmountConfirm,
    /// Screenshot upload and confirmation
    ScreenshotConfirm,
    /// Reference confirmation
    ReferenceConfirm,
    /// Admin panel
    Admin,
}

impl Keyboard {
    /// Rows of button labels, top to bottom.
    #[must_use]
    #[allow(clippy::wildcard_imports)]
    pub fn rows(self) -> Vec<Vec<&'static str>> {
        use labels::*;
        match self {
            Self::Main { admin } => {
                let mut rows = vec![vec![LOOKUP, BUY_CREDITS], vec![BALANCE, PROFILE], vec![HELP]];
                if admin {
                    rows.push(vec![ADMIN_PANEL]);
                }
                rows
            }
            Self::Back => vec![vec![BACK]],
            Self::BuyMain => vec![vec![PAYMENT_DONE], vec![BACK]],
            Self::AmountConfirm => vec![vec![CONFIRM_AMOUNT], vec![CHANGE_AMOUNT], vec![BACK]],
            Self::ScreenshotConfirm => vec![
                vec![CONFIRM_SCREENSHOT],
                vec![REUPLOAD_SCREENSHOT],
                vec![BACK],
            ],
            Self::ReferenceConfirm => vec![
                vec![CONFIRM_REFERENCE],
                vec![CHANGE_REFERENCE],
                vec![BACK],
            ],
            Self::Admin => vec![
                vec![PENDING_PAYMENTS, STATS],
                vec![GENERATE_CODES, VIEW_CODES],
                vec![BACK],
            ],
        }
    }
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Message body
    pub text: String,
    /// Optional buttons
    pub keyboard: Option<Keyboard>,
}

impl Reply {
    /// Reply with buttons
    pub fn new(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    /// Reply without buttons
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }
}

/// Shows whole amounts without a fractional part.
#[must_use]
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 && amount.abs() < 1e15 {
        format!("{amount:.0}")
    } else {
        amount.to_string()
    }
}

const fn main_menu(admin: bool) -> Keyboard {
    Keyboard::Main { admin }
}

/// Renders a conversation prompt.
#[must_use]
pub fn prompt(prompt: &Prompt, admin: bool) -> Reply {
    match prompt {
        Prompt::AskAmount => Reply::new(
            "🔢 Enter the amount you paid (numbers only, e.g., 10):",
            Keyboard::Back,
        ),
        Prompt::ChangeAmount => Reply::new("✏️ Enter new amount (in ₹):", Keyboard::Back),
        Prompt::InvalidAmount => Reply::new(
            "❌ Enter a positive amount in numbers only (e.g., 10).",
            Keyboard::Back,
        ),
        Prompt::ConfirmAmount { amount } => Reply::new(
            format!(
                "💰 You entered: ₹{}\nConfirm this amount?",
                format_amount(*amount)
            ),
            Keyboard::AmountConfirm,
        ),
        Prompt::AskScreenshot => Reply::new(
            "📷 Please upload your payment screenshot as a photo.",
            Keyboard::ScreenshotConfirm,
        ),
        Prompt::ScreenshotRequired => Reply::new(
            "📷 Send the screenshot as a photo. Or tap Back.",
            Keyboard::ScreenshotConfirm,
        ),
        Prompt::ConfirmScreenshot => Reply::new(
            "✅ Screenshot received.\nConfirm or re-upload?",
            Keyboard::ScreenshotConfirm,
        ),
        Prompt::AskReference => Reply::new(
            "🔑 Now enter your UTR / Transaction ID:",
            Keyboard::Back,
        ),
        Prompt::InvalidReference { min_len } => Reply::new(
            format!("❌ Enter a valid UTR / Transaction ID (at least {min_len} characters)."),
            Keyboard::Back,
        ),
        Prompt::ConfirmReference { reference } => Reply::new(
            format!("🔎 You entered UTR: {reference}\nConfirm?"),
            Keyboard::ReferenceConfirm,
        ),
        Prompt::AskQuery => Reply::new(
            "📮 Send RC number (e.g., BR29AB7794):",
            Keyboard::Back,
        ),
        Prompt::InvalidQuery => Reply::new("❌ Please enter a valid RC number.", Keyboard::Back),
        Prompt::BackToMenu => Reply::new("🏠 Back to main menu.", main_menu(admin)),
    }
}

/// Greeting for `/start`.
#[must_use]
pub fn welcome(admin: bool) -> Reply {
    Reply::new("👋 Welcome to OSINT Vehicle Bot!", main_menu(admin))
}

/// Sent to blocked users for every event.
#[must_use]
pub fn blocked() -> Reply {
    Reply::plain("🚫 You are blocked from using this bot.")
}

/// Help text.
#[must_use]
pub fn help(config: &AppConfig, admin: bool) -> Reply {
    Reply::new(
        format!(
            "ℹ️ Help\n\n\
             - Each search costs {} credits.\n\
             - Buy credits via {} (send screenshot & UTR).\n\
             - Use /redeem CODE to redeem gift codes.\n\
             - Admin reviews payments within 10–25 minutes.\n\n\
             UPI: {}\nQR message: {}",
            config.lookup.cost,
            labels::BUY_CREDITS,
            config.payments.payment_address,
            config.payments.qr_link,
        ),
        main_menu(admin),
    )
}

/// Price and payment instructions.
#[must_use]
pub fn buy_info(config: &AppConfig) -> Reply {
    Reply::new(
        format!(
            "💳 Buy Credits\n\n{}\n\n📌 UPI ID: {}\n🖼️ QR Code post: {}\n\nAfter paying, tap '{}'.",
            config.payments.price_text,
            config.payments.payment_address,
            config.payments.qr_link,
            labels::PAYMENT_DONE,
        ),
        Keyboard::BuyMain,
    )
}

/// Balance line.
#[must_use]
pub fn balance(credits: i64, admin: bool) -> Reply {
    Reply::new(format!("💰 Credits: {credits}"), main_menu(admin))
}

/// Profile card.
#[must_use]
pub fn profile(user: &UserModel, admin: bool) -> Reply {
    Reply::new(
        format!(
            "👤 Your Profile\n• User ID: {}\n• Credits: {}\n• Total Searches: {}",
            user.id, user.credits, user.lookups
        ),
        main_menu(admin),
    )
}

/// Balance too low to look anything up.
#[must_use]
pub fn not_enough_credits(config: &AppConfig, balance: i64, admin: bool) -> Reply {
    Reply::new(
        format!(
            "⚠️ Not enough credits! You have {balance}, each search costs {}.\n\n{}\n\nGo to {}.",
            config.lookup.cost,
            config.payments.price_text,
            labels::BUY_CREDITS,
        ),
        main_menu(admin),
    )
}

/// Successful lookup result.
#[must_use]
pub fn lookup_result(card: String, balance: i64, admin: bool) -> Reply {
    Reply::new(format!("{card}\n\n💳 Remaining credits: {balance}"), main_menu(admin))
}

/// Failed lookup; no credits were taken.
#[must_use]
pub fn lookup_failed(reason: &str, admin: bool) -> Reply {
    Reply::new(
        format!("⚠️ Unable to fetch details right now.\nReason: {reason}\nNo credits were deducted."),
        main_menu(admin),
    )
}

/// Confirmation after a payment submission.
#[must_use]
pub fn payment_submitted(payment: &PaymentModel, admin: bool) -> Reply {
    Reply::new(
        format!(
            "📥 Payment details submitted! (ID: {})\n⏳ Please wait 10–25 minutes — admin will verify and approve.",
            payment.id
        ),
        main_menu(admin),
    )
}

/// Caption for the admin copy of a submission.
#[must_use]
pub fn payment_caption(payment: &PaymentModel) -> String {
    format!(
        "🧾 Payment Submitted\nID: {}\nUser: {}\nAmount: ₹{}\nUTR: {}",
        payment.id,
        payment.user_id,
        format_amount(payment.amount),
        payment.reference
    )
}

/// Admin action hints sent after a submission.
#[must_use]
pub fn payment_actions(payment: &PaymentModel) -> String {
    format!(
        "Admin actions:\n/approve {id} <credits_to_add>\n/reject {id}\n/add {user} <credits>\n/block {user}  |  /unblock {user}",
        id = payment.id,
        user = payment.user_id
    )
}

/// Message to a user whose payment was approved.
#[must_use]
pub fn payment_approved_notice(payment_id: &str, credits: i64, balance: i64) -> String {
    format!(
        "✅ Your payment {payment_id} has been approved.\n💰 Credits added: {credits}\n💳 Balance: {balance}"
    )
}

/// Message to a user whose payment was rejected.
#[must_use]
pub fn payment_rejected_notice(payment_id: &str) -> String {
    format!("❌ Your payment {payment_id} was rejected. Contact support if this is a mistake.")
}

/// Successful redemption.
#[must_use]
pub fn redeemed(credits: i64, balance: i64) -> Reply {
    Reply::plain(format!(
        "✅ Code redeemed successfully!\n💰 Credits added: {credits}\n💳 New balance: {balance} credits"
    ))
}

/// Admin notice for a redemption.
#[must_use]
pub fn redemption_notice(code: &CodeModel, user_id: i64) -> String {
    format!(
        "🎫 Code redeemed:\nCode: {}\nUser: {user_id}\nCredits: {}",
        code.token, code.credits
    )
}

/// Admin reply to an approve or reject.
#[must_use]
pub fn review_outcome(outcome: &ReviewOutcome) -> Reply {
    let text = match outcome {
        ReviewOutcome::Approved { payment, balance } => format!(
            "✅ Approved {}. Added {} credits to {} (bal: {balance}).",
            payment.id,
            payment.approved_credits.unwrap_or_default(),
            payment.user_id
        ),
        ReviewOutcome::Rejected { payment } => {
            format!("🚫 Rejected {} from {}.", payment.id, payment.user_id)
        }
        ReviewOutcome::AlreadyProcessed { payment } => format!(
            "ℹ️ Payment {} already processed ({}).",
            payment.id,
            payment.status.as_str()
        ),
    };
    Reply::plain(text)
}

/// Admin reply to `/add`.
#[must_use]
pub fn credits_added(user_id: i64, amount: i64, balance: i64) -> Reply {
    Reply::plain(format!(
        "✅ Added {amount} credits to {user_id} (balance: {balance})."
    ))
}

/// Admin reply to `/block` and `/unblock`.
#[must_use]
pub fn block_changed(user: &UserModel) -> Reply {
    if user.blocked {
        Reply::plain(format!("🚫 Blocked {}", user.id))
    } else {
        Reply::plain(format!("✅ Unblocked {}", user.id))
    }
}

/// Admin reply to `/broadcast`.
#[must_use]
pub fn broadcast_queued(recipients: usize) -> Reply {
    Reply::plain(format!("📢 Broadcast queued for {recipients} users."))
}

/// Admin panel overview.
#[must_use]
pub fn admin_panel() -> Reply {
    Reply::new(
        "⚙️ Admin Panel\n\nCommands:\n\
         • /approve <payment_id> <credits>\n\
         • /reject <payment_id>\n\
         • /add <user_id> <credits>\n\
         • /block <user_id>\n\
         • /unblock <user_id>\n\
         • /gen <count> <credits>\n\
         • /broadcast <message>\n\
         • /users",
        Keyboard::Admin,
    )
}

/// Code generation usage.
#[must_use]
pub fn generate_codes_help(max_batch: usize) -> Reply {
    Reply::new(
        format!(
            "🎫 Generate Codes\n\nUse command: /gen <count> <credits>\nExample: /gen 5 100\n\n\
             This will create 5 codes, each worth 100 credits (at most {max_batch} per call)."
        ),
        Keyboard::Admin,
    )
}

/// Pending payment list.
#[must_use]
pub fn pending_payments(pending: &[PaymentModel]) -> Reply {
    if pending.is_empty() {
        return Reply::new("✅ No pending payments.", Keyboard::Admin);
    }
    let mut text = String::from("📬 Pending Payments");
    for p in pending {
        let _ = write!(
            text,
            "\nID: {} | User: {} | ₹{} | UTR: {}",
            p.id,
            p.user_id,
            format_amount(p.amount),
            p.reference
        );
    }
    Reply::new(text, Keyboard::Admin)
}

/// Aggregate statistics.
#[must_use]
pub fn stats(stats: &Stats) -> Reply {
    Reply::new(
        format!(
            "📈 Bot Stats\n• Users: {}\n• Total Credits: {}\n• Total Searches: {}\n• Pending Payments: {}\n• Active Codes: {}\n• Redeemed Codes: {}",
            stats.users,
            stats.total_credits,
            stats.total_lookups,
            stats.pending_payments,
            stats.active_codes,
            stats.redeemed_codes
        ),
        Keyboard::Admin,
    )
}

/// Short user/payment/code counts for `/users`.
#[must_use]
pub fn user_summary(stats: &Stats) -> Reply {
    Reply::plain(format!(
        "👥 Users: {} | Pending payments: {} | Codes: {}",
        stats.users,
        stats.pending_payments,
        stats.active_codes + stats.redeemed_codes
    ))
}

/// Active and recently redeemed codes.
#[must_use]
pub fn code_overview(overview: &CodeOverview) -> Reply {
    const ACTIVE_SHOWN: usize = 10;
    const REDEEMED_SHOWN: usize = 5;

    if overview.active.is_empty() && overview.redeemed.is_empty() {
        return Reply::new("📋 No codes found.", Keyboard::Admin);
    }

    let mut text = String::from("📋 Codes Status");
    if !overview.active.is_empty() {
        text.push_str("\n\n🟢 Active Codes:");
        for code in overview.active.iter().take(ACTIVE_SHOWN) {
            let _ = write!(text, "\n{} - {} credits", code.token, code.credits);
        }
        if overview.active.len() > ACTIVE_SHOWN {
            let _ = write!(text, "\n... and {} more", overview.active.len() - ACTIVE_SHOWN);
        }
    }
    if !overview.redeemed.is_empty() {
        text.push_str("\n\n🔴 Recently Redeemed:");
        for code in overview.redeemed.iter().take(REDEEMED_SHOWN) {
            let by = code
                .redeemed_by
                .map_or_else(|| "unknown".to_string(), |id| id.to_string());
            let _ = write!(
                text,
                "\n{} - {} credits (Redeemed by {by})",
                code.token, code.credits
            );
        }
        if overview.redeemed.len() > REDEEMED_SHOWN {
            let _ = write!(
                text,
                "\n... and {} more",
                overview.redeemed.len() - REDEEMED_SHOWN
            );
        }
    }
    Reply::new(text, Keyboard::Admin)
}

/// Freshly generated codes.
#[must_use]
pub fn generated_codes(codes: &[CodeModel], credits: i64) -> Reply {
    let list: Vec<&str> = codes.iter().map(|c| c.token.as_str()).collect();
    Reply::plain(format!(
        "✅ Generated {} codes, each worth {credits} credits:\n\n{}",
        codes.len(),
        list.join("\n")
    ))
}

/// Unrecognised input in the idle state.
#[must_use]
pub fn invalid_input(admin: bool) -> Reply {
    Reply::new("❌ Invalid input. Please use the menu buttons.", main_menu(admin))
}

/// User-visible rendering of a domain error.
#[must_use]
pub fn error(err: &Error, admin: bool) -> Reply {
    let text = match err {
        Error::InvalidAmount { .. } => "❌ Amount must be a positive number.".to_string(),
        Error::InvalidInput { message } => format!("❌ {message}"),
        Error::Usage { usage } => format!("Usage: {usage}"),
        Error::UnknownCommand { name } => format!("❓ Unknown command: /{name}"),
        Error::InsufficientCredits { balance, required } => {
            format!("❌ Not enough credits. You have {balance}, this needs {required}.")
        }
        Error::BalanceLimit { balance, .. } => {
            format!("❌ Balance limit reached. Current balance: {balance}.")
        }
        Error::Unauthorized { .. } => "⛔ Unauthorized.".to_string(),
        Error::UserNotFound { user_id } => format!("❌ User {user_id} not found."),
        Error::PaymentNotFound { .. } => "❌ Payment ID not found.".to_string(),
        Error::CodeNotFound { .. } => "❌ Invalid or expired code.".to_string(),
        Error::AlreadyRedeemed { .. } => "❌ This code has already been redeemed.".to_string(),
        Error::RegistryExhausted { .. } => {
            "⚠️ Could not find free codes. Try a smaller batch.".to_string()
        }
        Error::PaymentIdExhausted { .. } => {
            "⚠️ Could not record your payment. Press Confirm to try again.".to_string()
        }
        Error::Lookup { reason } => return lookup_failed(reason, admin),
        _ => "⚠️ Something went wrong. Please try again later.".to_string(),
    };
    Reply::new(text, main_menu(admin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(10.0), "10");
        assert_eq!(format_amount(10.5), "10.5");
    }

    #[test]
    fn test_main_keyboard_admin_row() {
        assert_eq!(Keyboard::Main { admin: false }.rows().len(), 3);
        let admin_rows = Keyboard::Main { admin: true }.rows();
        assert_eq!(admin_rows.last(), Some(&vec![labels::ADMIN_PANEL]));
    }

    #[test]
    fn test_every_flow_keyboard_has_back() {
        for keyboard in [
            Keyboard::Back,
            Keyboard::BuyMain,
            Keyboard::AmountConfirm,
            Keyboard::ScreenshotConfirm,
            Keyboard::ReferenceConfirm,
            Keyboard::Admin,
        ] {
            assert!(
                keyboard.rows().iter().flatten().any(|l| *l == labels::BACK),
                "{keyboard:?} lacks a back button"
            );
        }
    }

    #[test]
    fn test_lookup_error_renders_reason() {
        let reply = error(
            &Error::Lookup {
                reason: "timed out".to_string(),
            },
            false,
        );
        assert!(reply.text.contains("timed out"));
        assert_eq!(reply.keyboard, Some(Keyboard::Main { admin: false }));
    }
}
