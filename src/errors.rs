//! Unified error type for the credit desk.
//!
//! Domain failures (bad input, missing balance, unknown ids) are kept apart from
//! infrastructure failures so the dispatcher can turn the former into replies and
//! propagate the latter.

use crate::entities::UserId;
use thiserror::Error;

/// Every failure the crate can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file or value is unusable
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Persistence failure; the operation did not commit
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing or malformed environment variable
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Amount was zero, negative or not a number
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: f64,
    },

    /// Free-form input failed validation
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Human readable reason
        message: String,
    },

    /// Command arguments did not match the expected shape
    #[error("Usage: {usage}")]
    Usage {
        /// Usage line for the command
        usage: &'static str,
    },

    /// Command name is not known
    #[error("Unknown command: {name}")]
    UnknownCommand {
        /// The command that was sent
        name: String,
    },

    /// Balance too low for a debit
    #[error("Insufficient credits: balance {balance}, required {required}")]
    InsufficientCredits {
        /// Balance at the time of the check
        balance: i64,
        /// Credits the operation needed
        required: i64,
    },

    /// Credit would push a balance past the ledger ceiling
    #[error("Balance limit reached: balance {balance}, adding {amount}")]
    BalanceLimit {
        /// Balance at the time of the check
        balance: i64,
        /// Credits the operation tried to add
        amount: i64,
    },

    /// Privileged operation attempted by a non-admin
    #[error("Unauthorized: user {user_id} is not an admin")]
    Unauthorized {
        /// The caller
        user_id: UserId,
    },

    /// Unknown user id
    #[error("User not found: {user_id}")]
    UserNotFound {
        /// The requested id
        user_id: UserId,
    },

    /// Unknown payment id
    #[error("Payment not found: {payment_id}")]
    PaymentNotFound {
        /// The requested id
        payment_id: String,
    },

    /// Unknown bonus code
    #[error("Code not found: {code}")]
    CodeNotFound {
        /// The normalised code
        code: String,
    },

    /// Bonus code was already used
    #[error("Code already redeemed: {code}")]
    AlreadyRedeemed {
        /// The normalised code
        code: String,
    },

    /// Could not find a free code after repeated draws
    #[error("Code registry exhausted after {attempts} attempts")]
    RegistryExhausted {
        /// Draws made for the failing code
        attempts: usize,
    },

    /// Every drawn payment id was already taken
    #[error("No free payment id after {attempts} attempts")]
    PaymentIdExhausted {
        /// Ids drawn before giving up
        attempts: usize,
    },

    /// External lookup timed out, failed, or found nothing
    #[error("Lookup failed: {reason}")]
    Lookup {
        /// Reason reported to the user
        reason: String,
    },

    /// Outbound message could not be delivered
    #[error("Delivery failed to {user_id}: {message}")]
    Delivery {
        /// Intended recipient
        user_id: UserId,
        /// Transport error text
        message: String,
    },

    /// Serenity/Poise framework error
    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    FrameworkError(Box<poise::serenity_prelude::Error>),
}

impl Error {
    /// Whether the error is a recoverable domain outcome that should be shown to
    /// the user rather than treated as an infrastructure failure.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount { .. }
                | Self::InvalidInput { .. }
                | Self::Usage { .. }
                | Self::UnknownCommand { .. }
                | Self::InsufficientCredits { .. }
                | Self::BalanceLimit { .. }
                | Self::Unauthorized { .. }
                | Self::UserNotFound { .. }
                | Self::PaymentNotFound { .. }
                | Self::CodeNotFound { .. }
                | Self::AlreadyRedeemed { .. }
                | Self::RegistryExhausted { .. }
                | Self::PaymentIdExhausted { .. }
                | Self::Lookup { .. }
        )
    }
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::FrameworkError(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
