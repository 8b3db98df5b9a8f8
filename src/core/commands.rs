//! Slash-style command parsing.
//!
//! Names are matched before arguments so the dispatcher can refuse admin commands
//! from non-admins without looking at what they passed.

use crate::{
    entities::UserId,
    errors::{Error, Result},
};

/// A parsed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Available to everyone
    User(UserCommand),
    /// Requires an admin
    Admin(AdminCommand),
}

/// Commands any user may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Reset the conversation and show the menu
    Start,
    /// Show help
    Help,
    /// Show balance
    Balance,
    /// Redeem a bonus code
    Redeem {
        /// Code as typed
        code: String,
    },
}

/// Commands reserved for admins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// Approve a payment, crediting `credits`
    Approve {
        /// Payment id
        payment_id: String,
        /// Credits to add
        credits: i64,
    },
    /// Reject a payment
    Reject {
        /// Payment id
        payment_id: String,
    },
    /// Add credits to a user
    Add {
        /// Target user
        user_id: UserId,
        /// Credits to add
        credits: i64,
    },
    /// Block a user
    Block {
        /// Target user
        user_id: UserId,
    },
    /// Unblock a user
    Unblock {
        /// Target user
        user_id: UserId,
    },
    /// Short user/payment/code counts
    Users,
    /// Generate bonus codes
    Gen {
        /// How many codes
        count: usize,
        /// Credits per code
        credits: i64,
    },
    /// List pending payments
    Pending,
    /// Full statistics
    Stats,
    /// Code overview
    Codes,
    /// Message every known user
    Broadcast {
        /// Message body
        message: String,
    },
}

const ADMIN_COMMANDS: &[&str] = &[
    "approve",
    "reject",
    "add",
    "block",
    "unblock",
    "users",
    "gen",
    "pending",
    "stats",
    "codes",
    "broadcast",
];

/// Whether `name` is reserved for admins.
#[must_use]
pub fn is_admin_command(name: &str) -> bool {
    ADMIN_COMMANDS.contains(&canonical(name).as_str())
}

/// Usage line for a known command.
#[must_use]
pub fn usage(name: &str) -> Option<&'static str> {
    let usage = match canonical(name).as_str() {
        "start" => "/start",
        "help" => "/help",
        "balance" => "/balance",
        "redeem" => "/redeem <code>",
        "approve" => "/approve <payment_id> <credits>",
        "reject" => "/reject <payment_id>",
        "add" => "/add <user_id> <credits>",
        "block" => "/block <user_id>",
        "unblock" => "/unblock <user_id>",
        "users" => "/users",
        "gen" => "/gen <count> <credits>",
        "pending" => "/pending",
        "stats" => "/stats",
        "codes" => "/codes",
        "broadcast" => "/broadcast <message>",
        _ => return None,
    };
    Some(usage)
}

/// Largest credit amount one admin command may grant.
pub const MAX_CREDIT_ARG: i64 = 1_000_000_000;

fn credits_arg(raw: &str) -> Option<i64> {
    raw.parse()
        .ok()
        .filter(|credits| (1..=MAX_CREDIT_ARG).contains(credits))
}

fn canonical(name: &str) -> String {
    name.trim().trim_start_matches('/').to_lowercase()
}

impl Command {
    /// Parses `name` with its raw argument string.
    pub fn parse(name: &str, args: &str) -> Result<Self> {
        let name = canonical(name);
        let usage = usage(&name).ok_or_else(|| Error::UnknownCommand { name: name.clone() })?;
        let bad = || Error::Usage { usage };
        let parts: Vec<&str> = args.split_whitespace().collect();

        let command = match (name.as_str(), parts.as_slice()) {
            ("start", _) => Self::User(UserCommand::Start),
            ("help", _) => Self::User(UserCommand::Help),
            ("balance", _) => Self::User(UserCommand::Balance),
            ("redeem", [_, ..]) => Self::User(UserCommand::Redeem {
                code: parts.concat(),
            }),
            ("users", _) => Self::Admin(AdminCommand::Users),
            ("pending", _) => Self::Admin(AdminCommand::Pending),
            ("stats", _) => Self::Admin(AdminCommand::Stats),
            ("codes", _) => Self::Admin(AdminCommand::Codes),
            ("approve", [payment_id, credits]) => Self::Admin(AdminCommand::Approve {
                payment_id: (*payment_id).to_string(),
                credits: credits_arg(credits).ok_or_else(bad)?,
            }),
            ("reject", [payment_id]) => Self::Admin(AdminCommand::Reject {
                payment_id: (*payment_id).to_string(),
            }),
            ("add", [user_id, credits]) => Self::Admin(AdminCommand::Add {
                user_id: user_id.parse().map_err(|_| bad())?,
                credits: credits_arg(credits).ok_or_else(bad)?,
            }),
            ("block", [user_id]) => Self::Admin(AdminCommand::Block {
                user_id: user_id.parse().map_err(|_| bad())?,
            }),
            ("unblock", [user_id]) => Self::Admin(AdminCommand::Unblock {
                user_id: user_id.parse().map_err(|_| bad())?,
            }),
            ("gen", [count, credits]) => Self::Admin(AdminCommand::Gen {
                count: count.parse().map_err(|_| bad())?,
                credits: credits_arg(credits).ok_or_else(bad)?,
            }),
            ("broadcast", _) if !args.trim().is_empty() => {
                Self::Admin(AdminCommand::Broadcast {
                    message: args.trim().to_string(),
                })
            }
            _ => return Err(bad()),
        };
        Ok(command)
    }
}
