//! Core business logic - framework-agnostic ledger, payment, code and dialogue handling.
//!
//! Nothing in here knows about Discord; the bot layer feeds [`dispatch::Dispatcher`]
//! with [`dispatch::InboundEvent`]s and renders the replies it returns.

/// Admin command surface and aggregate stats
pub mod admin;
/// Bonus code generation and redemption
pub mod codes;
/// Slash command parsing
pub mod commands;
/// Purchase and lookup dialogue state machine
pub mod conversation;
/// Event intake and routing
pub mod dispatch;
/// Per-user credit balances
pub mod ledger;
/// Outbound notifications
pub mod notify;
/// Payment submissions and review
pub mod payments;
/// Reply text and keyboards
pub mod replies;
/// Per-user conversation slots
pub mod sessions;

pub use dispatch::{Dispatcher, InboundEvent, Outcome};
