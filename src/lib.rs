//! `CreditDesk` - A Discord bot that sells metered vehicle lookups for prepaid credits
//!
//! Users top up a credit balance through manually reviewed payments or single-use
//! bonus codes and spend it one lookup at a time. Admins review payments, issue
//! codes, and manage users from the same bot.

#![deny(
    unsafe_code,
    unsafe_op_in_unsafe_fn,
    unreachable_code,
    unreachable_patterns,
    unused_must_use,
    rustdoc::broken_intra_doc_links,
    rustdoc::private_intra_doc_links,
)]
// `missing_docs` stays a warning: `poise::command` expands to undocumented items.
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    // Money paths must not panic
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::exit,
    clippy::dbg_macro,
    clippy::float_cmp,
    clippy::clone_on_ref_ptr,
    clippy::needless_pass_by_value,
    clippy::large_enum_variant,
    clippy::too_many_lines,
    clippy::enum_glob_use,
    clippy::wildcard_imports,
    future_incompatible,
    rust_2018_idioms,
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
)]

/// Discord bot interface - commands, handlers, and bot context
pub mod bot;
/// Configuration management for database and application settings
pub mod config;
/// Core business logic - framework-agnostic ledger, payments, codes, and dialogues
pub mod core;
/// SeaORM entity definitions for database tables
pub mod entities;
/// Unified error types and result handling
pub mod errors;
/// External vehicle record lookup
pub mod lookup;

#[cfg(test)]
pub mod test_utils;
