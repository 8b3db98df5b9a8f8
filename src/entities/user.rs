//! User entity - One row per person who has ever contacted the bot.
//!
//! Rows are created lazily on first contact and never deleted. The `credits`
//! column is the authoritative ledger balance and must never go negative.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Messaging-platform user id
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    /// Prepaid credit balance
    pub credits: i64,
    /// Blocked users get no service
    pub blocked: bool,
    /// Number of successful paid lookups
    pub lookups: i64,
    /// When the user first contacted the bot
    pub created_at: DateTimeUtc,
}

/// Users have no declared relations; payments and codes reference them by id only
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
