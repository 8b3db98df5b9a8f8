//! Admin command surface.
//!
//! Privileged operations are methods on [`Admin`], and an `Admin` can only be
//! obtained from [`Admin::authorize`]. A non-admin caller is turned away before any
//! operation runs, so a rejected call can never have side effects.

use crate::{
    config::AppConfig,
    core::{
        codes::{self, CodeOverview},
        ledger,
        notify::Notification,
        payments::{self, ReviewOutcome},
    },
    entities::{CodeModel, PaymentModel, User, UserId, UserModel, user},
    errors::{Error, Result},
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QuerySelect};

/// Aggregate numbers for the stats panel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Known users
    pub users: u64,
    /// Credits outstanding across all users
    pub total_credits: i64,
    /// Successful lookups across all users
    pub total_lookups: i64,
    /// Payments awaiting review
    pub pending_payments: u64,
    /// Codes not yet redeemed
    pub active_codes: u64,
    /// Codes already redeemed
    pub redeemed_codes: u64,
}

/// Proof that the caller is a configured admin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admin {
    id: UserId,
}

impl Admin {
    /// Checks `user_id` against the configured admins.
    pub fn authorize(config: &AppConfig, user_id: UserId) -> Result<Self> {
        if config.is_admin(user_id) {
            Ok(Self { id: user_id })
        } else {
            tracing::warn!(user_id, "Rejected admin operation from non-admin");
            Err(Error::Unauthorized { user_id })
        }
    }

    /// The admin's user id
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.id
    }

    /// Credits `user_id` directly and returns the new balance.
    pub async fn add_credits(
        &self,
        db: &DatabaseConnection,
        user_id: UserId,
        amount: i64,
    ) -> Result<i64> {
        let balance = ledger::credit(db, user_id, amount).await?;
        tracing::info!(admin = self.id, user_id, amount, "Admin added credits");
        Ok(balance)
    }

    /// Blocks or unblocks `user_id`.
    pub async fn set_blocked(
        &self,
        db: &DatabaseConnection,
        user_id: UserId,
        blocked: bool,
    ) -> Result<UserModel> {
        tracing::info!(admin = self.id, user_id, blocked, "Admin changed block status");
        ledger::set_blocked(db, user_id, blocked).await
    }

    /// Approves a payment for an admin-chosen number of credits.
    pub async fn approve(
        &self,
        db: &DatabaseConnection,
        payment_id: &str,
        credits: i64,
    ) -> Result<ReviewOutcome> {
        payments::approve(db, payment_id, credits).await
    }

    /// Rejects a payment.
    pub async fn reject(&self, db: &DatabaseConnection, payment_id: &str) -> Result<ReviewOutcome> {
        payments::reject(db, payment_id).await
    }

    /// Generates `count` codes worth `credits` each.
    pub async fn generate_batch(
        &self,
        db: &DatabaseConnection,
        count: usize,
        credits: i64,
        max_batch: usize,
    ) -> Result<Vec<CodeModel>> {
        codes::generate_batch(db, self.id, count, credits, max_batch).await
    }

    /// Pending payments, most recent first.
    pub async fn pending(&self, db: &DatabaseConnection, limit: u64) -> Result<Vec<PaymentModel>> {
        payments::list_pending(db, limit).await
    }

    /// Active and redeemed codes.
    pub async fn codes(&self, db: &DatabaseConnection) -> Result<CodeOverview> {
        codes::overview(db).await
    }

    /// One text notification per known user.
    ///
    /// Delivery is left to the caller so that it happens outside any lock.
    pub async fn broadcast(
        &self,
        db: &DatabaseConnection,
        message: &str,
    ) -> Result<Vec<Notification>> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput {
                message: "broadcast message cannot be empty".to_string(),
            });
        }
        let recipients = ledger::all_users(db).await?;
        tracing::info!(admin = self.id, recipients = recipients.len(), "Broadcast queued");
        Ok(recipients
            .into_iter()
            .map(|u| Notification::text(u.id, format!("📢 Announcement\n\n{message}")))
            .collect())
    }

    /// Counts for the stats panel.
    pub async fn stats(&self, db: &DatabaseConnection) -> Result<Stats> {
        let users = User::find().count(db).await?;
        let (total_credits, total_lookups) = User::find()
            .select_only()
            .column_as(user::Column::Credits.sum(), "total_credits")
            .column_as(user::Column::Lookups.sum(), "total_lookups")
            .into_tuple::<(Option<i64>, Option<i64>)>()
            .one(db)
            .await?
            .unwrap_or_default();
        let pending_payments = payments::count_pending(db).await?;
        let (active_codes, redeemed_codes) = codes::counts(db).await?;

        Ok(Stats {
            users,
            total_credits: total_credits.unwrap_or(0),
            total_lookups: total_lookups.unwrap_or(0),
            pending_payments,
            active_codes,
            redeemed_codes,
        })
    }
}
