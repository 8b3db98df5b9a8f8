//! Payment queue - Purchase submissions and their one-time review.
//!
//! A submission is appended as `pending`. Approval moves it to `approved` and credits
//! the submitter inside one database transaction; the status change is guarded by
//! `WHERE status = 'pending'`, so a second approval (concurrent or later) finds
//! nothing to update and reports the payment as already processed.

use crate::{
    core::ledger,
    entities::{Payment, PaymentStatus, UserId, payment},
    errors::{Error, Result},
};
use rand::Rng;
use sea_orm::{
    PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};

const MAX_ID_ATTEMPTS: usize = 16;

/// Result of an approve or reject call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewOutcome {
    /// The payment was approved and the user credited
    Approved {
        /// Payment after the update
        payment: payment::Model,
        /// Submitter's balance after the credit
        balance: i64,
    },
    /// The payment was rejected
    Rejected {
        /// Payment after the update
        payment: payment::Model,
    },
    /// The payment had already left `pending`; nothing changed
    AlreadyProcessed {
        /// Payment as currently stored
        payment: payment::Model,
    },
}

/// Generates an id of the form `P<unix seconds><three random digits>`.
#[must_use]
pub fn new_payment_id() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(100..1000);
    format!("P{}{suffix}", chrono::Utc::now().timestamp())
}

/// Appends a pending payment for `user_id`.
pub async fn submit(
    db: &DatabaseConnection,
    user_id: UserId,
    amount: f64,
    reference: String,
    screenshot_ref: String,
) -> Result<payment::Model> {
    submit_with_ids(db, user_id, amount, reference, screenshot_ref, new_payment_id).await
}

/// [`submit`] drawing ids from `next_id`.
///
/// Each draw is inserted with `ON CONFLICT DO NOTHING`; a taken id is redrawn, and
/// [`Error::PaymentIdExhausted`] is returned once `MAX_ID_ATTEMPTS` draws all collide.
pub async fn submit_with_ids<F>(
    db: &DatabaseConnection,
    user_id: UserId,
    amount: f64,
    reference: String,
    screenshot_ref: String,
    mut next_id: F,
) -> Result<payment::Model>
where
    F: FnMut() -> String,
{
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    let reference = reference.trim().to_string();
    if reference.is_empty() {
        return Err(Error::InvalidInput {
            message: "transaction reference cannot be empty".to_string(),
        });
    }

    for _ in 0..MAX_ID_ATTEMPTS {
        let id = next_id();
        let record = payment::ActiveModel {
            id: Set(id.clone()),
            user_id: Set(user_id),
            amount: Set(amount),
            reference: Set(reference.clone()),
            screenshot_ref: Set(screenshot_ref.clone()),
            status: Set(PaymentStatus::Pending),
            created_at: Set(chrono::Utc::now()),
            reviewed_at: Set(None),
            approved_credits: Set(None),
        };
        let inserted = Payment::insert(record)
            .on_conflict(
                OnConflict::column(payment::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;
        if inserted == 0 {
            tracing::debug!(payment_id = %id, "Payment id taken, drawing again");
            continue;
        }

        let saved = require_payment(db, &id).await?;
        tracing::info!(payment_id = %saved.id, user_id, amount, "Payment submitted");
        return Ok(saved);
    }

    tracing::warn!(user_id, "No free payment id after {MAX_ID_ATTEMPTS} attempts");
    Err(Error::PaymentIdExhausted {
        attempts: MAX_ID_ATTEMPTS,
    })
}

/// Finds a payment by id.
pub async fn get_payment<C>(db: &C, payment_id: &str) -> Result<Option<payment::Model>>
where
    C: ConnectionTrait,
{
    Payment::find_by_id(payment_id.to_string())
        .one(db)
        .await
        .map_err(Into::into)
}

async fn require_payment<C>(db: &C, payment_id: &str) -> Result<payment::Model>
where
    C: ConnectionTrait,
{
    get_payment(db, payment_id)
        .await?
        .ok_or_else(|| Error::PaymentNotFound {
            payment_id: payment_id.to_string(),
        })
}

/// Moves a pending payment to `to`, returning whether this call made the change.
async fn close_pending<C>(
    db: &C,
    payment_id: &str,
    to: PaymentStatus,
    approved_credits: Option<i64>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = Payment::update_many()
        .col_expr(payment::Column::Status, Expr::value(to))
        .col_expr(
            payment::Column::ReviewedAt,
            Expr::value(Some(chrono::Utc::now())),
        )
        .col_expr(
            payment::Column::ApprovedCredits,
            Expr::value(approved_credits),
        )
        .filter(payment::Column::Id.eq(payment_id))
        .filter(payment::Column::Status.eq(PaymentStatus::Pending))
        .exec(db)
        .await?;
    Ok(result.rows_affected == 1)
}

/// Approves a pending payment and credits its submitter with `credits`.
///
/// `credits` is chosen by the admin and need not match the claimed amount.
/// The status change, review timestamp, credited amount and ledger credit commit
/// together or not at all.
#[allow(clippy::cast_precision_loss)]
pub async fn approve(
    db: &DatabaseConnection,
    payment_id: &str,
    credits: i64,
) -> Result<ReviewOutcome> {
    if credits <= 0 {
        return Err(Error::InvalidAmount {
            amount: credits as f64,
        });
    }

    let txn = db.begin().await?;
    require_payment(&txn, payment_id).await?;

    if !close_pending(&txn, payment_id, PaymentStatus::Approved, Some(credits)).await? {
        let payment = require_payment(&txn, payment_id).await?;
        return Ok(ReviewOutcome::AlreadyProcessed { payment });
    }
    let payment = require_payment(&txn, payment_id).await?;
    let balance = ledger::credit(&txn, payment.user_id, credits).await?;
    txn.commit().await?;

    tracing::info!(payment_id, user_id = payment.user_id, credits, "Payment approved");
    Ok(ReviewOutcome::Approved { payment, balance })
}

/// Rejects a pending payment without touching the ledger.
pub async fn reject(db: &DatabaseConnection, payment_id: &str) -> Result<ReviewOutcome> {
    require_payment(db, payment_id).await?;
    let closed = close_pending(db, payment_id, PaymentStatus::Rejected, None).await?;
    let payment = require_payment(db, payment_id).await?;
    if !closed {
        return Ok(ReviewOutcome::AlreadyProcessed { payment });
    }
    tracing::info!(payment_id, user_id = payment.user_id, "Payment rejected");
    Ok(ReviewOutcome::Rejected { payment })
}

/// Pending payments, most recent first.
pub async fn list_pending(db: &DatabaseConnection, limit: u64) -> Result<Vec<payment::Model>> {
    Payment::find()
        .filter(payment::Column::Status.eq(PaymentStatus::Pending))
        .order_by_desc(payment::Column::CreatedAt)
        .order_by_desc(payment::Column::Id)
        .limit(limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of payments still awaiting review.
pub async fn count_pending(db: &DatabaseConnection) -> Result<u64> {
    Payment::find()
        .filter(payment::Column::Status.eq(PaymentStatus::Pending))
        .count(db)
        .await
        .map_err(Into::into)
}
