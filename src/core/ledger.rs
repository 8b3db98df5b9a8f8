//! Credit ledger - Authoritative per-user balances.
//!
//! Every mutation is a single conditional `UPDATE`, so concurrent credits and
//! debits for the same user serialize inside the database and a debit can never
//! drive a balance below zero. Functions are generic over [`ConnectionTrait`] so they
//! can run standalone or inside a caller's transaction.

use crate::{
    entities::{User, UserId, user},
    errors::{Error, Result},
};
use sea_orm::{
    Set,
    prelude::*,
    sea_query::{Expr, OnConflict},
};

/// Highest balance the ledger will hold. Keeps every balance and their sum inside
/// `i64`.
pub const MAX_BALANCE: i64 = 1_000_000_000_000;

/// Creates the user row if it does not exist yet and returns the current row.
pub async fn ensure_user<C>(db: &C, user_id: UserId) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let fresh = user::ActiveModel {
        id: Set(user_id),
        credits: Set(0),
        blocked: Set(false),
        lookups: Set(0),
        created_at: Set(chrono::Utc::now()),
    };

    let inserted = User::insert(fresh)
        .on_conflict(
            OnConflict::column(user::Column::Id)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    if inserted > 0 {
        tracing::info!(user_id, "Registered new user");
    }

    require_user(db, user_id).await
}

/// Finds a user without creating it.
pub async fn get_user<C>(db: &C, user_id: UserId) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

async fn require_user<C>(db: &C, user_id: UserId) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    get_user(db, user_id)
        .await?
        .ok_or(Error::UserNotFound { user_id })
}

/// Current balance; unknown users are created with a zero balance.
pub async fn balance<C>(db: &C, user_id: UserId) -> Result<i64>
where
    C: ConnectionTrait,
{
    Ok(ensure_user(db, user_id).await?.credits)
}

/// Adds `amount` credits and returns the new balance.
///
/// Fails with [`Error::BalanceLimit`] without touching the row when the result
/// would exceed [`MAX_BALANCE`].
pub async fn credit<C>(db: &C, user_id: UserId, amount: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    if amount <= 0 {
        return Err(invalid_credit_amount(amount));
    }
    let current = ensure_user(db, user_id).await?;
    if amount > MAX_BALANCE {
        return Err(Error::BalanceLimit {
            balance: current.credits,
            amount,
        });
    }

    let result = User::update_many()
        .col_expr(
            user::Column::Credits,
            Expr::col(user::Column::Credits).add(amount),
        )
        .filter(user::Column::Id.eq(user_id))
        .filter(user::Column::Credits.lte(MAX_BALANCE - amount))
        .exec(db)
        .await?;

    let updated = require_user(db, user_id).await?;
    if result.rows_affected == 0 {
        tracing::warn!(user_id, amount, balance = updated.credits, "Credit over limit");
        return Err(Error::BalanceLimit {
            balance: updated.credits,
            amount,
        });
    }
    tracing::info!(user_id, amount, balance = updated.credits, "Credited");
    Ok(updated.credits)
}

/// Removes `amount` credits if the balance covers it and returns the new balance.
///
/// Fails with [`Error::InsufficientCredits`] without touching the row otherwise.
pub async fn debit<C>(db: &C, user_id: UserId, amount: i64) -> Result<i64>
where
    C: ConnectionTrait,
{
    if amount <= 0 {
        return Err(invalid_credit_amount(amount));
    }
    ensure_user(db, user_id).await?;

    let result = User::update_many()
        .col_expr(
            user::Column::Credits,
            Expr::col(user::Column::Credits).sub(amount),
        )
        .filter(user::Column::Id.eq(user_id))
        .filter(user::Column::Credits.gte(amount))
        .exec(db)
        .await?;

    let current = require_user(db, user_id).await?;
    if result.rows_affected == 0 {
        return Err(Error::InsufficientCredits {
            balance: current.credits,
            required: amount,
        });
    }
    tracing::info!(user_id, amount, balance = current.credits, "Debited");
    Ok(current.credits)
}

/// Debits one lookup's cost and bumps the lookup counter in the same statement.
pub async fn charge_lookup<C>(db: &C, user_id: UserId, cost: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    if cost <= 0 {
        return Err(invalid_credit_amount(cost));
    }

    let result = User::update_many()
        .col_expr(
            user::Column::Credits,
            Expr::col(user::Column::Credits).sub(cost),
        )
        .col_expr(
            user::Column::Lookups,
            Expr::col(user::Column::Lookups).add(1),
        )
        .filter(user::Column::Id.eq(user_id))
        .filter(user::Column::Credits.gte(cost))
        .exec(db)
        .await?;

    let current = require_user(db, user_id).await?;
    if result.rows_affected == 0 {
        return Err(Error::InsufficientCredits {
            balance: current.credits,
            required: cost,
        });
    }
    Ok(current)
}

/// Sets or clears the blocked flag, creating the user if needed.
pub async fn set_blocked<C>(db: &C, user_id: UserId, blocked: bool) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    ensure_user(db, user_id).await?;
    User::update_many()
        .col_expr(user::Column::Blocked, Expr::value(blocked))
        .filter(user::Column::Id.eq(user_id))
        .exec(db)
        .await?;
    tracing::info!(user_id, blocked, "Updated blocked flag");
    require_user(db, user_id).await
}

/// Every known user, ordered by id.
pub async fn all_users(db: &DatabaseConnection) -> Result<Vec<user::Model>> {
    use sea_orm::QueryOrder;

    User::find()
        .order_by_asc(user::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[allow(clippy::cast_precision_loss)]
fn invalid_credit_amount(amount: i64) -> Error {
    Error::InvalidAmount {
        amount: amount as f64,
    }
}
