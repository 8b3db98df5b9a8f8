//! Payment entity - A user's self-reported purchase awaiting admin review.
//!
//! Status moves from `pending` to `approved` or `rejected` exactly once; the row
//! is immutable afterwards.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review status of a payment submission
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PaymentStatus {
    /// Waiting for an admin
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Credited to the user
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Declined without credit
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl PaymentStatus {
    /// Human-readable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Payment database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    /// Generated id, e.g. `P1718000000123`
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Submitting user
    pub user_id: i64,
    /// Amount the user claims to have paid
    pub amount: f64,
    /// Bank/UPI transaction reference supplied by the user
    pub reference: String,
    /// Transport reference to the uploaded screenshot
    pub screenshot_ref: String,
    /// Review status
    pub status: PaymentStatus,
    /// Submission time
    pub created_at: DateTimeUtc,
    /// Set once when the payment is approved or rejected
    pub reviewed_at: Option<DateTimeUtc>,
    /// Credits granted on approval, chosen by the admin
    pub approved_credits: Option<i64>,
}

/// Payments have no declared relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
