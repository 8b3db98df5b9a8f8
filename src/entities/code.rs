//! Code entity - Single-use bonus codes created in batches by an admin.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Bonus code database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "codes")]
pub struct Model {
    /// Token in `XXX-XXX-XXX` form
    #[sea_orm(primary_key, auto_increment = false)]
    pub token: String,
    /// Credits granted on redemption
    pub credits: i64,
    /// Admin who generated the code
    pub created_by: i64,
    /// Generation time
    pub created_at: DateTimeUtc,
    /// Set once, together with the credit to the redeemer
    pub redeemed: bool,
    /// Redeeming user
    pub redeemed_by: Option<i64>,
    /// Redemption time
    pub redeemed_at: Option<DateTimeUtc>,
}

/// Codes have no declared relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
