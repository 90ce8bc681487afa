//! Redemption code entity - A one-time proof of payment.
//!
//! Codes are issued from transfer notifications and consumed exactly once,
//! either by a plain redemption or by settling a group trade.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Redemption code database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "redemption_codes")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Random numeric code string
    #[sea_orm(unique)]
    pub code: String,
    /// Paid amount in cents
    pub amount_cents: i64,
    /// Terminal flag, set once on redemption
    pub used: bool,
    /// When the code was issued
    pub created_at: DateTimeUtc,
    /// When the code was consumed
    pub redeemed_at: Option<DateTimeUtc>,
}

/// `RedemptionCode` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Paid amount as a decimal.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        crate::core::money::from_cents(self.amount_cents)
    }
}
