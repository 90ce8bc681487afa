//! Trade item entity - A listing offered by a seller.
//!
//! An item is created by a seller command, may receive one image, may be bound
//! to one venue (chat group), and loses one unit of quantity per settled sale.
//! Rows are never deleted; a sold-out item stays for history.

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Trade item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trade_items")]
pub struct Model {
    /// Unique identifier, assigned on creation
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Seller identity (chat nickname)
    pub seller: String,
    /// Venue (chat group) id, None until the seller starts a trade
    pub venue_id: Option<String>,
    /// Item name shown in the trade zone
    pub item_name: String,
    /// Optional free-text description
    pub description: Option<String>,
    /// Unit price in cents
    pub price_cents: i64,
    /// Remaining quantity, never negative
    pub quantity: i32,
    /// Blob reference of the item image, None until attached
    pub image_ref: Option<String>,
    /// When the item was listed
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `TradeItem` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One item has many recorded buyers
    #[sea_orm(has_many = "super::trade_buyer::Entity")]
    Buyers,
}

impl Related<super::trade_buyer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Buyers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Unit price as a decimal amount.
    #[must_use]
    pub fn price(&self) -> Decimal {
        crate::core::money::from_cents(self.price_cents)
    }

    /// Description or an empty string, for rendering.
    #[must_use]
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    /// True once every unit has been sold.
    #[must_use]
    pub const fn is_sold_out(&self) -> bool {
        self.quantity <= 0
    }
}
