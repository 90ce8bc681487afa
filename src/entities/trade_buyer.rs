//! Trade buyer entity - One row per unit sold, in purchase order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Buyer record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trade_buyers")]
pub struct Model {
    /// Unique identifier; ascending ids give the purchase order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Item that was bought
    pub trade_item_id: i64,
    /// Buyer identity (chat nickname)
    pub buyer: String,
    /// When the unit was settled
    pub purchased_at: DateTimeUtc,
}

/// Defines relationships between `TradeBuyer` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each buyer record belongs to one trade item
    #[sea_orm(
        belongs_to = "super::trade_item::Entity",
        from = "Column::TradeItemId",
        to = "super::trade_item::Column::Id"
    )]
    TradeItem,
}

impl Related<super::trade_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TradeItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
