//! Notice entity - Bulletin texts keyed by topic, such as the current price list.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notice database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notices")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Topic key (e.g., `"price_list"`)
    #[sea_orm(unique)]
    pub topic: String,
    /// Text sent verbatim to users
    pub body: String,
    /// Last time the text was replaced
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
