//! Session record entity - Finished or running game sessions, read by the history report.
//!
//! The marketplace never writes these rows; another service fills the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Session record database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "session_records")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Player nickname the session belongs to
    pub player: String,
    /// Order type used to group the report
    pub order_type: String,
    pub game_id: String,
    /// Stars spent to join the session
    pub star_cost: i64,
    /// Stars won
    pub stars: i64,
    pub final_rank: String,
    /// Whether the session is still running
    pub is_active: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
