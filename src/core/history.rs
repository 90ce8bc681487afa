//! Game-session history report.
//!
//! Read-only: sessions are written elsewhere. The report groups a player's
//! sessions by order type and totals the stars spent and won per group. The
//! bot layer turns it into text.

use crate::{
    entities::{SessionRecord, session_record},
    errors::Result,
};
use sea_orm::{QueryOrder, prelude::*};
use std::collections::BTreeMap;

/// Sessions of one order type with their totals.
#[derive(Debug, Clone, Default)]
pub struct OrderTypeHistory {
    /// Sum of `star_cost` over the sessions
    pub total_star_cost: i64,
    /// Sum of `stars` over the sessions
    pub total_stars: i64,
    /// Sessions, newest first
    pub sessions: Vec<session_record::Model>,
}

/// A player's history keyed by order type, in order-type order.
pub type HistoryReport = BTreeMap<String, OrderTypeHistory>;

/// Builds the history report for `player`. Empty when the player has no sessions.
pub async fn generate_history_report(
    db: &DatabaseConnection,
    player: &str,
) -> Result<HistoryReport> {
    let sessions = SessionRecord::find()
        .filter(session_record::Column::Player.eq(player))
        .order_by_asc(session_record::Column::OrderType)
        .order_by_desc(session_record::Column::CreatedAt)
        .all(db)
        .await?;

    let mut report = HistoryReport::new();
    for session in sessions {
        let group = report.entry(session.order_type.clone()).or_default();
        group.total_star_cost += session.star_cost;
        group.total_stars += session.stars;
        group.sessions.push(session);
    }
    Ok(report)
}
