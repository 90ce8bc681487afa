//! Database configuration module for `TradeBuddy`.
//!
//! This module handles `SQLite` database connection and table creation using `SeaORM`.
//! The connection opened here is the single ledger handle of the process: it is
//! created once in `main`, handed explicitly to every core function, and dropped on
//! shutdown. Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust structs.

use crate::entities::{Notice, RedemptionCode, SessionRecord, TradeBuyer, TradeItem};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Schema};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/trade_buddy.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns
/// the default local `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by [`get_database_url`].
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    tracing::debug!("Connecting to ledger at {database_url}");
    Database::connect(&database_url).await.map_err(Into::into)
}

/// Creates every ledger table that does not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let tables = [
        schema.create_table_from_entity(TradeItem),
        schema.create_table_from_entity(TradeBuyer),
        schema.create_table_from_entity(RedemptionCode),
        schema.create_table_from_entity(Notice),
        schema.create_table_from_entity(SessionRecord),
    ];

    for mut table in tables {
        table.if_not_exists();
        db.execute(builder.build(&table)).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        notice::Model as NoticeModel, redemption_code::Model as RedemptionCodeModel,
        session_record::Model as SessionRecordModel, trade_buyer::Model as TradeBuyerModel,
        trade_item::Model as TradeItemModel,
    };
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        let _: Vec<TradeItemModel> = TradeItem::find().limit(1).all(&db).await?;
        let _: Vec<TradeBuyerModel> = TradeBuyer::find().limit(1).all(&db).await?;
        let _: Vec<RedemptionCodeModel> = RedemptionCode::find().limit(1).all(&db).await?;
        let _: Vec<NoticeModel> = Notice::find().limit(1).all(&db).await?;
        let _: Vec<SessionRecordModel> = SessionRecord::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        // Restarting the bot against an existing ledger must not fail.
        create_tables(&db).await?;
        Ok(())
    }
}
