//! Bulletin texts stored in the ledger, currently only the price list.

use crate::{
    entities::{Notice, notice},
    errors::Result,
};
use sea_orm::{Set, prelude::*, sea_query::OnConflict};
use tracing::info;

/// Topic key of the price list bulletin.
pub const PRICE_LIST_TOPIC: &str = "price_list";

/// Returns the stored price list, if any.
pub async fn get_price_list(db: &DatabaseConnection) -> Result<Option<String>> {
    let notice = Notice::find()
        .filter(notice::Column::Topic.eq(PRICE_LIST_TOPIC))
        .one(db)
        .await?;
    Ok(notice.map(|n| n.body))
}

/// Replaces the price list text.
pub async fn set_price_list(db: &DatabaseConnection, body: &str) -> Result<()> {
    Notice::insert(notice::ActiveModel {
        topic: Set(PRICE_LIST_TOPIC.to_string()),
        body: Set(body.to_string()),
        updated_at: Set(chrono::Utc::now()),
        ..Default::default()
    })
    .on_conflict(
        OnConflict::column(notice::Column::Topic)
            .update_columns([notice::Column::Body, notice::Column::UpdatedAt])
            .to_owned(),
    )
    .exec(db)
    .await?;

    info!("Price list updated");
    Ok(())
}

/// Stores `body` as the price list unless one is already stored.
///
/// Returns true when the text was written.
pub async fn seed_price_list(db: &DatabaseConnection, body: &str) -> Result<bool> {
    if get_price_list(db).await?.is_some() {
        return Ok(false);
    }
    set_price_list(db, body).await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_price_list_upsert() -> Result<()> {
        let db = setup_test_db().await?;
        assert_eq!(get_price_list(&db).await?, None);

        set_price_list(&db, "周末赛 10星卷").await?;
        assert_eq!(get_price_list(&db).await?.as_deref(), Some("周末赛 10星卷"));

        set_price_list(&db, "周末赛 12星卷").await?;
        assert_eq!(get_price_list(&db).await?.as_deref(), Some("周末赛 12星卷"));
        assert_eq!(Notice::find().all(&db).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_seed_does_not_overwrite() -> Result<()> {
        let db = setup_test_db().await?;

        assert!(seed_price_list(&db, "初始").await?);
        assert!(!seed_price_list(&db, "再次").await?);
        assert_eq!(get_price_list(&db).await?.as_deref(), Some("初始"));

        Ok(())
    }
}
