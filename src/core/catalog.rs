//! Trade catalog business logic - Owns the lifecycle of trade items.
//!
//! Items are created by sellers, optionally receive one image, are bound to the
//! venue (chat group) where the trade happens, and lose one unit of quantity per
//! settled sale. Every state change is a single conditional `UPDATE` so that two
//! concurrent handlers can never both win the same transition; the ledger is the
//! only shared state and nothing is cached between calls.

use crate::{
    bot::gateway::BlobStore,
    core::money,
    entities::{TradeBuyer, TradeItem, trade_buyer, trade_item},
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::{
    Condition, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use tracing::{info, warn};

/// Validated input for [`create_trade_item`].
#[derive(Debug, Clone)]
pub struct NewListing {
    /// Seller nickname
    pub seller: String,
    pub name: String,
    pub description: Option<String>,
    /// Unit price, positive with at most two decimals
    pub price: Decimal,
    /// Units for sale, at least one
    pub quantity: i32,
}

/// Creates a new trade item with no venue, no buyers, and no image.
///
/// The parser validates fields already; they are checked again here because
/// this is the last stop before the ledger.
///
/// # Errors
/// Returns `Error::Validation` if the seller or name is empty, the price is not a
/// positive amount in whole cents, or the quantity is below one. Returns
/// `Error::Database` if the insert fails.
pub async fn create_trade_item<C>(db: &C, listing: NewListing) -> Result<trade_item::Model>
where
    C: ConnectionTrait,
{
    let seller = listing.seller.trim();
    let name = listing.name.trim();
    if seller.is_empty() {
        return Err(Error::Validation {
            reason: "卖家名称不能为空。".to_string(),
        });
    }
    if name.is_empty() {
        return Err(Error::Validation {
            reason: "交易品名称不能为空。".to_string(),
        });
    }
    if listing.quantity < 1 {
        return Err(Error::Validation {
            reason: format!("数量必须至少为1：{}", listing.quantity),
        });
    }
    let price_cents = money::to_positive_cents(listing.price)?;

    let item = trade_item::ActiveModel {
        seller: Set(seller.to_string()),
        venue_id: Set(None),
        item_name: Set(name.to_string()),
        description: Set(listing
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())),
        price_cents: Set(price_cents),
        quantity: Set(listing.quantity),
        image_ref: Set(None),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        "Created trade item {} '{}' for seller {} ({} x {})",
        item.id, item.item_name, item.seller, listing.quantity, listing.price
    );
    Ok(item)
}

/// Retrieves a trade item by id.
pub async fn get_trade_item_by_id<C>(db: &C, item_id: i64) -> Result<Option<trade_item::Model>>
where
    C: ConnectionTrait,
{
    TradeItem::find_by_id(item_id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists a seller's items that still have quantity, oldest first.
pub async fn list_for_seller(
    db: &DatabaseConnection,
    seller: &str,
) -> Result<Vec<trade_item::Model>> {
    TradeItem::find()
        .filter(trade_item::Column::Seller.eq(seller))
        .filter(trade_item::Column::Quantity.gt(0))
        .order_by_asc(trade_item::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the trade zone: every item with quantity left, optionally restricted to
/// names containing `name_filter` (case-sensitive).
pub async fn list_available(
    db: &DatabaseConnection,
    name_filter: Option<&str>,
) -> Result<Vec<trade_item::Model>> {
    let mut query = TradeItem::find()
        .filter(trade_item::Column::Quantity.gt(0))
        .order_by_asc(trade_item::Column::Id);

    let Some(filter) = name_filter.filter(|f| !f.is_empty()) else {
        return query.all(db).await.map_err(Into::into);
    };

    // LIKE narrows the scan but ignores ASCII case; refine to an exact substring.
    query = query.filter(trade_item::Column::ItemName.contains(filter));
    let items = query.all(db).await?;
    Ok(items
        .into_iter()
        .filter(|item| item.item_name.contains(filter))
        .collect())
}

/// Attaches an uploaded image to the seller's oldest item that has none yet.
///
/// The bytes are stored first; the reference is then written with a conditional
/// update that only succeeds while the item still has no image, so concurrent
/// uploads land on different items.
///
/// # Errors
/// Returns `Error::PendingItemNotFound` when the seller has no item waiting for
/// an image, or a storage error from the blob store or ledger.
pub async fn attach_image(
    db: &DatabaseConnection,
    blobs: &dyn BlobStore,
    seller: &str,
    image: &[u8],
) -> Result<trade_item::Model> {
    if find_pending_image_item(db, seller).await?.is_none() {
        return Err(Error::PendingItemNotFound {
            seller: seller.to_string(),
        });
    }

    let reference = blobs.store(image).await?;

    while let Some(candidate) = find_pending_image_item(db, seller).await? {
        let result = TradeItem::update_many()
            .col_expr(
                trade_item::Column::ImageRef,
                Expr::value(Some(reference.clone())),
            )
            .filter(trade_item::Column::Id.eq(candidate.id))
            .filter(trade_item::Column::ImageRef.is_null())
            .exec(db)
            .await?;

        if result.rows_affected == 1 {
            info!("Attached image {reference} to trade item {}", candidate.id);
            return Ok(trade_item::Model {
                image_ref: Some(reference),
                ..candidate
            });
        }
    }

    warn!("Stored image {reference} but every pending item of {seller} was taken meanwhile");
    Err(Error::PendingItemNotFound {
        seller: seller.to_string(),
    })
}

async fn find_pending_image_item(
    db: &DatabaseConnection,
    seller: &str,
) -> Result<Option<trade_item::Model>> {
    TradeItem::find()
        .filter(trade_item::Column::Seller.eq(seller))
        .filter(trade_item::Column::ImageRef.is_null())
        .order_by_asc(trade_item::Column::Id)
        .one(db)
        .await
        .map_err(Into::into)
}

/// Binds an item to the venue where its trade takes place.
///
/// Binding is a one-time transition: binding again to the same venue is a no-op,
/// binding to a different venue is refused.
///
/// # Errors
/// Returns `Error::ItemNotFound` if the item does not exist and
/// `Error::AlreadyBound` if it is bound to another venue.
pub async fn bind_to_venue(
    db: &DatabaseConnection,
    item_id: i64,
    venue_id: &str,
) -> Result<trade_item::Model> {
    let result = TradeItem::update_many()
        .col_expr(
            trade_item::Column::VenueId,
            Expr::value(Some(venue_id.to_string())),
        )
        .filter(trade_item::Column::Id.eq(item_id))
        .filter(
            Condition::any()
                .add(trade_item::Column::VenueId.is_null())
                .add(trade_item::Column::VenueId.eq(venue_id)),
        )
        .exec(db)
        .await?;

    let item = get_trade_item_by_id(db, item_id)
        .await?
        .ok_or(Error::ItemNotFound { id: item_id })?;

    if result.rows_affected == 0 {
        let venue = item.venue_id.unwrap_or_default();
        warn!("Refused to rebind trade item {item_id} from venue {venue} to {venue_id}");
        return Err(Error::AlreadyBound { id: item_id, venue });
    }

    info!("Bound trade item {item_id} to venue {venue_id}");
    Ok(item)
}

/// Finds the item currently traded in `venue_id`: the newest bound item that
/// still has quantity.
///
/// # Errors
/// Returns `Error::VenueNotBound` if no item was ever bound to the venue and
/// `Error::SoldOut` if every bound item is sold out.
pub async fn find_bound_item<C>(db: &C, venue_id: &str) -> Result<trade_item::Model>
where
    C: ConnectionTrait,
{
    let bound = TradeItem::find()
        .filter(trade_item::Column::VenueId.eq(venue_id))
        .order_by_desc(trade_item::Column::Id)
        .all(db)
        .await?;

    match bound.iter().find(|item| !item.is_sold_out()) {
        Some(item) => Ok(item.clone()),
        None => match bound.first() {
            Some(item) => Err(Error::SoldOut { id: item.id }),
            None => Err(Error::VenueNotBound {
                venue: venue_id.to_string(),
            }),
        },
    }
}

/// Records a buyer and takes one unit off the item, atomically.
///
/// # Errors
/// Returns `Error::SoldOut` if the quantity is already zero and
/// `Error::ItemNotFound` if the item does not exist.
pub async fn decrement_for_buyer(
    db: &DatabaseConnection,
    item_id: i64,
    buyer: &str,
) -> Result<trade_item::Model> {
    let txn = db.begin().await?;
    let item = decrement_for_buyer_in(&txn, item_id, buyer).await?;
    txn.commit().await?;
    Ok(item)
}

/// Decrement step usable inside a caller's ledger transaction.
///
/// The quantity check and the decrement are one statement
/// (`UPDATE ... SET quantity = quantity - 1 WHERE id = ? AND quantity > 0`); the
/// buyer row is only inserted when that statement won.
pub(crate) async fn decrement_for_buyer_in<C>(
    conn: &C,
    item_id: i64,
    buyer: &str,
) -> Result<trade_item::Model>
where
    C: ConnectionTrait,
{
    let result = TradeItem::update_many()
        .col_expr(
            trade_item::Column::Quantity,
            Expr::col(trade_item::Column::Quantity).sub(1),
        )
        .filter(trade_item::Column::Id.eq(item_id))
        .filter(trade_item::Column::Quantity.gt(0))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return match get_trade_item_by_id(conn, item_id).await? {
            Some(_) => Err(Error::SoldOut { id: item_id }),
            None => Err(Error::ItemNotFound { id: item_id }),
        };
    }

    trade_buyer::ActiveModel {
        trade_item_id: Set(item_id),
        buyer: Set(buyer.to_string()),
        purchased_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    let item = get_trade_item_by_id(conn, item_id)
        .await?
        .ok_or(Error::ItemNotFound { id: item_id })?;
    info!(
        "Sold one unit of trade item {item_id} to {buyer}, {} left",
        item.quantity
    );
    Ok(item)
}

/// Buyers of an item in purchase order.
pub async fn buyers_of(db: &DatabaseConnection, item_id: i64) -> Result<Vec<String>> {
    let buyers = TradeBuyer::find()
        .filter(trade_buyer::Column::TradeItemId.eq(item_id))
        .order_by_asc(trade_buyer::Column::Id)
        .all(db)
        .await?;
    Ok(buyers.into_iter().map(|b| b.buyer).collect())
}

/// Number of units sold so far.
pub async fn count_sold(db: &DatabaseConnection, item_id: i64) -> Result<u64> {
    TradeBuyer::find()
        .filter(trade_buyer::Column::TradeItemId.eq(item_id))
        .count(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use tokio::task::JoinSet;

    #[tokio::test]
    async fn test_create_trade_item_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let result = create_trade_item(&db, NewListing {
            price: Decimal::ZERO,
            ..listing("老王", "手办", 50, 1)
        })
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = create_trade_item(&db, NewListing {
            price: Decimal::new(1234, 3),
            ..listing("老王", "手办", 50, 1)
        })
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = create_trade_item(&db, NewListing {
            quantity: 0,
            ..listing("老王", "手办", 50, 1)
        })
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = create_trade_item(&db, NewListing {
            name: "   ".to_string(),
            ..listing("老王", "手办", 50, 1)
        })
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        let result = create_trade_item(&db, NewListing {
            price: Decimal::from_str_exact("800000000000000000000000000").unwrap(),
            ..listing("老王", "手办", 50, 1)
        })
        .await;
        assert!(matches!(result.unwrap_err(), Error::Validation { .. }));

        assert!(list_available(&db, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_trade_item_integration() -> Result<()> {
        let db = setup_test_db().await?;

        let item = create_trade_item(&db, NewListing {
            description: Some("限量版".to_string()),
            ..listing("老王", "手办", 50, 2)
        })
        .await?;

        assert_eq!(item.seller, "老王");
        assert_eq!(item.item_name, "手办");
        assert_eq!(item.price(), Decimal::from(50));
        assert_eq!(item.quantity, 2);
        assert_eq!(item.description.as_deref(), Some("限量版"));
        assert!(item.venue_id.is_none());
        assert!(item.image_ref.is_none());
        assert!(buyers_of(&db, item.id).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_list_for_seller_hides_sold_out() -> Result<()> {
        let db = setup_test_db().await?;
        let kept = create_test_item(&db, "老王", "手办", 50, 1).await?;
        let sold = create_test_item(&db, "老王", "海报", 10, 1).await?;
        create_test_item(&db, "小李", "徽章", 5, 1).await?;
        decrement_for_buyer(&db, sold.id, "买家").await?;

        let items = list_for_seller(&db, "老王").await?;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, kept.id);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_available_filter_is_case_sensitive() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_item(&db, "老王", "Figure A", 50, 1).await?;
        create_test_item(&db, "老王", "figure b", 50, 1).await?;
        create_test_item(&db, "老王", "海报", 10, 1).await?;

        assert_eq!(list_available(&db, None).await?.len(), 3);

        let filtered = list_available(&db, Some("Figure")).await?;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].item_name, "Figure A");

        assert_eq!(list_available(&db, Some("海")).await?.len(), 1);
        assert!(list_available(&db, Some("不存在")).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_attach_image_targets_oldest_pending_item() -> Result<()> {
        let db = setup_test_db().await?;
        let blobs = MemoryBlobStore::default();
        let first = create_test_item(&db, "老王", "手办", 50, 1).await?;
        let second = create_test_item(&db, "老王", "海报", 10, 1).await?;

        let updated = attach_image(&db, &blobs, "老王", b"jpeg-1").await?;
        assert_eq!(updated.id, first.id);
        let reference = updated.image_ref.clone().unwrap();
        assert_eq!(blobs.load(&reference).await?, b"jpeg-1".to_vec());

        let updated = attach_image(&db, &blobs, "老王", b"jpeg-2").await?;
        assert_eq!(updated.id, second.id);

        let result = attach_image(&db, &blobs, "老王", b"jpeg-3").await;
        assert!(matches!(
            result.unwrap_err(),
            Error::PendingItemNotFound { .. }
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_attach_image_without_pending_item_stores_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let blobs = MemoryBlobStore::default();

        let result = attach_image(&db, &blobs, "nobody", b"jpeg").await;
        assert!(matches!(
            result.unwrap_err(),
            Error::PendingItemNotFound { .. }
        ));
        assert_eq!(blobs.len().await, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_bind_to_venue() -> Result<()> {
        let db = setup_test_db().await?;
        let item = create_test_item(&db, "老王", "手办", 50, 1).await?;

        let bound = bind_to_venue(&db, item.id, "group-1").await?;
        assert_eq!(bound.venue_id.as_deref(), Some("group-1"));

        // Same venue again is accepted
        bind_to_venue(&db, item.id, "group-1").await?;

        let result = bind_to_venue(&db, item.id, "group-2").await;
        assert!(matches!(
            result.unwrap_err(),
            Error::AlreadyBound { id, venue } if id == item.id && venue == "group-1"
        ));

        let result = bind_to_venue(&db, 999, "group-1").await;
        assert!(matches!(result.unwrap_err(), Error::ItemNotFound { id: 999 }));

        Ok(())
    }

    #[tokio::test]
    async fn test_find_bound_item() -> Result<()> {
        let db = setup_test_db().await?;
        let result = find_bound_item(&db, "group-1").await;
        assert!(matches!(result.unwrap_err(), Error::VenueNotBound { .. }));

        let item = create_test_item(&db, "老王", "手办", 50, 1).await?;
        bind_to_venue(&db, item.id, "group-1").await?;
        assert_eq!(find_bound_item(&db, "group-1").await?.id, item.id);

        decrement_for_buyer(&db, item.id, "买家").await?;
        let result = find_bound_item(&db, "group-1").await;
        assert!(matches!(result.unwrap_err(), Error::SoldOut { .. }));

        Ok(())
    }

    #[tokio::test]
    async fn test_decrement_records_buyers_in_order() -> Result<()> {
        let db = setup_test_db().await?;
        let item = create_test_item(&db, "老王", "手办", 50, 2).await?;

        let after_first = decrement_for_buyer(&db, item.id, "甲").await?;
        assert_eq!(after_first.quantity, 1);
        let after_second = decrement_for_buyer(&db, item.id, "乙").await?;
        assert_eq!(after_second.quantity, 0);

        let result = decrement_for_buyer(&db, item.id, "丙").await;
        assert!(matches!(result.unwrap_err(), Error::SoldOut { .. }));

        assert_eq!(buyers_of(&db, item.id).await?, vec!["甲", "乙"]);
        assert_eq!(count_sold(&db, item.id).await?, 2);

        let result = decrement_for_buyer(&db, 999, "甲").await;
        assert!(matches!(result.unwrap_err(), Error::ItemNotFound { id: 999 }));

        Ok(())
    }

    async fn assert_decrements_never_oversell(db: DatabaseConnection) -> Result<()> {
        const UNITS: i32 = 8;
        let item_id = create_test_item(&db, "老王", "手办", 50, UNITS).await?.id;

        let mut tasks = JoinSet::new();
        for buyer in 0..=UNITS {
            let db = db.clone();
            tasks.spawn(async move {
                decrement_for_buyer(&db, item_id, &format!("buyer-{buyer}")).await
            });
        }

        let mut sold = 0;
        let mut sold_out = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined.unwrap() {
                Ok(_) => sold += 1,
                Err(Error::SoldOut { .. }) => sold_out += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(sold, UNITS);
        assert_eq!(sold_out, 1);
        let item = get_trade_item_by_id(&db, item_id).await?.unwrap();
        assert_eq!(item.quantity, 0);
        assert_eq!(buyers_of(&db, item_id).await?.len(), UNITS as usize);

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_decrements_never_oversell() -> Result<()> {
        assert_decrements_never_oversell(setup_test_db().await?).await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_decrements_across_connections() -> Result<()> {
        let (db, _dir) = setup_file_test_db().await?;
        assert_decrements_never_oversell(db).await
    }
}
