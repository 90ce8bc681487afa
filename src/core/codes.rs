//! Redemption code business logic - Issues and consumes proof-of-payment codes.
//!
//! A code is issued for every nonzero transfer and consumed exactly once, either
//! by a plain redemption or by settling the trade bound to a venue. Consumption
//! is a compare-and-set on the `used` flag, so concurrent redemptions of the same
//! code cannot both succeed.

use crate::{
    core::{catalog, money},
    entities::{RedemptionCode, redemption_code, trade_item},
    errors::{Error, Result},
};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, SqlErr, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, warn};

/// Number of digits in a generated code.
pub const CODE_LENGTH: usize = 12;

/// Attempts before giving up on finding an unused code string.
const MAX_ISSUE_ATTEMPTS: usize = 8;

/// Outcome of a settled group trade.
#[derive(Debug, Clone)]
pub struct Settlement {
    /// Amount carried by the consumed code
    pub amount: Decimal,
    /// Item state after the sale
    pub item: trade_item::Model,
}

/// Issues a fresh unused code for `amount` and returns the code string.
///
/// # Errors
/// Returns `Error::Validation` for a non-positive amount and
/// `Error::CodeGeneration` if every generated string collided.
pub async fn issue_code(db: &DatabaseConnection, amount: Decimal) -> Result<String> {
    issue_code_with(db, amount, generate_code).await
}

async fn issue_code_with<F>(
    db: &DatabaseConnection,
    amount: Decimal,
    mut generate: F,
) -> Result<String>
where
    F: FnMut() -> String,
{
    let amount_cents = money::to_positive_cents(amount)?;

    for attempt in 1..=MAX_ISSUE_ATTEMPTS {
        let code = generate();
        let inserted = redemption_code::ActiveModel {
            code: Set(code.clone()),
            amount_cents: Set(amount_cents),
            used: Set(false),
            created_at: Set(chrono::Utc::now()),
            redeemed_at: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await;

        match inserted {
            Ok(_) => {
                info!("Issued redemption code {code} for {amount}");
                return Ok(code);
            }
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                warn!("Redemption code collision on attempt {attempt}, regenerating");
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::CodeGeneration {
        attempts: MAX_ISSUE_ATTEMPTS,
    })
}

/// Random numeric code without a leading zero.
fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    let mut code = String::with_capacity(CODE_LENGTH);
    code.push(char::from(b'0' + rng.gen_range(1..=9)));
    for _ in 1..CODE_LENGTH {
        code.push(char::from(b'0' + rng.gen_range(0..=9)));
    }
    code
}

/// Returns the oldest unused code whose amount equals `amount` exactly.
///
/// # Errors
/// Returns `Error::NoCodeForAmount` if none exists.
pub async fn lookup_unused_by_amount(db: &DatabaseConnection, amount: Decimal) -> Result<String> {
    let not_found = || Error::NoCodeForAmount { amount };
    let amount_cents = money::to_positive_cents(amount).map_err(|_| not_found())?;

    RedemptionCode::find()
        .filter(redemption_code::Column::AmountCents.eq(amount_cents))
        .filter(redemption_code::Column::Used.eq(false))
        .order_by_asc(redemption_code::Column::Id)
        .one(db)
        .await?
        .map(|c| c.code)
        .ok_or_else(not_found)
}

/// Finds a code by its string.
pub async fn get_code<C>(db: &C, code: &str) -> Result<Option<redemption_code::Model>>
where
    C: ConnectionTrait,
{
    RedemptionCode::find()
        .filter(redemption_code::Column::Code.eq(code))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Consumes a code and returns its amount.
///
/// # Errors
/// Returns `Error::CodeNotFound` for an unknown code and
/// `Error::CodeAlreadyUsed` if it was consumed before.
pub async fn redeem_code(db: &DatabaseConnection, code: &str) -> Result<Decimal> {
    if mark_used(db, code).await? {
        let redeemed = get_code(db, code).await?.ok_or_else(|| Error::CodeNotFound {
            code: code.to_string(),
        })?;
        info!("Redeemed code {code} for {}", redeemed.amount());
        return Ok(redeemed.amount());
    }

    Err(classify_unusable(db, code).await?)
}

/// Sets `used` only if it is still false; true when this call won.
async fn mark_used<C>(conn: &C, code: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let result = RedemptionCode::update_many()
        .col_expr(redemption_code::Column::Used, Expr::value(true))
        .col_expr(
            redemption_code::Column::RedeemedAt,
            Expr::value(Some(chrono::Utc::now())),
        )
        .filter(redemption_code::Column::Code.eq(code))
        .filter(redemption_code::Column::Used.eq(false))
        .exec(conn)
        .await?;
    Ok(result.rows_affected == 1)
}

async fn classify_unusable<C>(conn: &C, code: &str) -> Result<Error>
where
    C: ConnectionTrait,
{
    Ok(match get_code(conn, code).await? {
        Some(_) => Error::CodeAlreadyUsed {
            code: code.to_string(),
        },
        None => Error::CodeNotFound {
            code: code.to_string(),
        },
    })
}

/// Consumes `code` against the item bound to `venue_id` and sells one unit to
/// `buyer`.
///
/// Runs in one ledger transaction: the code is only consumed if the sale is
/// recorded too. A mismatching amount leaves both code and item untouched.
///
/// # Errors
/// `CodeNotFound`, `CodeAlreadyUsed`, `VenueNotBound`, `AmountMismatch` or
/// `SoldOut` for business-rule failures; storage errors otherwise.
pub async fn settle_group_trade(
    db: &DatabaseConnection,
    venue_id: &str,
    code: &str,
    buyer: &str,
) -> Result<Settlement> {
    let txn = db.begin().await?;

    let redemption = get_code(&txn, code)
        .await?
        .ok_or_else(|| Error::CodeNotFound {
            code: code.to_string(),
        })?;
    if redemption.used {
        return Err(Error::CodeAlreadyUsed {
            code: code.to_string(),
        });
    }

    let item = catalog::find_bound_item(&txn, venue_id).await?;
    if redemption.amount_cents != item.price_cents {
        warn!(
            "Code {code} amount {} does not match item {} price {}",
            redemption.amount(),
            item.id,
            item.price()
        );
        return Err(Error::AmountMismatch {
            code_amount: redemption.amount(),
            price: item.price(),
        });
    }

    if !mark_used(&txn, code).await? {
        return Err(Error::CodeAlreadyUsed {
            code: code.to_string(),
        });
    }
    let item = catalog::decrement_for_buyer_in(&txn, item.id, buyer).await?;

    txn.commit().await?;

    info!(
        "Settled trade of item {} in venue {venue_id} for {buyer} with code {code}",
        item.id
    );
    Ok(Settlement {
        amount: redemption.amount(),
        item,
    })
}
