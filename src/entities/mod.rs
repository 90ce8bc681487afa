//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the ledger tables the marketplace reads and writes.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod notice;
pub mod redemption_code;
pub mod session_record;
pub mod trade_buyer;
pub mod trade_item;

// Re-export specific types to avoid conflicts
pub use notice::{Column as NoticeColumn, Entity as Notice, Model as NoticeModel};
pub use redemption_code::{
    Column as RedemptionCodeColumn, Entity as RedemptionCode, Model as RedemptionCodeModel,
};
pub use session_record::{
    Column as SessionRecordColumn, Entity as SessionRecord, Model as SessionRecordModel,
};
pub use trade_buyer::{Column as TradeBuyerColumn, Entity as TradeBuyer, Model as TradeBuyerModel};
pub use trade_item::{Column as TradeItemColumn, Entity as TradeItem, Model as TradeItemModel};
