//! Core business logic - framework-agnostic marketplace operations.
//!
//! Every function takes the ledger connection explicitly; nothing here knows
//! about the chat transport.

/// Trade item lifecycle: creation, listing, images, venue binding, sales
pub mod catalog;
/// Redemption code issue, lookup, redemption, and group-trade settlement
pub mod codes;
/// Read-only game-session history report
pub mod history;
/// Decimal amounts and ledger cents
pub mod money;
/// Price list bulletin
pub mod notice;
/// Chat text to typed commands
pub mod parser;
/// Payment envelope amount extraction
pub mod transfer;
