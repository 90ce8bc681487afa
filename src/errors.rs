//! Unified error type for `TradeBuddy`.
//!
//! Business-rule failures carry the data needed to render a user-facing reply;
//! storage failures are grouped so the bot layer can answer with a generic
//! retry-later message instead of leaking internals.

use rust_decimal::Decimal;
use thiserror::Error;

/// Every failure the catalog, code issuer, and bot layer can report.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Field-level input problem (price, quantity, amount, name).
    #[error("Validation error: {reason}")]
    Validation {
        /// User-facing explanation
        reason: String,
    },

    /// No trade item with this id.
    #[error("Trade item {id} not found")]
    ItemNotFound {
        /// Requested item id
        id: i64,
    },

    /// The seller has no item still waiting for an image.
    #[error("No pending trade item without an image for seller {seller}")]
    PendingItemNotFound {
        /// Seller identity that uploaded the image
        seller: String,
    },

    /// No redemption code with this string.
    #[error("Redemption code {code} not found")]
    CodeNotFound {
        /// Code string as typed by the user
        code: String,
    },

    /// No unused redemption code matches the amount.
    #[error("No unused redemption code for amount {amount}")]
    NoCodeForAmount {
        /// Requested amount
        amount: Decimal,
    },

    /// No trade item is bound to the venue.
    #[error("No trade item is bound to venue {venue}")]
    VenueNotBound {
        /// Venue (group) id
        venue: String,
    },

    /// The item is already bound to a different venue.
    #[error("Trade item {id} is already bound to venue {venue}")]
    AlreadyBound {
        /// Item id
        id: i64,
        /// Venue the item is currently bound to
        venue: String,
    },

    /// The redemption code was consumed before.
    #[error("Redemption code {code} has already been used")]
    CodeAlreadyUsed {
        /// Code string
        code: String,
    },

    /// The item has no remaining quantity.
    #[error("Trade item {id} is sold out")]
    SoldOut {
        /// Item id
        id: i64,
    },

    /// The code's amount does not equal the bound item's price.
    #[error("Code amount {code_amount} does not match item price {price}")]
    AmountMismatch {
        /// Amount carried by the code
        code_amount: Decimal,
        /// Price of the bound item
        price: Decimal,
    },

    /// A unique code could not be generated.
    #[error("Could not generate a unique redemption code after {attempts} attempts")]
    CodeGeneration {
        /// Number of attempts made
        attempts: usize,
    },

    /// Ledger failure.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Blob store failure.
    #[error("Blob store error: {message}")]
    Blob {
        /// What went wrong
        message: String,
    },

    /// Messaging transport failure.
    #[error("Gateway error: {message}")]
    Gateway {
        /// What went wrong
        message: String,
    },

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing environment variable.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Serenity/Poise failure.
    #[error("Serenity/Poise framework error: {0}")]
    #[allow(clippy::enum_variant_names)]
    FrameworkError(Box<poise::serenity_prelude::Error>),
}

impl Error {
    /// Whether the error comes from the storage boundary (ledger, blobs, disk)
    /// rather than from a business rule.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Blob { .. } | Self::Io(_) | Self::CodeGeneration { .. }
        )
    }
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::FrameworkError(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
