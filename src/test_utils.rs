//! Shared test utilities for `TradeBuddy`.
//!
//! In-memory ledger setup, entity helpers with sensible defaults, and fakes for
//! the transport capabilities.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use crate::{
    bot::gateway::{BlobStore, ContactRef, GroupRef, MessagingGateway},
    core::catalog::{self, NewListing},
    entities::{session_record, trade_item},
    errors::{Error, Result},
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, DatabaseConnection, Set};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// The pool holds a single connection: every connection to `sqlite::memory:`
/// would otherwise see its own empty database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database behind the default multi-connection
/// pool, so concurrent tasks really run on separate connections.
///
/// The returned directory owns the database file and must outlive the connection.
pub async fn setup_file_test_db() -> Result<(DatabaseConnection, tempfile::TempDir)> {
    let dir = tempfile::tempdir()?;
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("ledger.db").display());
    let mut options = ConnectOptions::new(url);
    options.sqlx_logging(false);
    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, dir))
}

/// Listing input with whole-unit price and no description.
#[must_use]
pub fn listing(seller: &str, name: &str, price: i64, quantity: i32) -> NewListing {
    NewListing {
        seller: seller.to_string(),
        name: name.to_string(),
        description: None,
        price: Decimal::from(price),
        quantity,
    }
}

/// Creates a trade item through the catalog.
pub async fn create_test_item(
    db: &DatabaseConnection,
    seller: &str,
    name: &str,
    price: i64,
    quantity: i32,
) -> Result<trade_item::Model> {
    catalog::create_trade_item(db, listing(seller, name, price, quantity)).await
}

/// Inserts a finished game session for the history report.
pub async fn create_test_session(
    db: &DatabaseConnection,
    player: &str,
    order_type: &str,
    game_id: &str,
    star_cost: i64,
    stars: i64,
) -> Result<session_record::Model> {
    session_record::ActiveModel {
        player: Set(player.to_string()),
        order_type: Set(order_type.to_string()),
        game_id: Set(game_id.to_string()),
        star_cost: Set(star_cost),
        stars: Set(stars),
        final_rank: Set("第一".to_string()),
        is_active: Set(false),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Something the fake gateway was asked to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text { target: String, text: String },
    Image { target: String, image: Vec<u8> },
}

/// Gateway fake that records outgoing messages.
#[derive(Debug, Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<Sent>>,
    groups: Mutex<Vec<GroupRef>>,
    contacts: Mutex<Vec<ContactRef>>,
}

impl RecordingGateway {
    /// Marks a group as administered by the bot account.
    pub fn add_group(&self, id: &str) {
        self.groups.lock().unwrap().push(GroupRef {
            id: id.to_string(),
            name: id.to_string(),
        });
    }

    pub fn add_contact(&self, id: &str, nickname: &str) {
        self.contacts.lock().unwrap().push(ContactRef {
            id: id.to_string(),
            nickname: nickname.to_string(),
        });
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Texts sent to `target`, in order.
    pub fn texts_to(&self, target: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Text { target: t, text } if t == target => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Images sent to `target`, in order.
    pub fn images_to(&self, target: &str) -> Vec<Vec<u8>> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Image { target: t, image } if t == target => Some(image),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessagingGateway for RecordingGateway {
    async fn send_text(&self, target: &str, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Text {
            target: target.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_image(&self, target: &str, image: &[u8]) -> Result<()> {
        self.sent.lock().unwrap().push(Sent::Image {
            target: target.to_string(),
            image: image.to_vec(),
        });
        Ok(())
    }

    async fn list_groups(&self) -> Result<Vec<GroupRef>> {
        Ok(self.groups.lock().unwrap().clone())
    }

    async fn list_contacts(&self) -> Result<Vec<ContactRef>> {
        Ok(self.contacts.lock().unwrap().clone())
    }
}

/// Blob store fake keeping images in memory.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<tokio::sync::Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub async fn len(&self) -> usize {
        self.blobs.lock().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, bytes: &[u8]) -> Result<String> {
        let mut blobs = self.blobs.lock().await;
        let reference = format!("blob-{}", blobs.len() + 1);
        blobs.insert(reference.clone(), bytes.to_vec());
        Ok(reference)
    }

    async fn load(&self, reference: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::Blob {
                message: format!("no blob {reference}"),
            })
    }
}
