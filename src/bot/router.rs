//! Conversation router - turns inbound chat messages into catalog and code
//! operations and sends the replies.
//!
//! Each message is handled on its own: whatever goes wrong is logged and, where
//! it makes sense, reported back to the sender, and never escapes `handle`.

use crate::{
    bot::{
        gateway::{BlobStore, InboundMessage, MessageBody, MessagingGateway},
        replies,
    },
    config::app::AppConfig,
    core::{
        catalog::{self, NewListing},
        codes, history, notice,
        parser::{self, ChatContext, Command, NewTradeItem},
        transfer,
    },
    entities::trade_item,
    errors::{Error, Result},
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Dispatches parsed commands against the ledger and answers through the gateway.
#[derive(Clone)]
pub struct ConversationRouter {
    database: DatabaseConnection,
    gateway: Arc<dyn MessagingGateway>,
    blobs: Arc<dyn BlobStore>,
    config: Arc<AppConfig>,
}

impl ConversationRouter {
    /// Creates a router over an open ledger and the transport capabilities.
    #[must_use]
    pub fn new(
        database: DatabaseConnection,
        gateway: Arc<dyn MessagingGateway>,
        blobs: Arc<dyn BlobStore>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            database,
            gateway,
            blobs,
            config,
        }
    }

    /// Settings the router was built with.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Handles one inbound message. Failures are contained here.
    pub async fn handle(&self, message: &InboundMessage) {
        let Err(e) = self.dispatch(message).await else {
            return;
        };

        if e.is_storage() {
            error!("Failed to handle message from {}: {e}", message.sender.nickname);
        } else {
            info!("Rejected message from {}: {e}", message.sender.nickname);
        }
        self.reply(message, &replies::error(&e)).await;
    }

    async fn dispatch(&self, message: &InboundMessage) -> Result<()> {
        let context = match message.group_id() {
            Some(_) => ChatContext::Group,
            None => ChatContext::Private,
        };

        let command = match &message.body {
            MessageBody::Text(text) => match parser::parse(text, context) {
                Ok(command) => command,
                Err(malformed) => {
                    self.reply(message, &malformed.reason).await;
                    return Ok(());
                }
            },
            MessageBody::Image(_) => Command::AttachImage,
            MessageBody::Transfer(payload) => Command::NotifyTransfer {
                payload: payload.clone(),
            },
        };

        match command {
            Command::ShowPriceList => self.show_price_list(message).await,
            Command::ShowHistory => self.show_history(message).await,
            Command::AttachImage => self.attach_image(message).await,
            Command::NotifyTransfer { payload } => self.notify_transfer(message, &payload).await,
            Command::ShowHelp => {
                self.reply(message, replies::HELP).await;
                Ok(())
            }
            Command::RechargeByAmount { amount } => self.recharge(message, amount).await,
            Command::CreateTradeItem(new_item) => self.create_trade_item(message, new_item).await,
            Command::ListMyTradeItems => self.list_my_items(message).await,
            Command::ListTradeZone { filter } => self.list_trade_zone(message, filter).await,
            Command::ShowTradeItem { id } => self.show_trade_item(message, id).await,
            Command::StartTrade { id, price, .. } => self.start_trade(message, id, price).await,
            Command::RedeemCode { code } => self.redeem(message, &code).await,
            Command::NoMatch => Ok(()),
        }
    }

    async fn show_price_list(&self, message: &InboundMessage) -> Result<()> {
        let text = notice::get_price_list(&self.database).await?;
        self.reply(message, text.as_deref().unwrap_or(replies::NO_PRICE_LIST))
            .await;
        Ok(())
    }

    async fn show_history(&self, message: &InboundMessage) -> Result<()> {
        let sender = self.gateway.current_sender_identity(message);
        let report = history::generate_history_report(&self.database, &sender.nickname).await?;
        self.reply(message, &replies::history(&report)).await;
        Ok(())
    }

    async fn attach_image(&self, message: &InboundMessage) -> Result<()> {
        let MessageBody::Image(bytes) = &message.body else {
            return Ok(());
        };
        let sender = self.gateway.current_sender_identity(message);

        let item = match catalog::attach_image(
            &self.database,
            self.blobs.as_ref(),
            &sender.nickname,
            bytes,
        )
        .await
        {
            Ok(item) => item,
            Err(Error::PendingItemNotFound { .. }) if message.group_id().is_some() => {
                debug!("Ignoring group image from {}: no pending item", sender.nickname);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let text = if message.group_id().is_some() {
            replies::image_attached_group(&item.item_name)
        } else {
            replies::image_attached_private(&item.item_name)
        };
        self.reply(message, &text).await;
        Ok(())
    }

    async fn notify_transfer(&self, message: &InboundMessage, payload: &str) -> Result<()> {
        let amount = transfer::extract_transfer_amount(payload);
        if amount.is_zero() {
            info!("Transfer from {} carried no payable amount", message.sender.nickname);
            return Ok(());
        }

        match message.group_id() {
            None => {
                let code = codes::issue_code(&self.database, amount).await?;
                self.reply(message, &replies::redemption_code(&code)).await;
                self.reply(message, replies::CODE_HINT).await;
            }
            Some(group_id) => {
                if self.is_administered(group_id).await {
                    info!("Suppressed transfer acknowledgement in administered group {group_id}");
                } else {
                    self.reply(message, &replies::payment_received(amount)).await;
                }
            }
        }
        Ok(())
    }

    async fn recharge(&self, message: &InboundMessage, amount: Decimal) -> Result<()> {
        let code = codes::lookup_unused_by_amount(&self.database, amount).await?;
        self.reply(
            message,
            &format!("{}，{}", replies::redemption_code(&code), replies::CODE_HINT),
        )
        .await;
        Ok(())
    }

    async fn create_trade_item(
        &self,
        message: &InboundMessage,
        new_item: NewTradeItem,
    ) -> Result<()> {
        let seller = match new_item.seller {
            Some(seller) => seller,
            None => self.gateway.current_sender_identity(message).nickname,
        };
        let quantity = i32::try_from(new_item.quantity).map_err(|_| Error::Validation {
            reason: format!("数量过大：{}", new_item.quantity),
        })?;

        let item = catalog::create_trade_item(
            &self.database,
            NewListing {
                seller,
                name: new_item.name,
                description: new_item.description,
                price: new_item.price,
                quantity,
            },
        )
        .await?;

        self.reply(message, &replies::item_created(&item)).await;
        Ok(())
    }

    async fn list_my_items(&self, message: &InboundMessage) -> Result<()> {
        let sender = self.gateway.current_sender_identity(message);
        let items = catalog::list_for_seller(&self.database, &sender.nickname).await?;
        if items.is_empty() {
            self.reply(message, replies::NO_OWN_ITEMS).await;
            return Ok(());
        }

        for item in items {
            let sold = catalog::count_sold(&self.database, item.id).await?;
            self.reply(message, &replies::own_item_line(&item, sold)).await;
            self.send_item_image(message, &item).await;
        }
        Ok(())
    }

    async fn list_trade_zone(
        &self,
        message: &InboundMessage,
        filter: Option<String>,
    ) -> Result<()> {
        let items = catalog::list_available(&self.database, filter.as_deref()).await?;
        self.reply(message, &replies::trade_zone(&items)).await;
        Ok(())
    }

    async fn show_trade_item(&self, message: &InboundMessage, id: i64) -> Result<()> {
        let item = catalog::get_trade_item_by_id(&self.database, id)
            .await?
            .ok_or(Error::ItemNotFound { id })?;

        self.reply(message, &replies::start_trade_sentence(&item)).await;
        self.send_item_image(message, &item).await;
        self.reply(message, replies::SHOW_ITEM_HINT).await;
        Ok(())
    }

    async fn start_trade(&self, message: &InboundMessage, id: i64, price: Decimal) -> Result<()> {
        let Some(group_id) = message.group_id() else {
            return Ok(());
        };
        let listed = catalog::get_trade_item_by_id(&self.database, id)
            .await?
            .ok_or(Error::ItemNotFound { id })?;
        if listed.price() != price {
            info!(
                "Start sentence for item {id} quotes {price}, listed at {}",
                listed.price()
            );
            self.reply(message, &replies::stale_start_sentence(&listed))
                .await;
            return Ok(());
        }

        let item = catalog::bind_to_venue(&self.database, id, group_id).await?;
        self.reply(message, replies::TRADE_STARTED).await;

        let sender = self.gateway.current_sender_identity(message);
        match self.gateway.list_contacts().await {
            Ok(contacts) => match contacts.iter().find(|c| c.nickname == sender.nickname) {
                Some(contact) => {
                    self.send_text(&contact.id, &replies::private_trade_notice(&item))
                        .await;
                }
                None => warn!("{} is not a contact, skipping private trade notice", sender.nickname),
            },
            Err(e) => warn!("Failed to list contacts: {e}"),
        }

        let card = match tokio::fs::read(&self.config.contact_card).await {
            Ok(card) => self.gateway.send_image(group_id, &card).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = card {
            warn!(
                "Failed to send contact card {}: {e}",
                self.config.contact_card.display()
            );
            self.reply(message, replies::IMAGE_SEND_FAILED).await;
        }
        Ok(())
    }

    async fn redeem(&self, message: &InboundMessage, code: &str) -> Result<()> {
        let Some(group_id) = message.group_id() else {
            return Ok(());
        };
        let sender = self.gateway.current_sender_identity(message);

        let settled =
            codes::settle_group_trade(&self.database, group_id, code, &sender.nickname).await;
        let amount = match settled {
            Ok(settlement) => settlement.amount,
            Err(Error::VenueNotBound { .. }) => codes::redeem_code(&self.database, code).await?,
            Err(e) => return Err(e),
        };

        if self.is_administered(group_id).await {
            info!("Suppressed redemption confirmation in administered group {group_id}");
        } else {
            self.reply(message, &replies::payment_received(amount)).await;
        }
        Ok(())
    }

    /// Whether `group_id` is one of the groups the bot account administers.
    /// Fails closed: when the groups cannot be listed the reply is suppressed.
    async fn is_administered(&self, group_id: &str) -> bool {
        match self.gateway.list_groups().await {
            Ok(groups) => groups.iter().any(|g| g.id == group_id),
            Err(e) => {
                warn!("Failed to list groups: {e}");
                true
            }
        }
    }

    async fn send_item_image(&self, message: &InboundMessage, item: &trade_item::Model) {
        let Some(reference) = &item.image_ref else {
            return;
        };
        let sent = match self.blobs.load(reference).await {
            Ok(image) => self.gateway.send_image(message.reply_target(), &image).await,
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            warn!("Failed to send image {reference} of item {}: {e}", item.id);
        }
    }

    async fn reply(&self, message: &InboundMessage, text: &str) {
        self.send_text(message.reply_target(), text).await;
    }

    async fn send_text(&self, target: &str, text: &str) {
        if let Err(e) = self.gateway.send_text(target, text).await {
            error!("Failed to send message to {target}: {e}");
        }
    }
}
