//! Bot layer - transport-facing interface of `TradeBuddy`
//!
//! Inbound chat messages are converted into [`gateway::InboundMessage`] values and
//! handed to the [`router::ConversationRouter`], which talks back through the
//! [`gateway::MessagingGateway`] capability.

/// Filesystem image store
pub mod blob_store;
/// Discord implementation of the messaging gateway and the event loop
pub mod discord;
/// Transport capabilities and inbound message types
pub mod gateway;
/// User-facing reply texts
pub mod replies;
/// Command dispatch and reply rendering
pub mod router;

use router::ConversationRouter;

/// Shared data available to every event handler.
pub struct BotData {
    /// Router holding the ledger connection and transport capabilities
    pub router: ConversationRouter,
}

impl BotData {
    /// Creates a new `BotData` instance around the router built at startup.
    #[must_use]
    pub const fn new(router: ConversationRouter) -> Self {
        Self { router }
    }
}
