use std::collections::HashMap;
use std::sync::Arc;

use teloxide::types::ChatId;
use tokio::sync::RwLock;

use crate::availability::SlotGrid;
use crate::booking::{BookingEvent, EventSender};
use crate::config::Config;
use crate::database::Database;
use crate::models::BookingSession;

type SessionMap = Arc<RwLock<HashMap<ChatId, BookingSession>>>;

/// Shared handle threaded through every handler: database, configuration,
/// the per-client session store, and the change-event sender.
///
/// Sessions are keyed by chat id behind one `RwLock`; each client only ever
/// touches its own entry, so concurrent flows do not interfere.
#[derive(Clone)]
pub struct BotState {
    pub db: Database,
    pub config: Arc<Config>,
    sessions: SessionMap,
    events: EventSender,
}

impl BotState {
    pub fn new(db: Database, config: Arc<Config>, events: EventSender) -> Self {
        Self {
            db,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            events,
        }
    }

    pub fn slot_grid(&self) -> SlotGrid {
        SlotGrid::new(
            self.config.work_start,
            self.config.work_end,
            self.config.slot_step_minutes,
            self.config.min_booking_minutes,
        )
    }

    pub async fn session(&self, chat_id: ChatId) -> Option<BookingSession> {
        self.sessions.read().await.get(&chat_id).cloned()
    }

    /// Replaces the client's session. A new interaction from the same client
    /// overwrites the old session; there is never more than one per client.
    pub async fn set_session(&self, chat_id: ChatId, session: BookingSession) {
        self.sessions.write().await.insert(chat_id, session);
    }

    pub async fn clear_session(&self, chat_id: ChatId) {
        self.sessions.write().await.remove(&chat_id);
    }

    pub fn emit(&self, event: BookingEvent) {
        // The receiver lives for the whole process; a send failure means
        // shutdown is in progress and the event is only worth a log line.
        if let Err(e) = self.events.send(event) {
            log::error!("Event channel closed, dropping event: {}", e);
        }
    }

    pub fn is_admin(&self, chat_id: ChatId) -> bool {
        self.config.is_admin(chat_id.0)
    }
}
