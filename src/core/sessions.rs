//! Per-user conversation slots.
//!
//! Each user owns one async mutex for as long as the process runs. The dispatcher
//! holds it for the whole handling of an event, which serializes events from the
//! same user while other users proceed independently.

use crate::{core::conversation::ConversationState, entities::UserId};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Conversation states keyed by user.
#[derive(Debug, Default)]
pub struct SessionTable {
    slots: DashMap<UserId, Arc<Mutex<ConversationState>>>,
}

impl SessionTable {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `user_id`'s state.
    ///
    /// Slots are never removed, only reset, so two callers can never end up holding
    /// different mutexes for the same user.
    pub async fn lock(&self, user_id: UserId) -> OwnedMutexGuard<ConversationState> {
        let slot = Arc::clone(
            self.slots
                .entry(user_id)
                .or_insert_with(|| Arc::new(Mutex::new(ConversationState::default())))
                .value(),
        );
        slot.lock_owned().await
    }

    /// Copy of the current state, for inspection.
    pub async fn snapshot(&self, user_id: UserId) -> ConversationState {
        self.lock(user_id).await.clone()
    }
}
