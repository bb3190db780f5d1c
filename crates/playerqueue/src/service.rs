//! Chat and moderation use cases.
//!
//! [`PlayerQueue`] is the layer between callers (the connection handler
//! for chat, an admin surface for moderation) and the [`Coordinator`]: it
//! validates input, asks the [`Authorizer`], persists through the
//! [`ChatStore`] and [`ProfileProvider`], and only then changes live
//! state. Every failure is a [`PlayerQueueError`] whose
//! [`status_code`](PlayerQueueError::status_code) an HTTP layer can return
//! as is.

use std::sync::Arc;

use chrono::Utc;
use playerqueue_client::{Profile, QueueClient};
use playerqueue_protocol::{ChatLogEntry, ChatStatus, SteamId};

use crate::chat::sanitize;
use crate::{
    Authorizer, ChatStore, Coordinator, ModerationAction, PlayerQueueError, ProfileProvider,
    QueueConfig,
};

/// The player queue service: a [`Coordinator`] plus its collaborators.
pub struct PlayerQueue<S, P, Z> {
    coordinator: Arc<Coordinator>,
    store: S,
    profiles: P,
    authorizer: Z,
    recent_default_limit: usize,
    history_size: usize,
}

impl<S, P, Z> PlayerQueue<S, P, Z>
where
    S: ChatStore,
    P: ProfileProvider,
    Z: Authorizer,
{
    pub fn new(
        coordinator: Arc<Coordinator>,
        store: S,
        profiles: P,
        authorizer: Z,
        config: &QueueConfig,
    ) -> Self {
        Self {
            coordinator,
            store,
            profiles,
            authorizer,
            recent_default_limit: config.recent_default_limit.max(1),
            history_size: config.chat_history_size,
        }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn profiles(&self) -> &P {
        &self.profiles
    }

    /// Fills the coordinator's chat history from persistence.
    pub async fn seed_history(&self) -> Result<usize, PlayerQueueError> {
        let entries = self.store.recent(self.history_size).await?;
        let count = entries.len();
        self.coordinator.seed_history(entries);
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    /// Posts a message on behalf of a connected client.
    ///
    /// # Errors
    /// - [`PlayerQueueError::PermissionDenied`] if the client may not post
    /// - [`PlayerQueueError::BadInput`] if nothing is left after sanitizing
    /// - [`PlayerQueueError::Collaborator`] if the store fails
    pub async fn add_message(
        &self,
        author: &dyn QueueClient,
        body: &str,
    ) -> Result<ChatLogEntry, PlayerQueueError> {
        if !author.chat_status().can_post() {
            return Err(PlayerQueueError::PermissionDenied);
        }
        let body_md = sanitize(body)?;

        let member = author.member();
        let entry = ChatLogEntry {
            message_id: 0,
            steam_id: member.steam_id,
            created_on: Utc::now(),
            personaname: member.name,
            avatarhash: member.hash,
            permission_level: author.permission_level(),
            body_md,
            deleted: false,
        };
        let saved = self.store.save(entry).await?;
        self.coordinator.message(saved.clone());
        Ok(saved)
    }

    /// The newest `limit` persisted messages, oldest first. Zero means the
    /// configured default.
    pub async fn recent(&self, limit: usize) -> Result<Vec<ChatLogEntry>, PlayerQueueError> {
        let limit = if limit == 0 {
            self.recent_default_limit
        } else {
            limit
        };
        Ok(self.store.recent(limit).await?)
    }

    // -----------------------------------------------------------------------
    // Moderation
    // -----------------------------------------------------------------------

    /// Removes up to `count` of the newest messages written by the author
    /// of `anchor_id`. Returns the removed ids.
    pub async fn purge(
        &self,
        actor: SteamId,
        anchor_id: i64,
        count: usize,
    ) -> Result<Vec<i64>, PlayerQueueError> {
        let anchor = self.store.message(anchor_id).await?;
        self.purge_author(actor, anchor.steam_id, count).await
    }

    /// Removes up to `count` of the newest cached messages by `target`.
    /// Returns the removed ids.
    pub async fn purge_author(
        &self,
        actor: SteamId,
        target: SteamId,
        count: usize,
    ) -> Result<Vec<i64>, PlayerQueueError> {
        let actor = self.actor(actor).await?;
        let target = self.profiles.profile(target).await?;
        self.authorize(&actor, &ModerationAction::Purge {
            target: target.clone(),
            count,
        })
        .await?;

        let message_ids: Vec<i64> = self
            .coordinator
            .find_messages(target.steam_id, count)
            .into_iter()
            .map(|e| e.message_id)
            .collect();
        if message_ids.is_empty() {
            return Ok(message_ids);
        }

        self.store.delete(&message_ids).await?;
        self.coordinator.purge_messages(&message_ids);
        tracing::info!(
            actor = %actor.steam_id,
            target = %target.steam_id,
            purged = message_ids.len(),
            "purged messages"
        );
        Ok(message_ids)
    }

    /// Removes one message.
    pub async fn delete_message(
        &self,
        actor: SteamId,
        message_id: i64,
    ) -> Result<(), PlayerQueueError> {
        let actor = self.actor(actor).await?;
        let message = self.store.message(message_id).await?;
        if message.deleted {
            return Err(PlayerQueueError::Duplicate(format!(
                "message {message_id} already deleted"
            )));
        }
        let target = self.profiles.profile(message.steam_id).await?;
        self.authorize(&actor, &ModerationAction::DeleteMessage { target, message_id })
            .await?;

        self.store.delete(&[message_id]).await?;
        self.coordinator.purge_messages(&[message_id]);
        tracing::info!(actor = %actor.steam_id, message_id, "deleted message");
        Ok(())
    }

    /// Changes a player's chat status, persists it and notifies the player
    /// if connected.
    ///
    /// # Errors
    /// - [`PlayerQueueError::BadInput`] for an invalid target id
    /// - [`PlayerQueueError::PermissionDenied`] for a self-change or an
    ///   actor the authorizer rejects
    /// - [`PlayerQueueError::Duplicate`] if the status is already set
    pub async fn set_chat_status(
        &self,
        actor: SteamId,
        target: SteamId,
        status: ChatStatus,
        reason: &str,
    ) -> Result<(), PlayerQueueError> {
        if !target.is_valid() {
            return Err(PlayerQueueError::BadInput(format!("invalid steam id {target}")));
        }
        let actor = self.actor(actor).await?;
        if actor.steam_id == target {
            return Err(PlayerQueueError::PermissionDenied);
        }
        let target = self.profiles.profile(target).await?;
        self.authorize(&actor, &ModerationAction::SetChatStatus {
            target: target.clone(),
            status,
        })
        .await?;

        if target.chat_status == status {
            return Err(PlayerQueueError::Duplicate(format!(
                "{} already has status {status}",
                target.steam_id
            )));
        }

        self.profiles.set_chat_status(target.steam_id, status).await?;
        self.coordinator
            .update_chat_status(target.steam_id, status, reason);
        tracing::info!(
            actor = %actor.steam_id,
            target = %target.steam_id,
            from = %target.chat_status,
            to = %status,
            reason,
            "chat status set"
        );
        Ok(())
    }

    async fn actor(&self, steam_id: SteamId) -> Result<Profile, PlayerQueueError> {
        if !steam_id.is_valid() {
            return Err(PlayerQueueError::Unauthenticated);
        }
        Ok(self.profiles.profile(steam_id).await?)
    }

    async fn authorize(
        &self,
        actor: &Profile,
        action: &ModerationAction,
    ) -> Result<(), PlayerQueueError> {
        if self.authorizer.authorize(actor, action).await {
            Ok(())
        } else {
            tracing::warn!(
                actor = %actor.steam_id,
                target = %action.target().steam_id,
                "moderation denied"
            );
            Err(PlayerQueueError::PermissionDenied)
        }
    }
}
