//! Conversations between two users, optionally about a listing

use crate::core::models::{Conversation, ConversationMembers, Message, User};
use crate::core::query::QueryFeatures;
use crate::core::service::ServiceError;
use crate::storage::conversations::MESSAGE_SCHEMA;
use crate::storage::Store;
use tracing::debug;
use uuid::Uuid;

pub struct MessagingService<'a> {
    store: &'a Store,
}

impl<'a> MessagingService<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Send a first message, reusing the pair's conversation for this listing
    /// (or their listing-less one) when it exists
    pub async fn start_conversation(
        &self,
        sender: &User,
        receiver: Uuid,
        listing: Option<Uuid>,
        content: &str,
    ) -> Result<(Conversation, Message), ServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::Validation(
                "Receiver and message content are required.".to_string(),
            ));
        }
        if receiver == sender.id {
            return Err(ServiceError::Validation(
                "You cannot start a conversation with yourself.".to_string(),
            ));
        }
        if let Some(listing) = listing {
            if self.store.find_listing(listing).await?.is_none() {
                return Err(ServiceError::NotFound("Listing not found.".to_string()));
            }
        }
        if self.store.find_user(receiver).await?.is_none() {
            return Err(ServiceError::NotFound("Receiver not found.".to_string()));
        }

        let (conversation, message) = self
            .store
            .start_conversation(sender.id, receiver, listing, content)
            .await?;
        debug!("User {} messaged {} in {}", sender.id, receiver, conversation.id);
        Ok((conversation, message))
    }

    /// The user's conversations, most recently active first
    pub async fn conversations_for(&self, user: &User) -> Result<Vec<Conversation>, ServiceError> {
        Ok(self.store.list_conversations(user.id).await?)
    }

    /// Messages of a conversation the user takes part in. Everything addressed to
    /// the user is marked read first.
    pub async fn messages(
        &self,
        user: &User,
        conversation: Uuid,
        params: &[(String, String)],
    ) -> Result<Vec<Message>, ServiceError> {
        let members = self.members(conversation).await?;
        if !members.includes(user.id) {
            return Err(ServiceError::Forbidden(
                "You are not authorized to view this conversation.".to_string(),
            ));
        }
        let features = QueryFeatures::ordering(params, &MESSAGE_SCHEMA)?;

        let marked = self.store.mark_messages_read(conversation, user.id).await?;
        if marked > 0 {
            debug!("Marked {} message(s) read for {}", marked, user.id);
        }
        Ok(self.store.list_messages(conversation, &features).await?)
    }

    /// Reply in an existing conversation; the receiver is the other participant
    pub async fn send_message(
        &self,
        user: &User,
        conversation: Uuid,
        content: &str,
    ) -> Result<Message, ServiceError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ServiceError::Validation(
                "Message content cannot be empty.".to_string(),
            ));
        }
        let members = self.members(conversation).await?;
        let receiver = members.other(user.id).ok_or_else(|| {
            ServiceError::Forbidden(
                "You are not authorized to send messages in this conversation.".to_string(),
            )
        })?;

        Ok(self
            .store
            .append_message(conversation, user.id, receiver, content)
            .await?)
    }

    async fn members(&self, conversation: Uuid) -> Result<ConversationMembers, ServiceError> {
        self.store
            .find_conversation_members(conversation)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Conversation not found.".to_string()))
    }
}
