//! Conversations and their messages

use crate::core::models::{
    Conversation, ConversationMembers, ListingPreview, Message, MessagePreview, UserSummary,
};
use crate::core::query::{EntitySchema, FieldKind, FieldSpec, QueryFeatures};
use crate::storage::sql::{limit_offset, order_by};
use crate::storage::{
    conversion_error, get_id, get_json, get_opt_id, get_ts, now, ts, Store, StoreError,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

static MESSAGE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "createdAt",
        column: "m.created_at",
        kind: FieldKind::Timestamp,
        sortable: true,
    },
    FieldSpec {
        name: "isRead",
        column: "m.is_read",
        kind: FieldKind::Integer,
        sortable: true,
    },
];

/// Query surface of `GET /conversations/:id/messages` (sort and paging only)
pub static MESSAGE_SCHEMA: EntitySchema = EntitySchema::new(MESSAGE_FIELDS, &[], None, "m.rowid");

const CONVERSATION_SELECT: &str = "SELECT c.id, c.created_at, c.updated_at, \
    pa.id AS a_id, pa.name AS a_name, pa.profile_picture_url AS a_picture, pa.email AS a_email, \
    pb.id AS b_id, pb.name AS b_name, pb.profile_picture_url AS b_picture, pb.email AS b_email, \
    l.id AS listing_ref, l.title AS listing_title, l.photos AS listing_photos, \
    m.id AS last_id, m.content AS last_content, m.created_at AS last_created_at, m.is_read AS last_is_read, \
    ms.id AS last_sender_id, ms.name AS last_sender_name, ms.profile_picture_url AS last_sender_picture \
    FROM conversations c \
    JOIN users pa ON pa.id = c.participant_a \
    JOIN users pb ON pb.id = c.participant_b \
    LEFT JOIN listings l ON l.id = c.listing_id \
    LEFT JOIN messages m ON m.id = c.last_message_id \
    LEFT JOIN users ms ON ms.id = m.sender_id";

const MESSAGE_SELECT: &str = "SELECT m.id, m.conversation_id, m.content, m.is_read, m.created_at, \
    s.id AS sender_id, s.name AS sender_name, s.profile_picture_url AS sender_picture, \
    r.id AS receiver_id, r.name AS receiver_name, r.profile_picture_url AS receiver_picture \
    FROM messages m \
    JOIN users s ON s.id = m.sender_id \
    JOIN users r ON r.id = m.receiver_id";

fn participant(row: &Row<'_>, prefix: &str) -> rusqlite::Result<UserSummary> {
    Ok(UserSummary {
        id: get_id(row, &format!("{}_id", prefix))?,
        name: row.get(format!("{}_name", prefix).as_str())?,
        profile_picture_url: row.get(format!("{}_picture", prefix).as_str())?,
        location: None,
        email: row.get(format!("{}_email", prefix).as_str())?,
    })
}

fn conversation_from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let listing = match get_opt_id(row, "listing_ref")? {
        Some(id) => Some(ListingPreview {
            id,
            title: row.get("listing_title")?,
            photos: get_json(row, "listing_photos")?,
        }),
        None => None,
    };

    let last_message = match get_opt_id(row, "last_id")? {
        Some(id) => Some(MessagePreview {
            id,
            content: row.get("last_content")?,
            sender: UserSummary {
                id: get_id(row, "last_sender_id")?,
                name: row.get("last_sender_name")?,
                profile_picture_url: row.get("last_sender_picture")?,
                location: None,
                email: None,
            },
            created_at: get_ts(row, "last_created_at")?,
            is_read: row.get("last_is_read")?,
        }),
        None => None,
    };

    Ok(Conversation {
        id: get_id(row, "id")?,
        participants: vec![participant(row, "a")?, participant(row, "b")?],
        listing,
        last_message,
        created_at: get_ts(row, "created_at")?,
        updated_at: get_ts(row, "updated_at")?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: get_id(row, "id")?,
        conversation: get_id(row, "conversation_id")?,
        sender: UserSummary {
            id: get_id(row, "sender_id")?,
            name: row.get("sender_name")?,
            profile_picture_url: row.get("sender_picture")?,
            location: None,
            email: None,
        },
        receiver: UserSummary {
            id: get_id(row, "receiver_id")?,
            name: row.get("receiver_name")?,
            profile_picture_url: row.get("receiver_picture")?,
            location: None,
            email: None,
        },
        content: row.get("content")?,
        is_read: row.get("is_read")?,
        created_at: get_ts(row, "created_at")?,
    })
}

fn find_conversation_in(conn: &Connection, id: Uuid) -> Result<Option<Conversation>, StoreError> {
    Ok(conn
        .query_row(
            &format!("{} WHERE c.id = ?1", CONVERSATION_SELECT),
            [id.to_string()],
            conversation_from_row,
        )
        .optional()?)
}

fn find_message_in(conn: &Connection, id: Uuid) -> Result<Message, StoreError> {
    Ok(conn.query_row(
        &format!("{} WHERE m.id = ?1", MESSAGE_SELECT),
        [id.to_string()],
        message_from_row,
    )?)
}

/// Insert a message and make it the conversation's latest
fn append_message_in(
    conn: &Connection,
    conversation: Uuid,
    sender: Uuid,
    receiver: Uuid,
    content: &str,
) -> Result<Uuid, StoreError> {
    let id = Uuid::new_v4();
    let created = ts(&now());
    conn.execute(
        "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            id.to_string(),
            conversation.to_string(),
            sender.to_string(),
            receiver.to_string(),
            content,
            created
        ],
    )?;
    conn.execute(
        "UPDATE conversations SET last_message_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![id.to_string(), created, conversation.to_string()],
    )?;
    Ok(id)
}

/// Participants ordered the way the table stores them
fn ordered_pair(a: Uuid, b: Uuid) -> (String, String) {
    let (a, b) = (a.to_string(), b.to_string());
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl Store {
    /// Find the conversation for this pair and listing (or the pair's listing-less
    /// one), creating it when missing, and append the first message. Atomic.
    pub async fn start_conversation(
        &self,
        sender: Uuid,
        receiver: Uuid,
        listing: Option<Uuid>,
        content: &str,
    ) -> Result<(Conversation, Message), StoreError> {
        let (first, second) = ordered_pair(sender, receiver);
        let listing_key = listing.map(|id| id.to_string());

        self.with_conn(|conn| {
            let tx = conn.transaction()?;

            let existing: Option<String> = tx
                .query_row(
                    "SELECT id FROM conversations
                     WHERE participant_a = ?1 AND participant_b = ?2 AND COALESCE(listing_id, '') = COALESCE(?3, '')",
                    params![first, second, listing_key],
                    |row| row.get(0),
                )
                .optional()?;

            let conversation_id = match existing {
                Some(raw) => Uuid::parse_str(&raw)
                    .map_err(|e| StoreError::Sqlite(conversion_error(e.to_string())))?,
                None => {
                    let id = Uuid::new_v4();
                    let created = ts(&now());
                    tx.execute(
                        "INSERT INTO conversations (id, participant_a, participant_b, listing_id, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                        params![id.to_string(), first, second, listing_key, created],
                    )?;
                    id
                }
            };

            let message_id = append_message_in(&tx, conversation_id, sender, receiver, content)?;
            let conversation = find_conversation_in(&tx, conversation_id)?
                .ok_or(StoreError::Sqlite(rusqlite::Error::QueryReturnedNoRows))?;
            let message = find_message_in(&tx, message_id)?;
            tx.commit()?;
            Ok((conversation, message))
        })
        .await
    }

    pub async fn find_conversation_members(
        &self,
        id: Uuid,
    ) -> Result<Option<ConversationMembers>, StoreError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, participant_a, participant_b, listing_id FROM conversations WHERE id = ?1",
                    [id.to_string()],
                    |row| {
                        Ok(ConversationMembers {
                            id: get_id(row, "id")?,
                            participants: [get_id(row, "participant_a")?, get_id(row, "participant_b")?],
                            listing: get_opt_id(row, "listing_id")?,
                        })
                    },
                )
                .optional()?)
        })
        .await
    }

    /// A user's conversations, most recently active first
    pub async fn list_conversations(&self, user: Uuid) -> Result<Vec<Conversation>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE c.participant_a = ?1 OR c.participant_b = ?1
                 ORDER BY c.updated_at DESC, c.rowid DESC",
                CONVERSATION_SELECT
            ))?;
            let conversations = stmt
                .query_map([user.to_string()], conversation_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(conversations)
        })
        .await
    }

    /// Append a message to an existing conversation. Atomic.
    pub async fn append_message(
        &self,
        conversation: Uuid,
        sender: Uuid,
        receiver: Uuid,
        content: &str,
    ) -> Result<Message, StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let id = append_message_in(&tx, conversation, sender, receiver, content)?;
            let message = find_message_in(&tx, id)?;
            tx.commit()?;
            Ok(message)
        })
        .await
    }

    /// Mark every unread message addressed to `receiver` as read; returns how many changed
    pub async fn mark_messages_read(
        &self,
        conversation: Uuid,
        receiver: Uuid,
    ) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "UPDATE messages SET is_read = 1
                 WHERE conversation_id = ?1 AND receiver_id = ?2 AND is_read = 0",
                params![conversation.to_string(), receiver.to_string()],
            )?)
        })
        .await
    }

    pub async fn list_messages(
        &self,
        conversation: Uuid,
        features: &QueryFeatures,
    ) -> Result<Vec<Message>, StoreError> {
        let sql = format!(
            "{} WHERE m.conversation_id = ?1 ORDER BY {}{}",
            MESSAGE_SELECT,
            order_by(features, &MESSAGE_SCHEMA),
            limit_offset(&features.pagination)
        );
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let messages = stmt
                .query_map([conversation.to_string()], message_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(messages)
        })
        .await
    }
}
