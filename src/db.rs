use std::{fmt, str::FromStr, time::Duration};

use serde::Deserialize;
use sqlx::{migrate::Migrator, sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{feed::Channel, AppResult, Config};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn connect(config: &Config) -> AppResult<SqlitePool> {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database_url)
        .await?;

    MIGRATOR.run(&db_pool).await?;
    Ok(db_pool)
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // one connection, never recycled: every new in-memory connection is a fresh database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    MIGRATOR.run(&db_pool).await.unwrap();
    db_pool
}

pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

pub fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    pub created_at: i64,
    pub created_by: Option<String>,
    /// Joined from `users`.
    pub creator_username: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Approved,
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Approved => "approved",
            InvitationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvitationStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(InvitationStatus::Pending),
            "approved" => Ok(InvitationStatus::Approved),
            "rejected" => Ok(InvitationStatus::Rejected),
            other => Err(UnknownVariant { kind: "invitation status", value: other.to_owned() }),
        }
    }
}

impl TryFrom<String> for InvitationStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RoomInvitation {
    pub id: String,
    pub room_id: String,
    pub invited_username: String,
    pub invited_by: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: InvitationStatus,
    pub created_at: i64,
}

/// Which family of tables a message lives in: the inbox of a profile or a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Profile,
    Room,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Profile => "profile",
            MessageKind::Room => "room",
        }
    }

    pub fn messages_table(self) -> &'static str {
        match self {
            MessageKind::Profile => "messages",
            MessageKind::Room => "room_messages",
        }
    }

    /// Column of the messages table pointing at the owner.
    pub fn parent_column(self) -> &'static str {
        match self {
            MessageKind::Profile => "recipient_id",
            MessageKind::Room => "room_id",
        }
    }

    pub fn reactions_table(self) -> &'static str {
        match self {
            MessageKind::Profile => "message_reactions",
            MessageKind::Room => "room_message_reactions",
        }
    }

    pub fn replies_table(self) -> &'static str {
        match self {
            MessageKind::Profile => "message_replies",
            MessageKind::Room => "room_message_replies",
        }
    }

    /// Column of the reaction and reply tables pointing at the message.
    pub fn message_column(self) -> &'static str {
        match self {
            MessageKind::Profile => "message_id",
            MessageKind::Room => "room_message_id",
        }
    }

    pub fn channel(self, parent_id: &str) -> Channel {
        match self {
            MessageKind::Profile => Channel::Inbox(parent_id.to_owned()),
            MessageKind::Room => Channel::Room(parent_id.to_owned()),
        }
    }
}

/// A direct message (`parent_id` is the recipient) or a room message
/// (`parent_id` is the room).
#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: String,
    pub parent_id: String,
    pub content: String,
    pub sender_username: Option<String>,
    pub image_url: Option<String>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Love,
    Laugh,
    Wow,
    Sad,
    Angry,
}

impl ReactionType {
    pub const ALL: [ReactionType; 6] = [
        ReactionType::Like,
        ReactionType::Love,
        ReactionType::Laugh,
        ReactionType::Wow,
        ReactionType::Sad,
        ReactionType::Angry,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReactionType::Like => "like",
            ReactionType::Love => "love",
            ReactionType::Laugh => "laugh",
            ReactionType::Wow => "wow",
            ReactionType::Sad => "sad",
            ReactionType::Angry => "angry",
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            ReactionType::Like => "👍",
            ReactionType::Love => "❤️",
            ReactionType::Laugh => "😂",
            ReactionType::Wow => "😮",
            ReactionType::Sad => "😢",
            ReactionType::Angry => "😡",
        }
    }
}

impl FromStr for ReactionType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReactionType::ALL
            .into_iter()
            .find(|reaction| reaction.as_str() == s)
            .ok_or_else(|| UnknownVariant { kind: "reaction type", value: s.to_owned() })
    }
}

impl TryFrom<String> for ReactionType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Reaction {
    pub id: String,
    pub message_id: String,
    #[sqlx(try_from = "String")]
    pub reaction_type: ReactionType,
    pub created_at: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Reply {
    pub id: String,
    pub message_id: String,
    pub content: String,
    pub sender_nickname: Option<String>,
    pub created_at: i64,
}
