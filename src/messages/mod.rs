//! Storage and rendering shared by direct messages and room messages, plus
//! the reaction and reply endpoints that hang off either kind.

mod reactions;
mod render;
mod replies;

use axum::{routing::post, Router};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    db::{self, Message, MessageKind},
    feed::{Feed, Patch},
    rooms,
    session::Toast,
    AppResult, AppState,
};

pub use reactions::{add_reaction, list_reactions, ReactionSummary};
pub use render::{message_html, message_list_html};
pub use replies::{add_reply, count_replies, list_replies};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{kind}/{id}/reactions", post(reactions::react))
        .route("/{kind}/{id}/replies", post(replies::reply))
}

/// Trimmed value, `None` when blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Deserialize)]
pub(crate) struct SendMessageForm {
    content: String,
    sender_username: Option<String>,
    image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub content: String,
    pub sender_username: Option<String>,
    pub image_url: Option<String>,
}

impl NewMessage {
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_owned(),
            sender_username: None,
            image_url: None,
        }
    }
}

impl SendMessageForm {
    /// The error is the toast description shown to the sender.
    pub(crate) fn validate(self, max_image_bytes: usize) -> Result<NewMessage, &'static str> {
        if self.content.trim().is_empty() {
            return Err("Message cannot be empty");
        }

        let image_url = non_blank(self.image_url);
        if let Some(image_url) = &image_url {
            if !image_url.starts_with("data:image/") {
                return Err("Images must be attached as data:image URIs");
            }
            if attachment_bytes(image_url) > max_image_bytes {
                return Err("Image is too large");
            }
        }

        Ok(NewMessage {
            content: self.content,
            sender_username: non_blank(self.sender_username),
            image_url,
        })
    }
}

/// Decoded size of a data URI payload. Base64 payloads are measured after
/// decoding, anything else by its length.
fn attachment_bytes(data_uri: &str) -> usize {
    let Some((header, payload)) = data_uri.split_once(',') else {
        return data_uri.len();
    };
    match header.ends_with(";base64") {
        true => {
            let padding = payload.bytes().rev().take_while(|&b| b == b'=').count();
            (payload.len() * 3 / 4).saturating_sub(padding)
        }
        false => payload.len(),
    }
}

fn denied() -> Toast {
    Toast::destructive("Access Denied", "You don't have access to this room.")
}

/// Room messages take reactions and replies only from sessions that can enter
/// their room.
pub(crate) async fn can_respond(db_pool: &SqlitePool, session: &Session, kind: MessageKind, message: &Message) -> AppResult<bool> {
    match kind {
        MessageKind::Profile => Ok(true),
        MessageKind::Room => match rooms::get_room(db_pool, &message.parent_id).await? {
            Some(room) => rooms::can_enter(session, &room).await,
            None => Ok(false),
        },
    }
}

fn select_messages(kind: MessageKind) -> String {
    format!(
        "SELECT id, {parent} AS parent_id, content, sender_username, image_url, created_at FROM {table}",
        parent = kind.parent_column(),
        table = kind.messages_table(),
    )
}

pub async fn insert_message(
    db_pool: &SqlitePool,
    kind: MessageKind,
    parent_id: &str,
    NewMessage { content, sender_username, image_url }: NewMessage,
) -> AppResult<Message> {
    let sql = format!(
        "INSERT INTO {table} (id, {parent}, content, sender_username, image_url, created_at) VALUES (?,?,?,?,?,?) \
         RETURNING id, {parent} AS parent_id, content, sender_username, image_url, created_at",
        table = kind.messages_table(),
        parent = kind.parent_column(),
    );

    let message = sqlx::query_as::<_, Message>(&sql)
        .bind(db::new_id())
        .bind(parent_id)
        .bind(content)
        .bind(sender_username)
        .bind(image_url)
        .bind(db::now())
        .fetch_one(db_pool)
        .await?;
    Ok(message)
}

/// Newest first.
pub async fn list_messages(db_pool: &SqlitePool, kind: MessageKind, parent_id: &str) -> AppResult<Vec<Message>> {
    let sql = format!(
        "{} WHERE {} = ? ORDER BY created_at DESC, rowid DESC",
        select_messages(kind),
        kind.parent_column(),
    );
    Ok(sqlx::query_as::<_, Message>(&sql)
        .bind(parent_id)
        .fetch_all(db_pool)
        .await?)
}

pub async fn find_message(db_pool: &SqlitePool, kind: MessageKind, id: &str) -> AppResult<Option<Message>> {
    let sql = format!("{} WHERE id = ?", select_messages(kind));
    Ok(sqlx::query_as::<_, Message>(&sql)
        .bind(id)
        .fetch_optional(db_pool)
        .await?)
}

/// Stores a message and pushes it to everyone watching its parent.
pub(crate) async fn post_message(
    db_pool: &SqlitePool,
    feed: &Feed,
    kind: MessageKind,
    parent_id: &str,
    message: NewMessage,
    return_url: &str,
) -> AppResult<Message> {
    let message = insert_message(db_pool, kind, parent_id, message).await?;
    tracing::info!(kind = kind.as_str(), id = %message.id, parent = parent_id, "message sent");

    let html = message_html(db_pool, kind, &message, return_url).await?;
    feed.publish(kind.channel(parent_id), Patch::Prepend {
        target: "messages".to_owned(),
        html,
    });
    Ok(message)
}
