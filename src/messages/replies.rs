use axum::{
    debug_handler,
    extract::{Path, State},
    response::Response,
    Form,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use super::{can_respond, denied, find_message, non_blank};
use crate::{
    db::{self, MessageKind, Reply},
    display::{escape_html, format_date, markdown},
    feed::{Feed, Patch},
    include_res,
    res::render,
    session::{self, local_path, Live, Toast},
    AppError, AppResult, AppState,
};

/// Oldest first, so threads read top to bottom.
pub async fn list_replies(db_pool: &SqlitePool, kind: MessageKind, message_id: &str) -> AppResult<Vec<Reply>> {
    let sql = format!(
        "SELECT id, {column} AS message_id, content, sender_nickname, created_at FROM {table} \
         WHERE {column} = ? ORDER BY created_at ASC, rowid ASC",
        column = kind.message_column(),
        table = kind.replies_table(),
    );
    Ok(sqlx::query_as::<_, Reply>(&sql)
        .bind(message_id)
        .fetch_all(db_pool)
        .await?)
}

pub async fn count_replies(db_pool: &SqlitePool, kind: MessageKind, message_id: &str) -> AppResult<usize> {
    let sql = format!(
        "SELECT COUNT(*) FROM {table} WHERE {column} = ?",
        column = kind.message_column(),
        table = kind.replies_table(),
    );
    let (count,): (i64,) = sqlx::query_as(&sql).bind(message_id).fetch_one(db_pool).await?;
    Ok(usize::try_from(count).unwrap_or_default())
}

pub async fn add_reply(
    db_pool: &SqlitePool,
    kind: MessageKind,
    message_id: &str,
    content: &str,
    nickname: Option<&str>,
) -> AppResult<Reply> {
    let sql = format!(
        "INSERT INTO {table} (id, {column}, content, sender_nickname, created_at) VALUES (?,?,?,?,?) \
         RETURNING id, {column} AS message_id, content, sender_nickname, created_at",
        column = kind.message_column(),
        table = kind.replies_table(),
    );
    Ok(sqlx::query_as::<_, Reply>(&sql)
        .bind(db::new_id())
        .bind(message_id)
        .bind(content)
        .bind(nickname)
        .bind(db::now())
        .fetch_one(db_pool)
        .await?)
}

pub(crate) fn reply_html(reply: &Reply) -> String {
    render(include_res!(str, "/pages/messages/reply.html"), &[
        ("id", &reply.id),
        ("content", &markdown(&reply.content)),
        ("sender", &escape_html(reply.sender_nickname.as_deref().unwrap_or("Anonymous"))),
        ("date", &format_date(reply.created_at)),
    ])
}

pub(crate) fn reply_count_html(message_id: &str, count: usize) -> String {
    let count = match count {
        0 => String::new(),
        count => format!(" ({count})"),
    };
    render(include_res!(str, "/pages/messages/reply_count.html"), &[("id", message_id), ("count", &count)])
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplyForm {
    content: String,
    nickname: Option<String>,
    return_url: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn reply(
    Path((kind, id)): Path<(MessageKind, Uuid)>,
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    session: Session,
    live: Live,
    Form(form): Form<ReplyForm>,
) -> AppResult<Response> {
    let back = local_path(form.return_url.as_deref());
    let message = find_message(&db_pool, kind, &id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("message"))?;

    if !can_respond(&db_pool, &session, kind, &message).await? {
        return session::answer(&session, live, Some(denied()), back).await;
    }

    let content = form.content.trim();
    if content.is_empty() {
        let empty = Toast::destructive("Error", "Reply cannot be empty");
        return session::answer(&session, live, Some(empty), back).await;
    }
    let nickname = non_blank(form.nickname);

    let reply = match add_reply(&db_pool, kind, &message.id, content, nickname.as_deref()).await {
        Ok(reply) => reply,
        Err(e) => {
            let failed = session::failure(e, "Failed to post reply");
            return session::answer(&session, live, Some(failed), back).await;
        }
    };
    tracing::debug!(kind = kind.as_str(), message = %message.id, reply = %reply.id, "reply added");

    let channel = kind.channel(&message.parent_id);
    feed.publish(channel.clone(), Patch::Append {
        target: format!("replies-{}", message.id),
        html: reply_html(&reply),
    });
    let count = count_replies(&db_pool, kind, &message.id).await?;
    feed.publish(channel, Patch::Replace {
        target: format!("reply-count-{}", message.id),
        html: reply_count_html(&message.id, count),
    });

    let sent = Toast::new("Reply sent", "Your reply has been posted");
    session::answer(&session, live, Some(sent), back).await
}
