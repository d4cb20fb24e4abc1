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

use super::{can_respond, denied, find_message};
use crate::{
    db::{self, Message, MessageKind, Reaction, ReactionType},
    feed::{Feed, Patch},
    include_res,
    res::render,
    session::{self, local_path, Live},
    AppError, AppResult, AppState,
};

/// Counts per reaction type, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionSummary {
    counts: Vec<(ReactionType, usize)>,
}

impl ReactionSummary {
    pub fn tally(reactions: impl IntoIterator<Item = ReactionType>) -> Self {
        let mut counts: Vec<(ReactionType, usize)> = Vec::new();
        for reaction in reactions {
            match counts.iter_mut().find(|(seen, _)| *seen == reaction) {
                Some((_, count)) => *count += 1,
                None => counts.push((reaction, 1)),
            }
        }
        Self { counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    pub fn count(&self, reaction: ReactionType) -> usize {
        self.counts
            .iter()
            .find(|(seen, _)| *seen == reaction)
            .map_or(0, |(_, count)| *count)
    }

    /// Most used first; ties keep the order they first appeared in.
    pub fn top(&self, n: usize) -> Vec<ReactionType> {
        let mut ranked = self.counts.clone();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        ranked.into_iter().take(n).map(|(reaction, _)| reaction).collect()
    }

    pub fn to_html(&self, message_id: &str) -> String {
        let total = self.total();
        let emojis: String = self.top(3).into_iter().map(ReactionType::emoji).collect();
        let total_label = match total {
            0 => String::new(),
            total => total.to_string(),
        };

        render(include_res!(str, "/pages/messages/summary.html"), &[
            ("id", message_id),
            ("total", &total.to_string()),
            ("emojis", &emojis),
            ("total_label", &total_label),
        ])
    }
}

/// Oldest first.
pub async fn list_reactions(db_pool: &SqlitePool, kind: MessageKind, message_id: &str) -> AppResult<Vec<Reaction>> {
    let sql = format!(
        "SELECT id, {column} AS message_id, reaction_type, created_at FROM {table} \
         WHERE {column} = ? ORDER BY created_at ASC, rowid ASC",
        column = kind.message_column(),
        table = kind.reactions_table(),
    );
    Ok(sqlx::query_as::<_, Reaction>(&sql)
        .bind(message_id)
        .fetch_all(db_pool)
        .await?)
}

pub async fn add_reaction(
    db_pool: &SqlitePool,
    kind: MessageKind,
    message_id: &str,
    reaction_type: ReactionType,
) -> AppResult<Reaction> {
    let sql = format!(
        "INSERT INTO {table} (id, {column}, reaction_type, created_at) VALUES (?,?,?,?) \
         RETURNING id, {column} AS message_id, reaction_type, created_at",
        column = kind.message_column(),
        table = kind.reactions_table(),
    );
    Ok(sqlx::query_as::<_, Reaction>(&sql)
        .bind(db::new_id())
        .bind(message_id)
        .bind(reaction_type.as_str())
        .bind(db::now())
        .fetch_one(db_pool)
        .await?)
}

async fn publish_summary(db_pool: &SqlitePool, feed: &Feed, kind: MessageKind, message: &Message) -> AppResult<()> {
    let reactions = list_reactions(db_pool, kind, &message.id).await?;
    let summary = ReactionSummary::tally(reactions.iter().map(|reaction| reaction.reaction_type));
    feed.publish(kind.channel(&message.parent_id), Patch::Replace {
        target: format!("reactions-{}", message.id),
        html: summary.to_html(&message.id),
    });
    Ok(())
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReactForm {
    reaction_type: ReactionType,
    return_url: Option<String>,
}

#[debug_handler(state = AppState)]
pub(crate) async fn react(
    Path((kind, id)): Path<(MessageKind, Uuid)>,
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    session: Session,
    live: Live,
    Form(form): Form<ReactForm>,
) -> AppResult<Response> {
    let back = local_path(form.return_url.as_deref());
    let message = find_message(&db_pool, kind, &id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("message"))?;

    if !can_respond(&db_pool, &session, kind, &message).await? {
        return session::answer(&session, live, Some(denied()), back).await;
    }

    if let Err(e) = add_reaction(&db_pool, kind, &message.id, form.reaction_type).await {
        let failed = session::failure(e, "Failed to add reaction. Please try again.");
        return session::answer(&session, live, Some(failed), back).await;
    }
    tracing::debug!(kind = kind.as_str(), message = %message.id, reaction = form.reaction_type.as_str(), "reaction added");

    publish_summary(&db_pool, &feed, kind, &message).await?;
    session::answer(&session, live, None, back).await
}
