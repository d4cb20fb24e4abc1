use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State},
    response::Response,
    Form,
};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use super::{can_enter, load_room, room_path};
use crate::{
    db::MessageKind,
    feed::Feed,
    messages::{self, SendMessageForm},
    session::{self, Toast},
    AppResult, AppState, Config,
};

#[debug_handler(state = AppState)]
pub(crate) async fn send_room_message(
    Path(room_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    State(config): State<Arc<Config>>,
    session: Session,
    Form(form): Form<SendMessageForm>,
) -> AppResult<Response> {
    let room = load_room(&db_pool, room_id).await?;
    let back = room_path(&room.id);

    if !can_enter(&session, &room).await? {
        return session::reject(&session, "Access Denied", "You don't have access to this room.", &back).await;
    }

    let message = match form.validate(config.max_image_bytes) {
        Ok(message) => message,
        Err(problem) => return session::reject(&session, "Error", problem, &back).await,
    };

    match messages::post_message(&db_pool, &feed, MessageKind::Room, &room.id, message, &back).await {
        Ok(_) => {
            let sent = Toast::new("Message sent", "Your message has been sent to the room.");
            session::redirect_with(&session, sent, &back).await
        }
        Err(e) => session::fail(&session, e, "Failed to send message. Please try again.", &back).await,
    }
}
