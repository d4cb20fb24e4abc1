use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use super::{invite, load_room, room_path};
use crate::{
    db::MessageKind,
    display::{escape_html, format_date},
    include_res,
    messages,
    res::{self, render},
    session,
    share::{self, ShareLinks},
    AppResult, AppState, Config,
};

#[debug_handler(state = AppState)]
pub(crate) async fn room(
    Path(room_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<Response> {
    let room = load_room(&db_pool, room_id).await?;
    let toast = session::take_toast(&session).await?;
    let member = session::room_access(&session, &room.id).await?;

    if room.is_private && member.is_none() {
        let body = render(include_res!(str, "/pages/rooms/access.html"), &[
            ("room_name", &escape_html(&room.name)),
            ("room_id", &room.id),
        ]);
        return Ok(res::page(&room.name, &body, toast, "").into_response());
    }

    let path = room_path(&room.id);
    let url = share::room_url(&config.public_url, &room.id)?;
    let share = ShareLinks::new(&url, share::room_share_text(&url)).to_html("Share this room");
    let messages = messages::message_list_html(&db_pool, MessageKind::Room, &room.id, &path).await?;

    let (badge, invitations, feeds) = match room.is_private {
        true => (
            "Private Room",
            invite::invitations_html(&db_pool, &room).await?,
            format!("{path}/ws {path}/invitations/ws"),
        ),
        false => ("Public Room", String::new(), format!("{path}/ws")),
    };
    let creator = room
        .creator_username
        .as_deref()
        .map(|creator| format!(" by {}", escape_html(creator)))
        .unwrap_or_default();
    let description = room
        .description
        .as_deref()
        .map(|description| format!("<p>{}</p>", escape_html(description)))
        .unwrap_or_default();

    let body = render(include_res!(str, "/pages/rooms/room.html"), &[
        ("room_name", &escape_html(&room.name)),
        ("badge", badge),
        ("created", &format_date(room.created_at)),
        ("creator", &creator),
        ("description", &description),
        ("share", &share),
        ("room_id", &room.id),
        ("sender", &escape_html(member.as_deref().unwrap_or(""))),
        ("invitations", &invitations),
        ("messages", &messages),
    ]);

    Ok(res::page(&room.name, &body, toast, &feeds).into_response())
}
