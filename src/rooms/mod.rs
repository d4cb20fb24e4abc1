//! Public and private rooms. A private room is entered by passing its access
//! check, which needs an approved invitation for the username given.

mod access;
mod invite;
mod msg;
mod new;
mod room;
mod ws;

use axum::{routing::{get, post}, Router};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{db::{self, Room}, session, AppError, AppResult, AppState};

pub use access::approved_invitation;
pub use invite::{find_invitation, insert_invitation, invite_user, list_invitations, set_invitation_status};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new", get(new::new_room_page).post(new::new_room))
        .route("/{room_id}", get(room::room))
        .route("/{room_id}/access", post(access::check_access))
        .route("/{room_id}/messages", post(msg::send_room_message))
        .route("/{room_id}/ws", get(ws::room_ws))
        .route("/{room_id}/invitations", post(invite::invite))
        .route("/{room_id}/invitations/ws", get(ws::invitations_ws))
        .route("/{room_id}/invitations/{invitation_id}", post(invite::review))
}

const SELECT_ROOM: &str = "SELECT r.id, r.name, r.description, r.is_private, r.created_at, r.created_by, \
    u.username AS creator_username FROM rooms r LEFT JOIN users u ON u.id = r.created_by";

#[derive(Debug, Clone, Default)]
pub struct NewRoom {
    pub name: String,
    pub description: Option<String>,
    pub is_private: bool,
    /// User id of the creator.
    pub created_by: Option<String>,
}

pub async fn create_room(db_pool: &SqlitePool, new_room: NewRoom) -> AppResult<Room> {
    let id = db::new_id();
    sqlx::query("INSERT INTO rooms (id, name, description, is_private, created_at, created_by) VALUES (?,?,?,?,?,?)")
        .bind(&id)
        .bind(&new_room.name)
        .bind(&new_room.description)
        .bind(new_room.is_private)
        .bind(db::now())
        .bind(&new_room.created_by)
        .execute(db_pool)
        .await?;

    get_room(db_pool, &id).await?.ok_or_else(|| format!("room {id} vanished after insert").into())
}

pub async fn get_room(db_pool: &SqlitePool, room_id: &str) -> AppResult<Option<Room>> {
    Ok(sqlx::query_as::<_, Room>(&format!("{SELECT_ROOM} WHERE r.id = ?"))
        .bind(room_id)
        .fetch_optional(db_pool)
        .await?)
}

/// Newest first.
pub async fn public_rooms(db_pool: &SqlitePool) -> AppResult<Vec<Room>> {
    Ok(sqlx::query_as::<_, Room>(&format!(
        "{SELECT_ROOM} WHERE r.is_private = FALSE ORDER BY r.created_at DESC, r.rowid DESC"
    ))
    .fetch_all(db_pool)
    .await?)
}

pub(crate) async fn load_room(db_pool: &SqlitePool, room_id: Uuid) -> AppResult<Room> {
    get_room(db_pool, &room_id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("room"))
}

pub(crate) fn room_path(room_id: &str) -> String {
    format!("/r/{room_id}")
}

/// Public rooms are open to everyone; private ones to sessions that passed
/// the access check.
pub(crate) async fn can_enter(session: &Session, room: &Room) -> AppResult<bool> {
    Ok(!room.is_private || session::room_access(session, &room.id).await?.is_some())
}
