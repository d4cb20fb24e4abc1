use axum::{
    debug_handler,
    extract::State,
    response::{IntoResponse, Response},
    Form,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use super::{create_room, insert_invitation, room_path, NewRoom};
use crate::{
    db::{InvitationStatus, Room, User},
    include_res,
    messages::non_blank,
    profiles::find_user,
    res,
    session::{self, Toast},
    AppResult,
};

const BACK: &str = "/r/new";

#[derive(Debug, Deserialize)]
pub(crate) struct NewRoomForm {
    name: String,
    description: Option<String>,
    #[serde(default)]
    is_private: bool,
    creator_username: Option<String>,
}

#[debug_handler]
pub(crate) async fn new_room_page(session: Session) -> AppResult<Response> {
    let toast = session::take_toast(&session).await?;
    Ok(res::page("Create a room", include_res!(str, "/pages/new_room.html"), toast, "").into_response())
}

/// Creates the room, then lets its creator straight into it when private.
async fn open_room(db_pool: &SqlitePool, session: &Session, form: NewRoomForm, creator: Option<User>) -> AppResult<Room> {
    let room = create_room(db_pool, NewRoom {
        name: form.name.trim().to_owned(),
        description: non_blank(form.description),
        is_private: form.is_private,
        created_by: creator.as_ref().map(|user| user.id.clone()),
    })
    .await?;

    if room.is_private {
        let username = creator.as_ref().map_or("", |user| user.username.as_str());
        session::grant_room_access(session, &room.id, username).await?;
        if let Some(creator) = &creator {
            insert_invitation(db_pool, &room.id, &creator.username, Some(creator.username.as_str()), InvitationStatus::Approved)
                .await?;
        }
    }
    Ok(room)
}

#[debug_handler]
pub(crate) async fn new_room(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(form): Form<NewRoomForm>,
) -> AppResult<Response> {
    if form.name.trim().is_empty() {
        return session::reject(&session, "Error", "Room name cannot be empty", BACK).await;
    }

    let creator = match non_blank(form.creator_username.clone()) {
        None => None,
        Some(username) => match find_user(&db_pool, &username).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => {
                let missing = format!("Username \"{username}\" does not exist. Create a profile first.");
                return session::reject(&session, "User not found", missing, BACK).await;
            }
            Err(e) => return session::fail(&session, e, "Failed to create room. Please try again.", BACK).await,
        },
    };

    match open_room(&db_pool, &session, form, creator).await {
        Ok(room) => {
            tracing::info!(id = %room.id, private = room.is_private, "room created");
            let created = Toast::new("Room created", format!("Your room \"{}\" has been created.", room.name));
            session::redirect_with(&session, created, &room_path(&room.id)).await
        }
        Err(e) => session::fail(&session, e, "Failed to create room. Please try again.", BACK).await,
    }
}
