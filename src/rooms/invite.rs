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

use super::{can_enter, load_room, room_path};
use crate::{
    db::{self, InvitationStatus, Room, RoomInvitation},
    display::{escape_html, format_date},
    feed::{Channel, Feed, Patch},
    include_res,
    profiles::find_user,
    res::render,
    session::{self, Toast},
    AppError, AppResult, AppState,
};

const SELECT_INVITATION: &str =
    "SELECT id, room_id, invited_username, invited_by, status, created_at FROM room_invitations";

pub async fn find_invitation(db_pool: &SqlitePool, room_id: &str, username: &str) -> AppResult<Option<RoomInvitation>> {
    Ok(sqlx::query_as::<_, RoomInvitation>(&format!(
        "{SELECT_INVITATION} WHERE room_id = ? AND invited_username = ? ORDER BY created_at DESC, rowid DESC LIMIT 1"
    ))
    .bind(room_id)
    .bind(username)
    .fetch_optional(db_pool)
    .await?)
}

pub async fn insert_invitation(
    db_pool: &SqlitePool,
    room_id: &str,
    username: &str,
    invited_by: Option<&str>,
    status: InvitationStatus,
) -> AppResult<RoomInvitation> {
    Ok(sqlx::query_as::<_, RoomInvitation>(
        "INSERT INTO room_invitations (id, room_id, invited_username, invited_by, status, created_at) \
         VALUES (?,?,?,?,?,?) RETURNING id, room_id, invited_username, invited_by, status, created_at",
    )
    .bind(db::new_id())
    .bind(room_id)
    .bind(username)
    .bind(invited_by)
    .bind(status.as_str())
    .bind(db::now())
    .fetch_one(db_pool)
    .await?)
}

/// Newest first.
pub async fn list_invitations(db_pool: &SqlitePool, room_id: &str) -> AppResult<Vec<RoomInvitation>> {
    Ok(sqlx::query_as::<_, RoomInvitation>(&format!(
        "{SELECT_INVITATION} WHERE room_id = ? ORDER BY created_at DESC, rowid DESC"
    ))
    .bind(room_id)
    .fetch_all(db_pool)
    .await?)
}

pub async fn set_invitation_status(
    db_pool: &SqlitePool,
    room_id: &str,
    invitation_id: &str,
    status: InvitationStatus,
) -> AppResult<Option<RoomInvitation>> {
    Ok(sqlx::query_as::<_, RoomInvitation>(
        "UPDATE room_invitations SET status = ? WHERE id = ? AND room_id = ? \
         RETURNING id, room_id, invited_username, invited_by, status, created_at",
    )
    .bind(status.as_str())
    .bind(invitation_id)
    .bind(room_id)
    .fetch_optional(db_pool)
    .await?)
}

/// Pending invitation for an existing user. `NotFound` when the user doesn't
/// exist, `Conflict` when they were already invited.
pub async fn invite_user(
    db_pool: &SqlitePool,
    room_id: &str,
    username: &str,
    invited_by: Option<&str>,
) -> AppResult<RoomInvitation> {
    if find_user(db_pool, username).await?.is_none() {
        return Err(AppError::not_found(format!("user {username}")));
    }
    if let Some(existing) = find_invitation(db_pool, room_id, username).await? {
        return Err(AppError::Conflict(format!(
            "{username} has already been invited to this room (status: {}).",
            existing.status
        )));
    }
    insert_invitation(db_pool, room_id, username, invited_by, InvitationStatus::Pending).await
}

pub(crate) fn invitation_html(invitation: &RoomInvitation) -> String {
    let invited_by = match invitation.invited_by.as_deref() {
        Some(by) => format!("invited by {}", escape_html(by)),
        None => "invited anonymously".to_owned(),
    };
    render(include_res!(str, "/pages/rooms/invitation.html"), &[
        ("id", &invitation.id),
        ("room_id", &invitation.room_id),
        ("invited_username", &escape_html(&invitation.invited_username)),
        ("status", invitation.status.as_str()),
        ("invited_by", &invited_by),
        ("date", &format_date(invitation.created_at)),
    ])
}

pub(crate) async fn invitations_html(db_pool: &SqlitePool, room: &Room) -> AppResult<String> {
    let invitations = list_invitations(db_pool, &room.id).await?;
    let items = match invitations.is_empty() {
        true => include_res!(str, "/pages/rooms/no_invitations.html").to_owned(),
        false => invitations.iter().map(invitation_html).collect(),
    };
    Ok(render(include_res!(str, "/pages/rooms/invitations.html"), &[
        ("room_id", &room.id),
        ("invitation_items", &items),
    ]))
}

#[derive(Debug, Deserialize)]
pub(crate) struct InviteForm {
    username: String,
}

#[debug_handler(state = AppState)]
pub(crate) async fn invite(
    Path(room_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    session: Session,
    Form(InviteForm { username }): Form<InviteForm>,
) -> AppResult<Response> {
    let room = load_room(&db_pool, room_id).await?;
    if !can_enter(&session, &room).await? {
        return Err(AppError::Forbidden("You don't have access to this room.".to_owned()));
    }
    let back = room_path(&room.id);

    let username = username.trim();
    if username.is_empty() {
        return session::reject(&session, "Error", "Username cannot be empty", &back).await;
    }
    let invited_by = session::room_access(&session, &room.id)
        .await?
        .filter(|by| !by.is_empty());

    match invite_user(&db_pool, &room.id, username, invited_by.as_deref()).await {
        Ok(invitation) => {
            tracing::info!(room = %room.id, username, "invitation sent");
            feed.publish(Channel::Invitations(room.id.clone()), Patch::Prepend {
                target: "invitations".to_owned(),
                html: invitation_html(&invitation),
            });
            let sent = Toast::new("Invitation sent", format!("{username} has been invited to join \"{}\".", room.name));
            session::redirect_with(&session, sent, &back).await
        }
        Err(AppError::NotFound(_)) => {
            let missing = format!("Username \"{username}\" does not exist.");
            session::reject(&session, "User not found", missing, &back).await
        }
        Err(AppError::Conflict(existing)) => {
            session::reject(&session, "Invitation already exists", existing, &back).await
        }
        Err(e) => session::fail(&session, e, "Failed to send invitation. Please try again.", &back).await,
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewForm {
    status: InvitationStatus,
}

#[debug_handler(state = AppState)]
pub(crate) async fn review(
    Path((room_id, invitation_id)): Path<(Uuid, Uuid)>,
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    session: Session,
    Form(ReviewForm { status }): Form<ReviewForm>,
) -> AppResult<Response> {
    let room = load_room(&db_pool, room_id).await?;
    if !can_enter(&session, &room).await? {
        return Err(AppError::Forbidden("You don't have access to this room.".to_owned()));
    }
    let back = room_path(&room.id);

    let invitation = set_invitation_status(&db_pool, &room.id, &invitation_id.to_string(), status)
        .await?
        .ok_or_else(|| AppError::not_found("invitation"))?;
    tracing::info!(room = %room.id, invitation = %invitation.id, %status, "invitation reviewed");

    feed.publish(Channel::Invitations(room.id.clone()), Patch::Replace {
        target: format!("invitation-{}", invitation.id),
        html: invitation_html(&invitation),
    });

    let reviewed = Toast::new(
        "Invitation updated",
        format!("{} is now {status}.", invitation.invited_username),
    );
    session::redirect_with(&session, reviewed, &back).await
}
