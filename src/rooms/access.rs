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

use super::{load_room, room_path};
use crate::{
    db::RoomInvitation,
    session::{self, Toast},
    AppResult,
};

pub async fn approved_invitation(
    db_pool: &SqlitePool,
    room_id: &str,
    username: &str,
) -> AppResult<Option<RoomInvitation>> {
    Ok(sqlx::query_as::<_, RoomInvitation>(
        "SELECT id, room_id, invited_username, invited_by, status, created_at FROM room_invitations \
         WHERE room_id = ? AND invited_username = ? AND status = 'approved'",
    )
    .bind(room_id)
    .bind(username)
    .fetch_optional(db_pool)
    .await?)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AccessForm {
    username: String,
}

#[debug_handler]
pub(crate) async fn check_access(
    Path(room_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(AccessForm { username }): Form<AccessForm>,
) -> AppResult<Response> {
    let room = load_room(&db_pool, room_id).await?;
    let back = room_path(&room.id);

    let username = username.trim();
    if username.is_empty() {
        return session::reject(&session, "Error", "Please enter your username", &back).await;
    }

    match approved_invitation(&db_pool, &room.id, username).await {
        Ok(Some(_)) => {
            session::grant_room_access(&session, &room.id, username).await?;
            tracing::info!(room = %room.id, username, "room access granted");
            let welcome = Toast::new("Access Granted", format!("Welcome to {}!", room.name));
            session::redirect_with(&session, welcome, &back).await
        }
        Ok(None) => {
            tracing::debug!(room = %room.id, username, "room access denied");
            session::reject(
                &session,
                "Access Denied",
                "You don't have access to this room. Please request an invitation.",
                &back,
            )
            .await
        }
        Err(e) => session::fail(&session, e, "An error occurred while checking access. Please try again.", &back).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{test_pool, InvitationStatus},
        rooms::{create_room, insert_invitation, tests::room},
        testing::{self, body, cookie, location},
    };

    #[tokio::test]
    async fn only_approved_invitations_count() {
        let db_pool = test_pool().await;
        let closed = create_room(&db_pool, room("closed", true)).await.unwrap();
        insert_invitation(&db_pool, &closed.id, "bob", None, InvitationStatus::Pending).await.unwrap();
        insert_invitation(&db_pool, &closed.id, "carol", None, InvitationStatus::Approved).await.unwrap();

        assert!(approved_invitation(&db_pool, &closed.id, "bob").await.unwrap().is_none());
        assert!(approved_invitation(&db_pool, &closed.id, "carol").await.unwrap().is_some());
        assert!(approved_invitation(&db_pool, &closed.id, "dave").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn approved_users_get_in() {
        let state = testing::state().await;
        let closed = create_room(&state.db_pool, room("closed", true)).await.unwrap();
        insert_invitation(&state.db_pool, &closed.id, "carol", None, InvitationStatus::Approved).await.unwrap();
        let app = testing::app(state);
        let path = format!("/r/{}", closed.id);

        let page = body(testing::get(&app, &path, None).await).await;
        assert!(page.contains("Check Access"));

        let response = testing::post_form(&app, &format!("{path}/access"), "username=+carol+", None).await;
        assert_eq!(location(&response), path);
        let page = body(testing::get(&app, &path, cookie(&response).as_deref()).await).await;
        assert!(page.contains("Welcome to closed!"));
        assert!(page.contains("Send message"));
    }

    #[tokio::test]
    async fn strangers_are_turned_away() {
        let state = testing::state().await;
        let closed = create_room(&state.db_pool, room("closed", true)).await.unwrap();
        let app = testing::app(state);
        let path = format!("/r/{}", closed.id);

        let response = testing::post_form(&app, &format!("{path}/access"), "username=mallory", None).await;
        assert_eq!(location(&response), path);
        let page = body(testing::get(&app, &path, cookie(&response).as_deref()).await).await;
        assert!(page.contains("Access Denied"));
        assert!(page.contains("Check Access"));
    }
}
