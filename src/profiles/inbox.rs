use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{ws::WebSocketUpgrade, Path, State},
    response::Response,
    Form,
};
use sqlx::SqlitePool;
use tower_sessions::Session;

use super::find_user;
use crate::{
    db::MessageKind,
    feed::{Channel, Feed},
    messages::{self, SendMessageForm},
    session::{self, Toast},
    share::profile_path,
    AppError, AppResult, AppState, Config,
};

#[debug_handler(state = AppState)]
pub(crate) async fn send_message(
    Path(username): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    State(config): State<Arc<Config>>,
    session: Session,
    Form(form): Form<SendMessageForm>,
) -> AppResult<Response> {
    let recipient = find_user(&db_pool, &username)
        .await?
        .ok_or_else(|| AppError::not_found("profile"))?;
    let back = profile_path(&recipient.username);

    let message = match form.validate(config.max_image_bytes) {
        Ok(message) => message,
        Err(problem) => return session::reject(&session, "Error", problem, &back).await,
    };

    match messages::post_message(&db_pool, &feed, MessageKind::Profile, &recipient.id, message, &back).await {
        Ok(_) => {
            let sent = Toast::new("Message sent", format!("Your message to {} has been sent.", recipient.username));
            session::redirect_with(&session, sent, &back).await
        }
        Err(e) => session::fail(&session, e, "Failed to send message. Please try again.", &back).await,
    }
}

#[debug_handler(state = AppState)]
pub(crate) async fn inbox_ws(
    Path(username): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let user = find_user(&db_pool, &username)
        .await?
        .ok_or_else(|| AppError::not_found("profile"))?;
    Ok(feed.serve(ws, Channel::Inbox(user.id)))
}

#[cfg(test)]
mod tests {
    use crate::{
        db::MessageKind,
        feed::{Channel, Patch},
        messages::list_messages,
        profiles::create_user,
        testing::{self, body, cookie, location},
    };

    #[tokio::test]
    async fn sending_stores_publishes_and_confirms() {
        let state = testing::state().await;
        let alice = create_user(&state.db_pool, "alice").await.unwrap();
        let mut inbox = state.feed.subscribe(Channel::Inbox(alice.id.clone()));
        let app = testing::app(state.clone());

        let response = testing::post_form(
            &app,
            "/p/alice/messages",
            "content=hello+there&sender_username=bob&image_url=",
            None,
        )
        .await;
        assert_eq!(location(&response), "/p/alice");

        let stored = list_messages(&state.db_pool, MessageKind::Profile, &alice.id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sender_username.as_deref(), Some("bob"));
        assert_eq!(stored[0].image_url, None);

        let Some(Patch::Prepend { target, html }) = inbox.recv().await else {
            panic!("expected a prepend");
        };
        assert_eq!(target, "messages");
        assert!(html.contains("hello there"));

        let page = body(testing::get(&app, "/p/alice", cookie(&response).as_deref()).await).await;
        assert!(page.contains("Your message to alice has been sent."));
    }

    #[tokio::test]
    async fn empty_messages_are_not_stored() {
        let state = testing::state().await;
        let alice = create_user(&state.db_pool, "alice").await.unwrap();
        let app = testing::app(state.clone());

        let response = testing::post_form(&app, "/p/alice/messages", "content=+", None).await;
        assert_eq!(location(&response), "/p/alice");
        assert!(list_messages(&state.db_pool, MessageKind::Profile, &alice.id).await.unwrap().is_empty());

        let page = body(testing::get(&app, "/p/alice", cookie(&response).as_deref()).await).await;
        assert!(page.contains("Message cannot be empty"));
    }
}
