use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State},
    response::{IntoResponse, Response},
};
use sqlx::SqlitePool;
use tower_sessions::Session;

use super::find_user;
use crate::{
    db::MessageKind,
    display::{escape_html, format_date, username_color},
    include_res,
    messages,
    res::{self, render},
    session,
    share::{self, encode_path_segment, profile_path, ShareLinks},
    AppError, AppResult, AppState, Config,
};

#[debug_handler(state = AppState)]
pub(crate) async fn profile(
    Path(username): Path<String>,
    State(db_pool): State<SqlitePool>,
    State(config): State<Arc<Config>>,
    session: Session,
) -> AppResult<Response> {
    let user = find_user(&db_pool, &username)
        .await?
        .ok_or_else(|| AppError::not_found("profile"))?;
    let toast = session::take_toast(&session).await?;

    let path = profile_path(&user.username);
    let url = share::profile_url(&config.public_url, &user.username)?;
    let share = ShareLinks::new(&url, share::profile_share_text(&user.username, &url)).to_html("Share your profile");
    let messages = messages::message_list_html(&db_pool, MessageKind::Profile, &user.id, &path).await?;

    let initial: String = user.username.chars().next().into_iter().flat_map(char::to_uppercase).collect();

    let body = render(include_res!(str, "/pages/profiles/profile.html"), &[
        ("color", username_color(&user.username).hex),
        ("initial", &escape_html(&initial)),
        ("username", &escape_html(&user.username)),
        ("joined", &format_date(user.created_at)),
        ("share", &share),
        ("username_path", &encode_path_segment(&user.username)),
        ("messages", &messages),
    ]);

    Ok(res::page(&user.username, &body, toast, &format!("{path}/ws")).into_response())
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::{
        db::MessageKind,
        messages::{insert_message, NewMessage},
        profiles::create_user,
        testing::{self, body},
    };

    #[tokio::test]
    async fn profile_page_lists_messages_and_share_links() {
        let state = testing::state().await;
        let alice = create_user(&state.db_pool, "alice").await.unwrap();
        insert_message(&state.db_pool, MessageKind::Profile, &alice.id, NewMessage::text("you rock"))
            .await
            .unwrap();

        let response = testing::get(&testing::app(state), "/p/alice", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = body(response).await;

        assert!(page.contains("you rock"));
        assert!(page.contains(r#"action="/p/alice/messages""#));
        assert!(page.contains(r#"data-feeds="/p/alice/ws""#));
        assert!(page.contains("Spill anything about alice"));
        assert!(page.contains(">A</div>"));
    }

    #[tokio::test]
    async fn unknown_profiles_are_not_found() {
        let state = testing::state().await;
        let response = testing::get(&testing::app(state), "/p/ghost", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
