use axum::{debug_handler, extract::State, response::Response, Form};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower_sessions::Session;

use super::create_user;
use crate::{
    session::{self, Toast},
    share::profile_path,
    AppError, AppResult,
};

#[derive(Debug, Deserialize)]
pub(crate) struct NewProfileForm {
    username: String,
}

#[debug_handler]
pub(crate) async fn create_profile(
    State(db_pool): State<SqlitePool>,
    session: Session,
    Form(NewProfileForm { username }): Form<NewProfileForm>,
) -> AppResult<Response> {
    let username = username.trim();
    if username.is_empty() {
        return session::reject(&session, "Error", "Username cannot be empty", "/").await;
    }

    match create_user(&db_pool, username).await {
        Ok(user) => {
            tracing::info!(id = %user.id, username = %user.username, "profile created");
            let welcome = Toast::new("Profile created", format!("Welcome, {}!", user.username));
            session::redirect_with(&session, welcome, &profile_path(&user.username)).await
        }
        Err(AppError::Conflict(taken)) => session::reject(&session, "Username taken", taken, "/").await,
        Err(e) => session::fail(&session, e, "Failed to create profile. Please try again.", "/").await,
    }
}

#[cfg(test)]
mod tests {
    use crate::{profiles::find_user, testing::{self, body, cookie, location}};

    #[tokio::test]
    async fn creating_a_profile_lands_on_it() {
        let state = testing::state().await;
        let app = testing::app(state.clone());

        let response = testing::post_form(&app, "/p/new", "username=+night+owl+", None).await;
        assert_eq!(location(&response), "/p/night%20owl");
        let cookie = cookie(&response);

        assert!(find_user(&state.db_pool, "night owl").await.unwrap().is_some());

        let page = body(testing::get(&app, "/p/night%20owl", cookie.as_deref()).await).await;
        assert!(page.contains("Welcome, night owl!"));
    }

    #[tokio::test]
    async fn taken_usernames_go_back_home() {
        let state = testing::state().await;
        let app = testing::app(state);

        testing::post_form(&app, "/p/new", "username=alice", None).await;
        let response = testing::post_form(&app, "/p/new", "username=alice", None).await;
        assert_eq!(location(&response), "/");
        let cookie = cookie(&response);

        let page = body(testing::get(&app, "/", cookie.as_deref()).await).await;
        assert!(page.contains("This username is already taken. Please choose another one."));
    }

    #[tokio::test]
    async fn blank_usernames_are_rejected() {
        let state = testing::state().await;
        let app = testing::app(state);

        let response = testing::post_form(&app, "/p/new", "username=+++", None).await;
        assert_eq!(location(&response), "/");
        let page = body(testing::get(&app, "/", cookie(&response).as_deref()).await).await;
        assert!(page.contains("Username cannot be empty"));
    }
}
