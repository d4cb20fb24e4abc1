mod inbox;
mod new;
mod page;

use axum::{routing::{get, post}, Router};
use sqlx::SqlitePool;

use crate::{db::{self, User}, AppError, AppResult, AppState};

/// Taken by the create-profile route.
const RESERVED: &[&str] = &["new"];

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new", post(new::create_profile))
        .route("/{username}", get(page::profile))
        .route("/{username}/messages", post(inbox::send_message))
        .route("/{username}/ws", get(inbox::inbox_ws))
}

pub async fn find_user(db_pool: &SqlitePool, username: &str) -> AppResult<Option<User>> {
    Ok(sqlx::query_as::<_, User>("SELECT id, username, created_at FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(db_pool)
        .await?)
}

/// Fails with `Conflict` when the username is taken.
pub async fn create_user(db_pool: &SqlitePool, username: &str) -> AppResult<User> {
    const TAKEN: &str = "This username is already taken. Please choose another one.";

    if RESERVED.contains(&username) || find_user(db_pool, username).await?.is_some() {
        return Err(AppError::Conflict(TAKEN.to_owned()));
    }

    let inserted = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, username, created_at) VALUES (?,?,?) RETURNING id, username, created_at",
    )
    .bind(db::new_id())
    .bind(username)
    .bind(db::now())
    .fetch_one(db_pool)
    .await;

    match inserted {
        Ok(user) => Ok(user),
        // lost a race with another insert of the same name
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AppError::Conflict(TAKEN.to_owned())),
        Err(e) => Err(e.into()),
    }
}
