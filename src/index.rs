use axum::{
    debug_handler,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::SqlitePool;
use tower_sessions::Session;

use crate::{
    db::Room,
    display::{escape_html, format_date},
    include_res,
    res::{self, render},
    rooms, session, AppResult,
};

/// The schema is in place and the pool can reach it.
pub async fn database_ok(db_pool: &SqlitePool) -> bool {
    match sqlx::query("SELECT id FROM users LIMIT 1").fetch_optional(db_pool).await {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("database check failed: {e}");
            false
        }
    }
}

fn room_items(rooms: &[Room]) -> String {
    if rooms.is_empty() {
        return include_res!(str, "/pages/no_rooms.html").to_owned();
    }

    rooms
        .iter()
        .map(|room| {
            render(include_res!(str, "/pages/room_item.html"), &[
                ("name", &escape_html(&room.name)),
                ("description", &escape_html(room.description.as_deref().unwrap_or("No description"))),
                ("date", &format_date(room.created_at)),
                ("id", &room.id),
            ])
        })
        .collect()
}

#[debug_handler]
pub async fn index(
    State(db_pool): State<SqlitePool>,
    session: Session,
) -> AppResult<Response> {
    let toast = session::take_toast(&session).await?;

    let (alert, items) = if !database_ok(&db_pool).await {
        (include_res!(str, "/pages/unconfigured.html"), String::new())
    } else {
        match rooms::public_rooms(&db_pool).await {
            Ok(rooms) => ("", room_items(&rooms)),
            Err(e) => {
                tracing::error!("couldn't load public rooms: {e}");
                ("", r#"<div class="empty"><p>Failed to load rooms. Please try again later.</p></div>"#.to_owned())
            }
        }
    };

    let body = render(include_res!(str, "/pages/index.html"), &[
        ("alert", alert),
        ("room_items", &items),
    ]);
    Ok(res::page("Anonymous messaging", &body, toast, "").into_response())
}

#[debug_handler]
pub async fn health(State(db_pool): State<SqlitePool>) -> Response {
    let version = env!("CARGO_PKG_VERSION");
    match database_ok(&db_pool).await {
        true => Json(json!({ "status": "ok", "version": version })).into_response(),
        false => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable", "version": version })),
        )
            .into_response(),
    }
}
