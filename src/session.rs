//! Session-backed state: one-shot toasts and the per-room access marker.
//!
//! Room access is a pseudo-credential. It records which username passed the
//! access check for a room in this browser session and nothing more.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::{AppError, AppResult};

pub const TOAST: &str = "toast";
pub const LIVE_HEADER: &str = "x-requested-with";
const ROOM_ACCESS_PREFIX: &str = "room_access_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    pub title: String,
    pub description: String,
    pub destructive: bool,
}

impl Toast {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            destructive: false,
        }
    }

    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            destructive: true,
            ..Self::new(title, description)
        }
    }
}

pub async fn push_toast(session: &Session, toast: Toast) -> AppResult<()> {
    session.insert(TOAST, toast).await?;
    Ok(())
}

pub async fn take_toast(session: &Session) -> AppResult<Option<Toast>> {
    Ok(session.remove::<Toast>(TOAST).await?)
}

/// Shows `toast` on the next page and sends the browser to `to`.
pub async fn redirect_with(session: &Session, toast: Toast, to: &str) -> AppResult<Response> {
    push_toast(session, toast).await?;
    Ok(Redirect::to(to).into_response())
}

/// Validation failure: destructive toast, back to the form.
pub async fn reject(session: &Session, title: &str, description: impl Into<String>, back: &str) -> AppResult<Response> {
    redirect_with(session, Toast::destructive(title, description), back).await
}

/// Logs a backend failure and turns it into a generic toast.
pub fn failure(err: AppError, description: &str) -> Toast {
    match &err {
        AppError::Internal(inner) => tracing::error!("{description}: {inner:#}"),
        other => tracing::warn!("{description}: {other}"),
    }
    Toast::destructive("Error", description)
}

/// Backend failure: logged, then reported with a generic toast.
pub async fn fail(session: &Session, err: AppError, description: &str, back: &str) -> AppResult<Response> {
    redirect_with(session, failure(err, description), back).await
}

/// Set on form posts `feed.js` sends with `fetch` (`X-Requested-With: fetch`).
/// Those get the toast in the response body instead of a redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Live(pub bool);

impl<S: Send + Sync> FromRequestParts<S> for Live {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Live(parts.headers.get(LIVE_HEADER).is_some_and(|value| value == "fetch")))
    }
}

/// Live posts: `204` without a toast, the toast as JSON otherwise (`422` when
/// destructive). Plain posts: redirect to `back`, toast in the session.
pub async fn answer(session: &Session, Live(live): Live, toast: Option<Toast>, back: &str) -> AppResult<Response> {
    match (live, toast) {
        (true, None) => Ok(StatusCode::NO_CONTENT.into_response()),
        (true, Some(toast)) => {
            let status = match toast.destructive {
                true => StatusCode::UNPROCESSABLE_ENTITY,
                false => StatusCode::OK,
            };
            Ok((status, Json(toast)).into_response())
        }
        (false, None) => Ok(Redirect::to(back).into_response()),
        (false, Some(toast)) => redirect_with(session, toast, back).await,
    }
}

pub fn room_access_key(room_id: &str) -> String {
    format!("{ROOM_ACCESS_PREFIX}{room_id}")
}

pub async fn grant_room_access(session: &Session, room_id: &str, username: &str) -> AppResult<()> {
    session.insert(&room_access_key(room_id), username.to_owned()).await?;
    Ok(())
}

/// Username that passed the access check for this room, if any.
pub async fn room_access(session: &Session, room_id: &str) -> AppResult<Option<String>> {
    Ok(session.get::<String>(&room_access_key(room_id)).await?)
}

/// Only same-site paths are followed after a form post.
pub fn local_path(return_url: Option<&str>) -> &str {
    match return_url {
        Some(url) if url.starts_with('/') && !url.starts_with("//") && !url.contains('\\') => url,
        _ => "/",
    }
}
