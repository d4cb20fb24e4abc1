pub mod appresult;
pub mod config;
pub mod db;
pub mod display;
pub mod feed;
pub mod index;
pub mod messages;
pub mod profiles;
pub mod res;
pub mod rooms;
pub mod session;
pub mod share;

use std::sync::Arc;

use axum::{extract::{DefaultBodyLimit, FromRef}, routing::get, Router};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub use appresult::{AppError, AppResult};
pub use config::Config;
pub use feed::Feed;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub feed: Feed,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db_pool: SqlitePool, config: Config) -> Self {
        Self {
            db_pool,
            feed: Feed::new(config.feed_capacity),
            config: Arc::new(config),
        }
    }
}

/// Every route of the app. The session layer is added by the caller so tests
/// and `main` can pick their own store.
pub fn router(app_state: AppState) -> Router {
    // base64 then form encoding: up to four body bytes per image byte
    let body_limit = app_state.config.max_image_bytes.saturating_mul(4).saturating_add(64 * 1024);

    Router::new()
        .route("/", get(index::index))
        .route("/health", get(index::health))
        .route("/feed.js", get(res::script))
        .route("/style.css", get(res::style))

        .nest("/p", profiles::router())
        .nest("/r", rooms::router())
        .nest("/m", messages::router())

        .with_state(app_state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) mod testing {
    use axum::{body::Body, http::{header, Request, StatusCode}, response::Response, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use crate::{db, AppState, Config};

    pub(crate) async fn state() -> AppState {
        AppState::new(db::test_pool().await, Config::default())
    }

    pub(crate) fn app(state: AppState) -> Router {
        crate::router(state).layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false))
    }

    /// Serves `app` on an ephemeral local port, for websocket clients.
    pub(crate) async fn serve(app: Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    pub(crate) async fn get(app: &Router, uri: &str, cookie: Option<&str>) -> Response {
        let mut request = Request::get(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        app.clone().oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
    }

    pub(crate) async fn post_form(app: &Router, uri: &str, form: &str, cookie: Option<&str>) -> Response {
        send_form(app, Request::post(uri), form, cookie).await
    }

    /// Same post as `feed.js` makes it, without a page load.
    pub(crate) async fn post_live(app: &Router, uri: &str, form: &str, cookie: Option<&str>) -> Response {
        send_form(app, Request::post(uri).header(crate::session::LIVE_HEADER, "fetch"), form, cookie).await
    }

    async fn send_form(app: &Router, request: axum::http::request::Builder, form: &str, cookie: Option<&str>) -> Response {
        let mut request = request
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        app.clone().oneshot(request.body(Body::from(form.to_owned())).unwrap()).await.unwrap()
    }

    pub(crate) fn cookie(response: &Response) -> Option<String> {
        response.headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::to_owned)
    }

    pub(crate) fn location(response: &Response) -> &str {
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    pub(crate) async fn body(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }
}
