use axum::{
    debug_handler,
    extract::{ws::WebSocketUpgrade, Path, State},
    response::Response,
};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use super::{can_enter, load_room};
use crate::{
    feed::{Channel, Feed},
    AppError, AppResult, AppState,
};

async fn entered(db_pool: &SqlitePool, session: &Session, room_id: Uuid) -> AppResult<String> {
    let room = load_room(db_pool, room_id).await?;
    if !can_enter(session, &room).await? {
        return Err(AppError::Forbidden("You don't have access to this room.".to_owned()));
    }
    Ok(room.id)
}

#[debug_handler(state = AppState)]
pub(crate) async fn room_ws(
    Path(room_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let room_id = entered(&db_pool, &session, room_id).await?;
    Ok(feed.serve(ws, Channel::Room(room_id)))
}

#[debug_handler(state = AppState)]
pub(crate) async fn invitations_ws(
    Path(room_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(feed): State<Feed>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let room_id = entered(&db_pool, &session, room_id).await?;
    Ok(feed.serve(ws, Channel::Invitations(room_id)))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::{header, StatusCode};
    use futures_util::StreamExt;
    use tokio::time::{sleep, timeout};
    use tokio_tungstenite::{
        connect_async,
        tungstenite::{client::IntoClientRequest, Error, Message},
        MaybeTlsStream, WebSocketStream,
    };

    use crate::{
        profiles::create_user,
        rooms::{create_room, tests::room},
        testing::{self, cookie, location},
    };

    type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

    async fn connect(url: String, cookie: Option<&str>) -> Result<Socket, Error> {
        let mut request = url.into_client_request()?;
        if let Some(cookie) = cookie {
            request.headers_mut().insert(header::COOKIE, cookie.parse().unwrap());
        }
        Ok(connect_async(request).await?.0)
    }

    async fn next_patch(socket: &mut Socket) -> serde_json::Value {
        let frame = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no frame in time")
            .unwrap()
            .unwrap();
        let Message::Text(text) = frame else {
            panic!("expected a text frame, got {frame:?}");
        };
        serde_json::from_str(text.as_str()).unwrap()
    }

    #[tokio::test]
    async fn room_feed_streams_new_messages_as_json() {
        let state = testing::state().await;
        let lobby = create_room(&state.db_pool, room("Lobby", false)).await.unwrap();
        let app = testing::app(state.clone());
        let addr = testing::serve(app.clone()).await;

        let mut socket = connect(format!("ws://{addr}/r/{}/ws", lobby.id), None).await.unwrap();
        assert_eq!(state.feed.subscriber_count(), 1);

        testing::post_form(&app, &format!("/r/{}/messages", lobby.id), "content=over+the+wire", None).await;

        let patch = next_patch(&mut socket).await;
        assert_eq!(patch["op"], "prepend");
        assert_eq!(patch["target"], "messages");
        assert!(patch["html"].as_str().unwrap().contains("over the wire"));

        socket.close(None).await.unwrap();
        timeout(Duration::from_secs(5), async {
            while state.feed.subscriber_count() > 0 {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscription outlived its socket");
    }

    #[tokio::test]
    async fn private_feeds_refuse_outsiders() {
        let state = testing::state().await;
        let closed = create_room(&state.db_pool, room("Closed", true)).await.unwrap();
        let addr = testing::serve(testing::app(state.clone())).await;

        for feed in ["ws", "invitations/ws"] {
            let Err(Error::Http(response)) = connect(format!("ws://{addr}/r/{}/{feed}", closed.id), None).await else {
                panic!("{feed} accepted a stranger");
            };
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{feed}");
        }
        assert_eq!(state.feed.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn members_hear_about_new_invitations() {
        let state = testing::state().await;
        create_user(&state.db_pool, "bob").await.unwrap();
        let app = testing::app(state.clone());
        let addr = testing::serve(app.clone()).await;

        let response = testing::post_form(&app, "/r/new", "name=Secret&is_private=true", None).await;
        let path = location(&response).to_owned();
        let member = cookie(&response);

        let mut socket = connect(format!("ws://{addr}{path}/invitations/ws"), member.as_deref()).await.unwrap();
        testing::post_form(&app, &format!("{path}/invitations"), "username=bob", member.as_deref()).await;

        let patch = next_patch(&mut socket).await;
        assert_eq!(patch["op"], "prepend");
        assert_eq!(patch["target"], "invitations");
        assert!(patch["html"].as_str().unwrap().contains("bob"));
    }
}
