//! HTTP endpoints. All are `GET` with query-string parameters.
//!
//! | Path      | Params          | Body                      |
//! |-----------|-----------------|---------------------------|
//! | `/who`    |                 | `{"nicks": [..]}`         |
//! | `/join`   | `nick`          | `{"id": .., "nick": ..}`  |
//! | `/part`   | `id`            | `{}`                      |
//! | `/recv`   | `since`, `id?`  | `{"messages": [..]}`      |
//! | `/send`   | `id`, `text`    | `{}`                      |
//! | `/update` |                 | NDJSON, one message/line  |
//!
//! Query strings are extracted as raw key/value pairs, which never fails, so
//! every validation error goes through [`ApiError`] as JSON.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{debug, warn};

use mum_protocol::{
    parse_since, EmptyResponse, ErrorReason, ErrorResponse, JoinParams, JoinResponse, PartParams,
    RecvParams, RecvResponse, SendParams, WhoResponse,
};

use super::stream::UpdateStream;
use crate::relay::{RelayError, RelayHandle};

/// Query string as decoded key/value pairs, in request order.
type QueryPairs = Vec<(String, String)>;

/// Content type of the `/update` stream.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Builds the router with the relay handle as shared state.
pub fn router(relay: RelayHandle) -> Router {
    Router::new()
        .route("/who", get(who))
        .route("/join", get(join))
        .route("/part", get(part))
        .route("/recv", get(recv))
        .route("/send", get(send))
        .route("/update", get(update))
        .with_state(relay)
}

/// A request that could not be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiError {
    /// 400 with `{"error": reason}`
    Rejected(ErrorReason),
    /// 503; the relay actor is gone
    Unavailable,
}

impl ApiError {
    /// Maps a relay failure, rejecting domain errors with `reason`.
    fn from_relay(err: RelayError, reason: ErrorReason) -> Self {
        match err {
            RelayError::Domain(e) => {
                debug!(error = %e, reason = reason.as_str(), "Request rejected");
                Self::Rejected(reason)
            }
            RelayError::ChannelClosed => {
                warn!("Relay unavailable");
                Self::Unavailable
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Rejected(reason) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::from(reason))).into_response()
            }
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        }
    }
}

async fn who(State(relay): State<RelayHandle>) -> Json<WhoResponse> {
    Json(WhoResponse {
        nicks: relay.who().await,
    })
}

async fn join(
    State(relay): State<RelayHandle>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<JoinResponse>, ApiError> {
    let params = JoinParams::from_pairs(&pairs);
    let nick = params
        .nick()
        .ok_or(ApiError::Rejected(ErrorReason::BadNick))?;

    let session = relay
        .join(nick)
        .await
        .map_err(|e| ApiError::from_relay(e, ErrorReason::NickInUse))?;

    Ok(Json(JoinResponse {
        id: session.id,
        nick: session.nick.into_string(),
    }))
}

async fn part(
    State(relay): State<RelayHandle>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let params = PartParams::from_pairs(&pairs);
    if let Some(session_id) = params.session_id() {
        relay
            .part(session_id)
            .await
            .map_err(|_| ApiError::Unavailable)?;
    }
    Ok(Json(EmptyResponse {}))
}

async fn recv(
    State(relay): State<RelayHandle>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<RecvResponse>, ApiError> {
    let params = RecvParams::from_pairs(&pairs);
    let raw = params
        .since()
        .ok_or(ApiError::Rejected(ErrorReason::MissingSince))?;

    // No leading number matches nothing, so the query parks until flushed.
    let since = parse_since(raw).unwrap_or(i64::MAX);

    let messages = relay
        .recv(params.session_id(), since)
        .await
        .map_err(|_| ApiError::Unavailable)?;

    Ok(Json(RecvResponse { messages }))
}

async fn send(
    State(relay): State<RelayHandle>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<EmptyResponse>, ApiError> {
    let params = SendParams::from_pairs(&pairs);
    let rejected = ApiError::Rejected(ErrorReason::NoSuchSession);
    let session_id = params.session_id().ok_or(rejected)?;
    let text = params.text().ok_or(rejected)?;

    relay
        .send(session_id, text.to_string())
        .await
        .map_err(|e| ApiError::from_relay(e, ErrorReason::NoSuchSession))?;

    Ok(Json(EmptyResponse {}))
}

async fn update(State(relay): State<RelayHandle>) -> Result<Response, ApiError> {
    let channel = relay.default_channel();
    let (subscriber_id, lines) = relay
        .subscribe(channel)
        .await
        .map_err(|_| ApiError::Unavailable)?;

    debug!(channel = %channel, subscriber_id, "Update stream opened");
    let stream = UpdateStream::new(relay, channel, subscriber_id, lines);

    Ok((
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(stream),
    )
        .into_response())
}
